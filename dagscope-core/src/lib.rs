pub mod config;
pub mod data;
pub mod error;
pub mod render;
pub mod report;
pub mod session;

use colored::Colorize;

pub use config::{ExplorerConfig, SettingKey};
pub use error::{CoreError, Result};
pub use session::{SessionDriver, SessionOutcome};

const BANNER: &str = r#"
     _                                      
  __| | __ _  __ _ ___  ___ ___  _ __   ___ 
 / _` |/ _` |/ _` / __|/ __/ _ \| '_ \ / _ \
| (_| | (_| | (_| \__ \ (_| (_) | |_) |  __/
 \__,_|\__,_|\__, |___/\___\___/| .__/ \___|
             |___/              |_|         
"#;

pub fn print_banner() {
    println!("{}", BANNER.cyan());
    println!(
        "  {} {}\n",
        "IPLD block graph explorer".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
