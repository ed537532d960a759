use colored::Colorize;
use commands::command_argument_builder;
use dagscope::handlers::{
    handle_config, handle_explore, handle_graph, handle_init, handle_sessions, init_logging,
    resolve_data_dir,
};
use dagscope_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_logging(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    let data_dir = resolve_data_dir(
        chosen_command
            .get_one::<String>("data-dir")
            .map(String::as_str)
            .unwrap_or(dagscope::handlers::DEFAULT_DATA_DIR),
    );

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command, &data_dir),
        Some(("config", primary_command)) => handle_config(primary_command, &data_dir),
        Some(("graph", primary_command)) => handle_graph(primary_command, &data_dir, quiet).await,
        Some(("explore", primary_command)) => {
            handle_explore(primary_command, &data_dir, quiet).await
        }
        Some(("sessions", primary_command)) => handle_sessions(primary_command, &data_dir),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
