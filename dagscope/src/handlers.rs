use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use colored::Colorize;
use dagscope_core::config::{ExplorerConfig, SettingKey};
use dagscope_core::data::{Database, SessionStatus};
use dagscope_core::render::explorer_url;
use dagscope_core::report::{ReportContext, ReportFormat, render_report, save_report};
use dagscope_core::session::{SessionDriver, SessionOutcome, walk_from_header};
use dagscope_scanner::identifier::shorten_label;
use dagscope_scanner::{BranchFailure, ConfigError, GatewayClient, Materializer};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use url::Url;

pub const DEFAULT_DATA_DIR: &str = "~/.config/dagscope/";
pub const DATABASE_FILE: &str = "dagscope.db";

// Helper functions

/// Installs the stderr log subscriber. `RUST_LOG` wins over `-v` flags.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

pub fn resolve_data_dir(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

/// Opens the database if `init` has created one.
pub fn open_database(data_dir: &Path) -> Result<Option<Database>> {
    let path = database_path(data_dir);
    if !Database::exists(&path) {
        debug!("No database at {}", path.display());
        return Ok(None);
    }
    let db = Database::new(&path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(Some(db))
}

fn require_database(data_dir: &Path) -> Result<Database> {
    open_database(data_dir)?.ok_or_else(|| {
        anyhow!(
            "No database found in {}. Run `dagscope init` first.",
            data_dir.display()
        )
    })
}

/// Stored settings over defaults. Without a database only defaults apply.
pub fn load_config(db: Option<&Database>) -> Result<ExplorerConfig> {
    match db {
        Some(db) => Ok(db.load_config()?),
        None => Ok(ExplorerConfig::default()),
    }
}

/// Layers command-line values over the loaded configuration.
pub fn apply_overrides(
    mut config: ExplorerConfig,
    overrides: &[(SettingKey, String)],
) -> std::result::Result<ExplorerConfig, ConfigError> {
    for (key, value) in overrides {
        config.set(*key, value)?;
    }
    Ok(config)
}

fn overrides_from(args: &ArgMatches) -> Vec<(SettingKey, String)> {
    let mut overrides = Vec::new();
    for (flag, key) in [
        ("address", SettingKey::ScriptAddress),
        ("filter", SettingKey::FilterToken),
        ("token", SettingKey::BlockfrostToken),
    ] {
        if let Ok(Some(value)) = args.try_get_one::<String>(flag) {
            overrides.push((key, value.clone()));
        }
    }
    for (flag, key) in [
        ("blockfrost-url", SettingKey::BlockfrostUrl),
        ("gateway", SettingKey::IpfsGateway),
    ] {
        if let Ok(Some(url)) = args.try_get_one::<Url>(flag) {
            overrides.push((key, url.as_str().to_string()));
        }
    }
    if let Some(depth) = args.get_one::<usize>("depth") {
        overrides.push((SettingKey::LevelLimit, depth.to_string()));
    }
    overrides
}

/// Value as shown by `config list`. Secrets keep only a short prefix.
pub fn display_value(key: SettingKey, value: &str) -> String {
    if value.is_empty() {
        return "(empty)".to_string();
    }
    if key.is_secret() {
        let prefix: String = value.chars().take(4).collect();
        return format!("{}****", prefix);
    }
    value.to_string()
}

/// Zero disables the timeout.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// An explicit format wins, then the output extension, then text.
pub fn resolve_format(format: Option<&String>, output: Option<&PathBuf>) -> ReportFormat {
    format
        .and_then(|f| ReportFormat::from_str(f))
        .or_else(|| output.and_then(|p| ReportFormat::from_path(p)))
        .unwrap_or(ReportFormat::Text)
}

fn parse_key(args: &ArgMatches) -> Result<SettingKey> {
    let name = args
        .get_one::<String>("KEY")
        .ok_or_else(|| anyhow!("A setting name is required"))?;
    Ok(name.parse::<SettingKey>()?)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn new_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn write_output(content: &str, output: Option<&PathBuf>, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                println!(
                    "{} Wrote graph to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

// Handlers

pub fn handle_init(args: &ArgMatches, data_dir: &Path) -> Result<()> {
    print_divider();
    println!("{}", "  DAGSCOPE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let data_dir = args
        .get_one::<String>("PATH")
        .map(|p| resolve_data_dir(p))
        .unwrap_or_else(|| data_dir.to_path_buf());
    let force = args.get_flag("force");
    let db_path = database_path(&data_dir);

    println!(
        "{} Target: {}",
        "→".blue(),
        data_dir.display().to_string().bright_white()
    );

    if Database::exists(&db_path) {
        if !force {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!(
                "A database already exists at {}",
                db_path.display().to_string().bright_white()
            );
            let response = print_prompt("Overwrite it, discarding stored settings? [y/N]:")?;
            if response != "y" && response != "yes" {
                println!("\nInitialization cancelled.");
                return Ok(());
            }
        }
        Database::drop(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        println!("{} Removed existing database", "✓".green().bold());
    }

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    Database::new(&db_path)
        .with_context(|| format!("Failed to create database {}", db_path.display()))?;

    println!("{} Database: {}", "✓".green().bold(), db_path.display());
    println!();
    println!(
        "Next: store your Blockfrost token with {}",
        "dagscope config set blockfrostToken <PROJECT_ID>".bright_cyan()
    );
    Ok(())
}

pub fn handle_config(args: &ArgMatches, data_dir: &Path) -> Result<()> {
    match args.subcommand() {
        Some(("list", _)) => {
            let db = open_database(data_dir)?;
            let config = load_config(db.as_ref())?;
            for key in SettingKey::ALL {
                let stored = match &db {
                    Some(db) => db.get_setting(key)?.is_some(),
                    None => false,
                };
                let origin = if stored { "stored".green() } else { "default".dimmed() };
                println!(
                    "{:<18} {}  {}",
                    key.storage_key().bright_white(),
                    display_value(key, &config.get(key)),
                    origin
                );
            }
        }
        Some(("get", sub)) => {
            let key = parse_key(sub)?;
            let db = open_database(data_dir)?;
            println!("{}", load_config(db.as_ref())?.get(key));
        }
        Some(("set", sub)) => {
            let key = parse_key(sub)?;
            let value = sub
                .get_one::<String>("VALUE")
                .ok_or_else(|| anyhow!("A value is required"))?;
            let db = require_database(data_dir)?;
            db.save_setting(key, value)?;
            info!("Stored {}", key.storage_key());
            println!("{} {} updated", "✓".green().bold(), key.storage_key());
            if key.is_root_input() {
                println!(
                    "{} Root input changed; the next graph run starts a fresh session",
                    "→".blue()
                );
            }
        }
        Some(("unset", sub)) => {
            let key = parse_key(sub)?;
            let db = require_database(data_dir)?;
            if db.unset_setting(key)? {
                println!("{} {} reverted to default", "✓".green().bold(), key.storage_key());
            } else {
                println!("{} {} was not set", "→".blue(), key.storage_key());
            }
        }
        _ => unreachable!("clap should ensure we don't get here"),
    }
    Ok(())
}

pub async fn handle_graph(args: &ArgMatches, data_dir: &Path, quiet: bool) -> Result<()> {
    let db = open_database(data_dir)?;
    let config = apply_overrides(load_config(db.as_ref())?, &overrides_from(args))?;
    let timeout = timeout_from_secs(*args.get_one::<u64>("timeout").unwrap_or(&30));
    let concurrency = *args.get_one::<usize>("concurrency").unwrap_or(&16);
    let output = args.get_one::<PathBuf>("output");
    let format = resolve_format(args.get_one::<String>("format"), output);

    let spinner = new_spinner(quiet);
    let progress = spinner.clone();
    let failures = spinner.clone();

    let driver = SessionDriver::from_config(config.clone(), timeout)?
        .with_max_in_flight(concurrency)
        .with_progress_callback(Arc::new(move |count: usize, id: String| {
            progress.set_message(format!(
                "Fetched {} headers (latest {})",
                count,
                shorten_label(&id)
            ));
        }))
        .with_failure_callback(Arc::new(move |failure: &BranchFailure| {
            failures.println(format!(
                "{} {}: {}",
                "⚠".yellow(),
                shorten_label(&failure.id),
                failure.reason
            ));
        }));

    let session_id = match &db {
        Some(db) => Some(db.create_session(&config)?),
        None => None,
    };

    spinner.set_message(format!("Listing UTxOs at {}", shorten_label(&config.script_address)));

    // Ctrl-C supersedes the session; fetches still in flight are dropped.
    let epoch = driver.epoch();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            epoch.advance();
        }
    });
    let outcome = driver.run().await;
    interrupt.abort();
    spinner.finish_and_clear();

    if let (Some(db), Some(id)) = (&db, &session_id) {
        db.finish_session(id, outcome.status(), &outcome.stats())?;
    }

    if !quiet {
        print_graph_summary(&outcome);
    }

    let context = ReportContext::new(&config, session_id);
    let content = render_report(format, &outcome, &config, &context)?;
    write_output(&content, output, quiet)
}

fn print_graph_summary(outcome: &SessionOutcome) {
    let mark = if outcome.is_superseded() {
        "✗".red().bold()
    } else {
        "✓".green().bold()
    };
    eprintln!(
        "{} {} tips, {} nodes, {} edges, {} failures",
        mark,
        outcome.tips.len(),
        outcome.store.node_count(),
        outcome.store.edge_count(),
        outcome.failure_count()
    );
}

pub async fn handle_explore(args: &ArgMatches, data_dir: &Path, quiet: bool) -> Result<()> {
    let id = args
        .get_one::<String>("ID")
        .ok_or_else(|| anyhow!("An identifier is required"))?;
    let db = open_database(data_dir)?;
    let config = apply_overrides(load_config(db.as_ref())?, &overrides_from(args))?;

    let walk = args.get_flag("walk");
    match explorer_url(id, &config) {
        Some(url) => println!("{}", url),
        None if !walk => bail!("{} is neither a CID nor a <tx_hash>#<index> reference", id),
        None => {}
    }
    if !walk {
        return Ok(());
    }

    let timeout = timeout_from_secs(*args.get_one::<u64>("timeout").unwrap_or(&30));
    let concurrency = *args.get_one::<usize>("concurrency").unwrap_or(&16);
    let output = args.get_one::<PathBuf>("output");
    let format = resolve_format(args.get_one::<String>("format"), output);

    let spinner = new_spinner(quiet);
    let progress = spinner.clone();
    let gateway = GatewayClient::new(&config.ipfs_gateway, timeout)?;
    let materializer = Materializer::new(Arc::new(gateway))
        .with_depth_limit(config.level_limit)
        .with_max_in_flight(concurrency)
        .with_progress_callback(Arc::new(move |count: usize, id: String| {
            progress.set_message(format!("Fetched {} headers (latest {})", count, shorten_label(&id)));
        }));

    spinner.set_message(format!("Walking from {}", shorten_label(id)));
    let outcome = walk_from_header(&materializer, id).await;
    spinner.finish_and_clear();

    if !quiet {
        print_graph_summary(&outcome);
    }

    let context = ReportContext::new(&config, None);
    let content = render_report(format, &outcome, &config, &context)?;
    write_output(&content, output, quiet)
}

pub fn handle_sessions(args: &ArgMatches, data_dir: &Path) -> Result<()> {
    let limit = *args.get_one::<usize>("limit").unwrap_or(&20);
    let db = require_database(data_dir)?;
    let sessions = db.recent_sessions(limit)?;

    if sessions.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    for session in sessions {
        let status = match session.status {
            SessionStatus::Completed => session.status.as_str().green(),
            SessionStatus::Running => session.status.as_str().cyan(),
            SessionStatus::Superseded => session.status.as_str().yellow(),
            SessionStatus::Failed => session.status.as_str().red(),
        };
        println!(
            "{}  {}  {:<10}  {} nodes, {} edges, {} failures  {}",
            session.id.dimmed(),
            format_timestamp(session.start_time),
            status,
            session.stats.node_count,
            session.stats.edge_count,
            session.stats.failure_count,
            shorten_label(&session.script_address).bright_white()
        );
    }
    Ok(())
}
