//! bqline - BigQuery automation pipelines
//!
//! Relays hashtag search results into BigQuery through Pub/Sub, and
//! generates Terraform config plus table schemas from a spreadsheet.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "bqline")]
#[command(about = "BigQuery automation pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./bqline.toml or ~/.config/bqline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Whole-request timeout in seconds
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Relay hashtag search results through Pub/Sub into BigQuery
    Tweets(cmd::tweets::TweetsArgs),
    /// Generate Terraform config and schema files from a spreadsheet
    Schema(cmd::schema::SchemaArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress: bqline_core::SharedProgress = Arc::new(bqline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug;
    bqline_core::init_logging(quiet, cli.debug, multi);

    if let Err(e) = bqline_core::install_signal_handlers() {
        log::warn!("Cannot install signal handlers: {e}");
    }

    match run(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, progress: &bqline_core::ProgressContext) -> Result<ExitCode> {
    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply HTTP settings (config file defaults, CLI overrides)
    let mut http = config.http;
    if let Some(secs) = cli.read_timeout {
        http.read_timeout = secs;
    }
    if let Some(n) = cli.max_retries {
        http.max_retries = n;
    }
    bqline_core::set_http_config(http.to_http_config());

    match cli.command {
        Command::Tweets(args) => {
            cmd::tweets::run(args, &config, progress)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema(args) => Ok(cmd::schema::run(args, &config, progress)),
        Command::Config => {
            show_config(&config, http);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn show_config(config: &Config, http: config::HttpSettings) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let source = config
        .source
        .as_ref()
        .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    table.add_row(vec!["Config file", &source]);

    let credentials = if config.gcp.access_token.is_some() {
        "access token".to_string()
    } else if let Some(key) = &config.gcp.key_file {
        key.display().to_string()
    } else {
        "ambient (env or metadata server)".to_string()
    };
    table.add_row(vec!["GCP credentials", &credentials]);
    table.add_row(vec!["Read timeout", &format!("{}s", http.read_timeout)]);
    table.add_row(vec!["Connect timeout", &format!("{}s", http.connect_timeout)]);
    table.add_row(vec!["Max retries", &http.max_retries.to_string()]);

    let tweets = &config.tweets;
    table.add_row(vec!["Tweets project", &tweets.project]);
    table.add_row(vec!["Tweets key file", &tweets.key_file.display().to_string()]);
    table.add_row(vec![
        "Search",
        &format!(
            "{} ({} per page, max {}, lang {})",
            tweets.hashtag, tweets.page_size, tweets.max_records, tweets.lang
        ),
    ]);
    table.add_row(vec![
        "Relay",
        &format!("{} -> {}", tweets.topic, tweets.subscription),
    ]);
    table.add_row(vec![
        "Destination",
        &format!("{}.{}.{}", tweets.project, tweets.dataset, tweets.table),
    ]);

    let schema_project = if config.schema.project.is_empty() {
        "from credentials"
    } else {
        config.schema.project.as_str()
    };
    table.add_row(vec!["Schema project", schema_project]);
    table.add_row(vec!["Module source", &config.schema.module_source]);

    eprintln!("\n{table}");
}
