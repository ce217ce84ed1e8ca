//! Schema subcommand - Terraform config and schema files from a spreadsheet

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bqline_core::ProgressContext;
use bqline_gcp::{BigQueryClient, GcsClient};
use bqline_schema::error::StageExt;
use bqline_schema::{Generator, Outcome, Stage, TriggerEvent};
use clap::Args;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Bucket holding the spreadsheet
    #[arg(long, requires = "name", conflicts_with = "event")]
    pub bucket: Option<String>,

    /// Object name of the spreadsheet
    #[arg(long, requires = "bucket")]
    pub name: Option<String>,

    /// Storage event JSON with bucket and name ("-" reads stdin)
    #[arg(long, value_name = "FILE", required_unless_present = "bucket")]
    pub event: Option<PathBuf>,

    /// Project whose tables are described (overrides config)
    #[arg(long)]
    pub project: Option<String>,
}

impl SchemaArgs {
    fn trigger_event(&self) -> Result<TriggerEvent> {
        if let (Some(bucket), Some(name)) = (&self.bucket, &self.name) {
            return Ok(TriggerEvent::new(bucket, name));
        }
        let path = self
            .event
            .as_deref()
            .context("Either --bucket/--name or --event is required")?;
        let json = if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read event file: {}", path.display()))?
        };
        TriggerEvent::from_json(&json)
    }
}

/// Exit code 0 on success or skip, the failed stage's code otherwise.
pub fn run(args: SchemaArgs, config: &Config, progress: &ProgressContext) -> ExitCode {
    match generate(args, config, progress) {
        Ok(Outcome::Generated(summary)) => {
            progress.println(format!(
                "Generated {} datasets, {} tables -> {}",
                summary.datasets, summary.tables, summary.config_object
            ));
            ExitCode::SUCCESS
        }
        Ok(Outcome::Skipped(trigger)) => {
            log::debug!("Nothing to do: {trigger:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn generate(
    args: SchemaArgs,
    config: &Config,
    progress: &ProgressContext,
) -> Result<Outcome, bqline_schema::GenerateError> {
    let event = args.trigger_event().stage(Stage::Generate)?;
    let auth = config.gcp.auth(None).stage(Stage::Generate)?;

    let mut schema = config.schema.clone();
    if let Some(project) = args.project {
        schema.project = project;
    }
    if schema.project.is_empty() {
        if let Some(project) = auth.project_id() {
            schema.project = project.to_string();
        }
    }

    let storage = GcsClient::new(&auth);
    let warehouse = BigQueryClient::new(&auth);
    let generator = Generator::new(&schema, &storage, &warehouse, progress);
    log::info!(
        "Handling gs://{}/{} (run {})",
        event.bucket,
        event.name,
        generator.timestamp()
    );
    generator.handle_event(&event)
}
