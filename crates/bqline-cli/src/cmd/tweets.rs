//! Tweets subcommand - relay hashtag search results into BigQuery

use anyhow::Result;
use bqline_core::ProgressContext;
use bqline_gcp::{BigQueryClient, PubSubClient, SecretManagerClient};
use clap::Args;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct TweetsArgs {
    /// Search query, usually a hashtag (overrides config)
    #[arg(long)]
    pub hashtag: Option<String>,

    /// Stop after this many records (overrides config)
    #[arg(short = 'n', long)]
    pub max_records: Option<usize>,

    /// Results per search page (overrides config)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// GCP project for secrets, Pub/Sub and BigQuery (overrides config)
    #[arg(long)]
    pub project: Option<String>,
}

pub fn run(args: TweetsArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let mut tweets = config.tweets.clone();
    if let Some(hashtag) = args.hashtag {
        tweets.hashtag = hashtag;
    }
    if let Some(n) = args.max_records {
        tweets.max_records = n;
    }
    if let Some(n) = args.page_size {
        tweets.page_size = n;
    }
    if let Some(project) = args.project {
        tweets.project = project;
    }

    let auth = config.gcp.auth(Some(tweets.key_file.as_path()))?;
    let secrets = SecretManagerClient::new(&auth, &tweets.project);
    let queue = PubSubClient::new(&auth, &tweets.project);
    let warehouse = BigQueryClient::new(&auth);

    let summary = bqline_tweets::run(&tweets, &secrets, &queue, &warehouse, progress)?;
    progress.println(format!(
        "Relayed {} records in {} pages, {} rows loaded into {}.{}",
        summary.poll.records,
        summary.poll.pages,
        summary.drain.rows_inserted,
        tweets.dataset,
        tweets.table
    ));
    Ok(())
}
