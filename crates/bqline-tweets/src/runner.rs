//! Pipeline orchestration for the tweet relay

use std::time::Instant;

use bqline_core::{ProgressContext, fmt_num};
use bqline_gcp::{MessageQueue, SecretStore, TableRef, Warehouse};

use crate::config::Config;
use crate::credentials::load_credentials;
use crate::poller::{PollSummary, poll};
use crate::relay::{DrainStats, Relay};
use crate::search::{SearchQuery, SearchSource, TwitterClient};

/// Run the relay: load credentials, then poll and relay every page.
pub fn run(
    config: &Config,
    secrets: &dyn SecretStore,
    queue: &dyn MessageQueue,
    warehouse: &dyn Warehouse,
    progress: &ProgressContext,
) -> anyhow::Result<RunSummary> {
    let credentials = load_credentials(secrets, &config.secrets)?;
    let source = TwitterClient::new(credentials);
    run_with_source(config, &source, queue, warehouse, progress)
}

/// Poll `source` and relay each page through `queue` into `warehouse`.
pub fn run_with_source(
    config: &Config,
    source: &dyn SearchSource,
    queue: &dyn MessageQueue,
    warehouse: &dyn Warehouse,
    progress: &ProgressContext,
) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let table = TableRef::new(&config.project, &config.dataset, &config.table);
    let query = SearchQuery {
        query: config.hashtag.clone(),
        count: config.page_size,
        lang: config.lang.clone(),
    };

    log::info!(
        "Polling {} ({} per page, up to {} records) into {table}",
        query.query,
        query.count,
        config.max_records
    );

    let mut relay = Relay::new(queue, warehouse, &config.topic, &config.subscription, table)
        .with_limits(config.pull_batch, config.max_drain_rounds);

    let pb = progress.count_bar("tweets", config.max_records as u64);
    let poll_summary = poll(source, &query, config.max_records, &pb, |records| {
        relay.relay(records)
    })?;

    // Catch anything published but not yet pulled
    relay.drain()?;

    let summary = RunSummary {
        poll: poll_summary,
        drain: relay.totals(),
        elapsed: start.elapsed(),
    };
    summary.log();
    Ok(summary)
}

/// Summary of a relay run
#[derive(Debug)]
pub struct RunSummary {
    pub poll: PollSummary,
    pub drain: DrainStats,
    pub elapsed: std::time::Duration,
}

impl RunSummary {
    pub fn log(&self) {
        log::info!("=== Relay Summary ===");
        log::info!(
            "Polled: {} records in {} pages ({:?})",
            fmt_num(self.poll.records),
            self.poll.pages,
            self.poll.stop
        );
        log::info!(
            "Loaded: {} rows from {}/{} messages ({} left for redelivery)",
            fmt_num(self.drain.rows_inserted),
            self.drain.acked,
            self.drain.pulled,
            self.drain.failed
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::StopReason;

    #[test]
    fn run_summary_log_does_not_panic() {
        let summary = RunSummary {
            poll: PollSummary {
                pages: 3,
                records: 30,
                stop: StopReason::TargetReached,
            },
            drain: DrainStats {
                pulled: 3,
                acked: 2,
                rows_inserted: 20,
                failed: 1,
            },
            elapsed: std::time::Duration::from_secs(2),
        };
        summary.log();
    }
}
