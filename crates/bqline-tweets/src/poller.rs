//! Cursor-paged polling loop

use anyhow::Result;
use bqline_core::is_shutdown_requested;
use indicatif::ProgressBar;

use crate::record::Record;
use crate::search::{SearchQuery, SearchSource};

/// "Continue before this id" pagination token.
///
/// Unset for the first page; afterwards one below the last id seen, so
/// it only ever decreases within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor(Option<u64>);

impl Cursor {
    pub fn start() -> Self {
        Self(None)
    }

    /// Cursor for the page following one that ended at `last_id`
    pub fn after(self, last_id: u64) -> Self {
        Self(Some(last_id.saturating_sub(1)))
    }

    pub fn max_id(self) -> Option<u64> {
        self.0
    }
}

/// Why a polling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Accumulated count reached the target
    TargetReached,
    /// The source returned an empty page
    Exhausted,
    /// A page did not move the cursor backwards
    Stalled,
    /// SIGINT/SIGTERM between pages
    Shutdown,
}

/// Outcome of a polling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub pages: usize,
    pub records: usize,
    pub stop: StopReason,
}

/// Page through `source` until `max_records` were fetched or a page is empty.
///
/// Every non-empty page is normalized and handed to `sink` before the next
/// request. Search and sink failures are fatal.
pub fn poll(
    source: &dyn SearchSource,
    query: &SearchQuery,
    max_records: usize,
    pb: &ProgressBar,
    mut sink: impl FnMut(Vec<Record>) -> Result<()>,
) -> Result<PollSummary> {
    let mut cursor = Cursor::start();
    let mut records = 0usize;
    let mut pages = 0usize;

    let stop = loop {
        if records >= max_records {
            break StopReason::TargetReached;
        }
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping after {pages} pages");
            break StopReason::Shutdown;
        }

        let page = source.search(query, cursor)?;
        let Some(last) = page.last() else {
            log::info!("No new results for {}", query.query);
            break StopReason::Exhausted;
        };

        let next = cursor.after(last.id);
        let stalled = matches!((cursor.max_id(), next.max_id()), (Some(old), Some(new)) if new >= old);

        let batch = page
            .iter()
            .map(|t| Record::from_tweet(&query.query, t))
            .collect::<Result<Vec<_>>>()?;
        pages += 1;
        records += batch.len();
        pb.set_position(records as u64);
        log::debug!(
            "Page {pages}: {} results, cursor {:?} -> {:?}",
            batch.len(),
            cursor.max_id(),
            next.max_id()
        );
        sink(batch)?;

        if stalled {
            log::warn!("Cursor did not advance past {:?}, stopping", cursor.max_id());
            break StopReason::Stalled;
        }
        cursor = next;
    };

    pb.finish_and_clear();
    Ok(PollSummary {
        pages,
        records,
        stop,
    })
}
