//! Publish pages to Pub/Sub and drain the subscription into BigQuery

use anyhow::{Context, Result};
use bqline_gcp::{MessageQueue, ReceivedMessage, TableRef, Warehouse};
use serde_json::Value;

use crate::record::Record;

/// Counters for one or more drain passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub pulled: usize,
    pub acked: usize,
    pub rows_inserted: usize,
    /// Left unacknowledged for redelivery
    pub failed: usize,
}

impl DrainStats {
    fn absorb(&mut self, other: DrainStats) {
        self.pulled += other.pulled;
        self.acked += other.acked;
        self.rows_inserted += other.rows_inserted;
        self.failed += other.failed;
    }
}

/// Topic → subscription → table relay
pub struct Relay<'a> {
    queue: &'a dyn MessageQueue,
    warehouse: &'a dyn Warehouse,
    topic: String,
    subscription: String,
    table: TableRef,
    pull_batch: usize,
    max_drain_rounds: usize,
    totals: DrainStats,
}

impl<'a> Relay<'a> {
    pub fn new(
        queue: &'a dyn MessageQueue,
        warehouse: &'a dyn Warehouse,
        topic: impl Into<String>,
        subscription: impl Into<String>,
        table: TableRef,
    ) -> Self {
        Self {
            queue,
            warehouse,
            topic: topic.into(),
            subscription: subscription.into(),
            table,
            pull_batch: 10,
            max_drain_rounds: 20,
            totals: DrainStats::default(),
        }
    }

    /// Messages requested per pull and maximum pulls per drain
    pub fn with_limits(mut self, pull_batch: usize, max_drain_rounds: usize) -> Self {
        self.pull_batch = pull_batch.max(1);
        self.max_drain_rounds = max_drain_rounds.max(1);
        self
    }

    /// Running totals across every drain so far
    pub fn totals(&self) -> DrainStats {
        self.totals
    }

    /// Serialize `records` as one JSON array message and publish it,
    /// blocking until the broker returns a message id.
    pub fn publish(&self, records: &[Record]) -> Result<String> {
        let data = serde_json::to_vec(records).context("Cannot serialize records")?;
        let message_id = self
            .queue
            .publish(&self.topic, &data)
            .with_context(|| format!("Publish to {} failed", self.topic))?;
        log::info!(
            "Published {} records to {} (message {message_id})",
            records.len(),
            self.topic
        );
        Ok(message_id)
    }

    /// Publish a page, then drain whatever is outstanding.
    pub fn relay(&mut self, records: Vec<Record>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.publish(&records)?;
        self.drain()?;
        Ok(())
    }

    /// Pull until the subscription is empty, a round makes no progress,
    /// or `max_drain_rounds` is hit.
    ///
    /// A message is acknowledged only when its rows inserted without
    /// errors; anything else stays unacknowledged and will be redelivered.
    pub fn drain(&mut self) -> Result<DrainStats> {
        let mut stats = DrainStats::default();
        for round in 1..=self.max_drain_rounds {
            let messages = self
                .queue
                .pull(&self.subscription, self.pull_batch)
                .with_context(|| format!("Pull from {} failed", self.subscription))?;
            if messages.is_empty() {
                break;
            }

            let mut acked_this_round = 0usize;
            for message in &messages {
                stats.pulled += 1;
                match self.load(message)? {
                    Some(rows) => {
                        self.queue
                            .acknowledge(&self.subscription, std::slice::from_ref(&message.ack_id))
                            .with_context(|| {
                                format!("Acknowledge of {} failed", message.message_id)
                            })?;
                        stats.acked += 1;
                        stats.rows_inserted += rows;
                        acked_this_round += 1;
                    }
                    None => stats.failed += 1,
                }
            }

            if acked_this_round == 0 {
                log::warn!(
                    "Drain round {round}: none of {} messages loaded, leaving them for redelivery",
                    messages.len()
                );
                break;
            }
        }
        self.totals.absorb(stats);
        Ok(stats)
    }

    /// Insert one message's rows. `Some(rows)` on success, `None` when the
    /// payload is unreadable or the warehouse reported row errors.
    fn load(&self, message: &ReceivedMessage) -> Result<Option<usize>> {
        let rows: Vec<Value> = match serde_json::from_slice(&message.data) {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Message {} is not a JSON row array: {e}", message.message_id);
                return Ok(None);
            }
        };

        let errors = self
            .warehouse
            .insert_rows(&self.table, &message.message_id, &rows)
            .with_context(|| format!("Insert into {} failed", self.table))?;
        if errors.is_empty() {
            log::info!("Inserted {} rows into {}", rows.len(), self.table);
            Ok(Some(rows.len()))
        } else {
            for e in &errors {
                log::error!("Insert error for message {}: {e}", message.message_id);
            }
            Ok(None)
        }
    }
}
