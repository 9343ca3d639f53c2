//! Bounded parallel execution of work items.
//!
//! The caller hands items to [`BoundedRunner::submit`] one at a time and
//! finishes with [`BoundedRunner::drain`]. Each submission starts its item
//! right away, then waits for a free slot if `budget` items were already
//! running. That makes the cap soft: for a moment after a start there can be
//! `budget + 1` items running, never more.
//!
//! Items are isolated from each other. A non-zero exit is recorded in the
//! [`BatchReport`] and nothing else; only failing to start an item at all is
//! an error for the caller.

mod gauge;
mod item;
mod state;
mod template;

pub use gauge::{Gauge, GaugeGuard};
pub use item::{ItemOutcome, ItemStatus, WorkItem};
pub use state::BatchState;
pub use template::{CommandTemplate, output_slot};

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RunnerError;
use item::supervise;

/// Upper bound on items holding a slot at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget(NonZeroUsize);

impl Budget {
    pub const DEFAULT: usize = 10;

    pub fn new(n: usize) -> Result<Self, RunnerError> {
        NonZeroUsize::new(n).map(Self).ok_or(RunnerError::ZeroBudget)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self(NonZeroUsize::new(Self::DEFAULT).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Summary of a finished batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub budget: usize,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Submissions that had to wait for another item to finish.
    pub throttled: usize,
    pub peak_running: usize,
    pub state: BatchState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    /// One entry per started item, in submission order.
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|o| !o.status.is_success())
    }
}

/// One batch of work items sharing a concurrency budget.
pub struct BoundedRunner {
    id: Uuid,
    budget: Budget,
    slots: Arc<Semaphore>,
    running: JoinSet<ItemOutcome>,
    gauge: Arc<Gauge>,
    state: BatchState,
    submitted: usize,
    throttled: usize,
    outcomes: Vec<ItemOutcome>,
    started_at: DateTime<Utc>,
}

impl Default for BoundedRunner {
    fn default() -> Self {
        Self::new(Budget::default())
    }
}

impl BoundedRunner {
    pub fn new(budget: Budget) -> Self {
        Self {
            id: Uuid::new_v4(),
            budget,
            slots: Arc::new(Semaphore::new(budget.get())),
            running: JoinSet::new(),
            gauge: Gauge::new(),
            state: BatchState::Idle,
            submitted: 0,
            throttled: 0,
            outcomes: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Shared running-item counter for this batch.
    pub fn gauge(&self) -> Arc<Gauge> {
        Arc::clone(&self.gauge)
    }

    /// Start `item`, then block until it holds a slot.
    ///
    /// Returns once the item is running and fewer than `budget` other items
    /// hold slots. A start-up failure is returned immediately and the batch
    /// stays usable.
    ///
    /// Cancel safe: once started, an item belongs to the batch and `drain`
    /// waits for it even if this future is dropped while waiting for a slot.
    pub async fn submit(&mut self, item: WorkItem) -> Result<(), RunnerError> {
        self.state = self.state.advance(BatchState::Submitting)?;

        let (mut child, output) = item.spawn().await?;
        let started = Instant::now();
        let live = self.gauge.enter();
        let index = self.submitted;
        let label = item.label();
        let deadline = item.timeout().map(|t| started + t);
        let (slot_tx, slot_rx) = oneshot::channel::<OwnedSemaphorePermit>();
        self.submitted += 1;

        self.running.spawn(async move {
            // Holds the slot, once handed over, until the child is done.
            let _slot = slot_rx;
            let _live = live;
            if let Some(output) = output {
                output.commit().await;
            }
            let status = supervise(&mut child, deadline).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if status.is_success() {
                debug!(target: "skimrun::runner", index, %label, elapsed_ms, "item done");
            } else {
                warn!(target: "skimrun::runner", index, %label, %status, "item failed");
            }
            ItemOutcome {
                index,
                label,
                status,
                elapsed_ms,
            }
        });

        self.reap_finished();

        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                self.throttled += 1;
                debug!(
                    target: "skimrun::runner",
                    batch = %self.id,
                    index,
                    budget = self.budget.get(),
                    "budget saturated; waiting for a completion"
                );
                Arc::clone(&self.slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| RunnerError::Closed)?
            }
            Err(TryAcquireError::Closed) => return Err(RunnerError::Closed),
        };
        // An item that already finished drops the slot straight back.
        let _ = slot_tx.send(permit);

        Ok(())
    }

    /// Wait for every submitted item to finish and close the batch.
    pub async fn drain(mut self) -> Result<BatchReport, RunnerError> {
        self.state = self.state.advance(BatchState::Draining)?;
        debug!(
            target: "skimrun::runner",
            batch = %self.id,
            in_flight = self.running.len(),
            "draining"
        );

        while let Some(joined) = self.running.join_next().await {
            self.record(joined);
        }
        self.state = self.state.advance(BatchState::Done)?;

        self.outcomes.sort_by_key(|o| o.index);
        let finished_at = Utc::now();
        let succeeded = self
            .outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .count();
        let report = BatchReport {
            batch_id: self.id,
            budget: self.budget.get(),
            submitted: self.submitted,
            succeeded,
            failed: self.outcomes.len() - succeeded,
            throttled: self.throttled,
            peak_running: self.gauge.peak(),
            state: self.state,
            started_at: self.started_at,
            finished_at,
            duration_ms: (finished_at - self.started_at).num_milliseconds(),
            items: std::mem::take(&mut self.outcomes),
        };

        info!(
            target: "skimrun::runner",
            batch = %report.batch_id,
            submitted = report.submitted,
            failed = report.failed,
            peak = report.peak_running,
            "batch done"
        );
        Ok(report)
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.running.try_join_next() {
            self.record(joined);
        }
    }

    fn record(&mut self, joined: Result<ItemOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.outcomes.push(outcome),
            // The index is lost with the task; keep it after every real item.
            Err(e) => self.outcomes.push(ItemOutcome {
                index: usize::MAX,
                label: String::new(),
                status: ItemStatus::Lost {
                    reason: format!("task panicked: {e}"),
                },
                elapsed_ms: 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_rejects_zero() {
        assert!(matches!(Budget::new(0), Err(RunnerError::ZeroBudget)));
        assert_eq!(Budget::new(3).unwrap().get(), 3);
    }

    #[test]
    fn default_budget_is_ten() {
        assert_eq!(Budget::default().get(), 10);
        assert_eq!(BoundedRunner::default().budget().get(), 10);
    }

    #[tokio::test]
    async fn empty_batch_drains_immediately() {
        let runner = BoundedRunner::new(Budget::new(2).unwrap());
        assert_eq!(runner.state(), BatchState::Idle);
        let report = runner.drain().await.unwrap();
        assert_eq!(report.state, BatchState::Done);
        assert_eq!(report.submitted, 0);
        assert!(report.items.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_failure_keeps_batch_usable() {
        let mut runner = BoundedRunner::new(Budget::new(2).unwrap());
        let err = runner
            .submit(WorkItem::new("skimrun-no-such-program-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
        assert_eq!(runner.submitted(), 0);

        runner.submit(WorkItem::new("true")).await.unwrap();
        assert_eq!(runner.state(), BatchState::Submitting);

        let gauge = runner.gauge();
        let report = runner.drain().await.unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(gauge.running(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn outcomes_are_in_submission_order() {
        let mut runner = BoundedRunner::new(Budget::new(4).unwrap());
        for (i, delay) in ["0.3", "0.1", "0.2"].iter().enumerate() {
            runner
                .submit(
                    WorkItem::new("sh")
                        .arg("-c")
                        .arg(format!("sleep {delay}"))
                        .with_label(format!("item-{i}")),
                )
                .await
                .unwrap();
        }
        let report = runner.drain().await.unwrap();
        let labels: Vec<_> = report.items.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["item-0", "item-1", "item-2"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn abandoned_submit_still_drains_its_item() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let mut runner = BoundedRunner::new(Budget::new(1).unwrap());
        runner
            .submit(WorkItem::new("sh").args(["-c", "sleep 0.5"]))
            .await
            .unwrap();

        let waiting = runner.submit(
            WorkItem::new("sh")
                .arg("-c")
                .arg(format!("sleep 0.3; touch {}", marker.display())),
        );
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), waiting).await;
        assert!(timed_out.is_err());

        let gauge = runner.gauge();
        let report = runner.drain().await.unwrap();
        assert_eq!(report.submitted, 2);
        assert_eq!(report.items.len(), report.submitted);
        assert_eq!(report.succeeded, 2);
        assert_eq!(gauge.running(), 0);
        assert!(marker.exists());
    }
}
