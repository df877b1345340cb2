//! Sample buffer
//!
//! Ordered, capped accumulator of one session's classified samples. Once the
//! flush interval has elapsed since the last successful flush, everything
//! buffered is handed to a background write task as one batch. At most one
//! write per session is in flight; its result is collected on a later tick,
//! so the frame loop never waits on the store.
//!
//! Policy:
//! - an in-flight write is never cancelled or resubmitted
//! - failed write: batch goes back to the front of the buffer, retried at the next due tick
//! - overflow: oldest samples dropped with a warning
//! - close: the in-flight write and one last batch are awaited, each bounded by the write timeout

use emotrack_common::Sample;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::BufferConfig;
use crate::db::EmotionRepository;
use crate::error::Result;

/// Result of a flush attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Interval not yet elapsed
    NotDue,
    /// Nothing buffered
    Empty,
    /// Previous batch still being written
    InFlight,
    /// Batch handed to the writer; number of samples
    Started(usize),
    /// Batch written; number of samples
    Flushed(usize),
    /// Batch not written
    Failed(String),
}

/// Running counters for one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub appended: u64,
    pub persisted: u64,
    pub dropped: u64,
    pub failed_flushes: u64,
}

struct PendingWrite {
    batch: Arc<Vec<Sample>>,
    task: JoinHandle<Result<()>>,
    started: Instant,
    slow_warned: bool,
}

pub struct SampleBuffer {
    session_id: Uuid,
    repo: Arc<dyn EmotionRepository>,
    pending: VecDeque<Sample>,
    in_flight: Option<PendingWrite>,
    capacity: usize,
    flush_interval: Duration,
    write_timeout: Duration,
    last_flush: Instant,
    stats: BufferStats,
}

impl SampleBuffer {
    pub fn new(session_id: Uuid, repo: Arc<dyn EmotionRepository>, config: &BufferConfig) -> Self {
        Self {
            session_id,
            repo,
            pending: VecDeque::new(),
            in_flight: None,
            capacity: config.capacity.max(1),
            flush_interval: config.flush_interval(),
            write_timeout: config.write_timeout(),
            last_flush: Instant::now(),
            stats: BufferStats::default(),
        }
    }

    /// Append in arrival order, dropping the oldest sample when full
    pub fn append(&mut self, sample: Sample) {
        self.pending.push_back(sample);
        self.stats.appended += 1;
        self.enforce_capacity();
    }

    /// Collect a finished write, then start a new one if the interval has
    /// elapsed since the last successful flush
    ///
    /// Never waits on the store.
    pub fn maybe_flush(&mut self, now: Instant) -> FlushOutcome {
        self.collect();
        if self.in_flight.is_some() {
            return FlushOutcome::InFlight;
        }
        if now.saturating_duration_since(self.last_flush) < self.flush_interval {
            return FlushOutcome::NotDue;
        }
        if self.pending.is_empty() {
            self.last_flush = now;
            return FlushOutcome::Empty;
        }

        let write = self.spawn_write(now);
        let count = write.batch.len();
        self.in_flight = Some(write);
        FlushOutcome::Started(count)
    }

    /// Best-effort flush of whatever remains, regardless of the interval
    pub async fn final_flush(&mut self) -> FlushOutcome {
        let mut written = 0;

        if let Some(write) = self.in_flight.take() {
            match self.await_write(write).await {
                FlushOutcome::Flushed(count) => written += count,
                FlushOutcome::Failed(reason) => {
                    warn!(session_id = %self.session_id, "In-flight sample write failed at close: {}", reason);
                }
                _ => {}
            }
        }

        if self.pending.is_empty() {
            return if written > 0 {
                FlushOutcome::Flushed(written)
            } else {
                FlushOutcome::Empty
            };
        }

        let write = self.spawn_write(Instant::now());
        match self.await_write(write).await {
            FlushOutcome::Flushed(count) => FlushOutcome::Flushed(written + count),
            FlushOutcome::Failed(reason) => {
                error!(
                    session_id = %self.session_id,
                    lost = self.pending.len(),
                    "Final sample flush failed: {}",
                    reason
                );
                FlushOutcome::Failed(reason)
            }
            other => other,
        }
    }

    /// Unflushed samples, including a batch still being written
    pub fn len(&self) -> usize {
        self.pending.len() + self.in_flight.as_ref().map_or(0, |write| write.batch.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    fn spawn_write(&mut self, now: Instant) -> PendingWrite {
        let batch: Arc<Vec<Sample>> = Arc::new(self.pending.drain(..).collect());
        let repo = Arc::clone(&self.repo);
        let rows = Arc::clone(&batch);
        let task = tokio::spawn(async move { repo.save_samples(&rows).await });

        PendingWrite {
            batch,
            task,
            started: now,
            slow_warned: false,
        }
    }

    /// Settle the in-flight write if it has finished, without waiting
    fn collect(&mut self) {
        let Some(write) = self.in_flight.as_mut() else {
            return;
        };

        if !write.task.is_finished() {
            let running = Instant::now().saturating_duration_since(write.started);
            if running > self.write_timeout && !write.slow_warned {
                write.slow_warned = true;
                warn!(
                    session_id = %self.session_id,
                    count = write.batch.len(),
                    running_ms = running.as_millis() as u64,
                    "Sample write still running"
                );
            }
            return;
        }

        let Some(mut write) = self.in_flight.take() else {
            return;
        };
        let Some(joined) = (&mut write.task).now_or_never() else {
            self.in_flight = Some(write);
            return;
        };

        if let FlushOutcome::Failed(reason) = self.settle(write, joined) {
            warn!(
                session_id = %self.session_id,
                retained = self.pending.len(),
                "Sample flush failed, retrying next tick: {}",
                reason
            );
        }
    }

    /// Wait for a write, bounded by the write timeout
    ///
    /// A write that outlives the bound keeps running detached and its batch
    /// is not retried, since it may still land.
    async fn await_write(&mut self, mut write: PendingWrite) -> FlushOutcome {
        match tokio::time::timeout(self.write_timeout, &mut write.task).await {
            Ok(joined) => self.settle(write, joined),
            Err(_) => {
                self.stats.failed_flushes += 1;
                FlushOutcome::Failed(format!(
                    "{} samples still being written after {:?}",
                    write.batch.len(),
                    self.write_timeout
                ))
            }
        }
    }

    fn settle(
        &mut self,
        write: PendingWrite,
        joined: std::result::Result<Result<()>, JoinError>,
    ) -> FlushOutcome {
        let count = write.batch.len();
        let reason = match joined {
            Ok(Ok(())) => {
                self.stats.persisted += count as u64;
                self.last_flush = write.started;
                debug!(session_id = %self.session_id, count, "Flushed samples");
                return FlushOutcome::Flushed(count);
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("write task failed: {}", e),
        };

        self.stats.failed_flushes += 1;
        for sample in write.batch.iter().rev() {
            self.pending.push_front(sample.clone());
        }
        self.enforce_capacity();
        FlushOutcome::Failed(reason)
    }

    fn enforce_capacity(&mut self) {
        while self.pending.len() > self.capacity {
            let Some(oldest) = self.pending.pop_front() else {
                break;
            };
            self.stats.dropped += 1;
            warn!(
                session_id = %self.session_id,
                capacity = self.capacity,
                dropped_at = %oldest.captured_at,
                total_dropped = self.stats.dropped,
                "Sample buffer full, dropping oldest sample"
            );
        }
    }
}
