use std::collections::HashSet;
use std::time::{Duration, Instant};

use derive_more::Display;
use tracing::{debug, warn};

use crate::storage::BackendError;
use crate::sync::{ChangeRecord, ChangeSet};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SyncState {
    Clean,
    Dirty,
    Flushing,
    FlushFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Quiet period after the last mutation before a flush is due.
    pub debounce: Duration,
    /// Delay before retrying after a transient backend failure.
    pub retry_delay: Duration,
    /// Consecutive transient failures tolerated before automatic retries stop.
    pub max_retries: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug)]
pub enum FlushOutcome {
    Flushed(ChangeSet),
    Failed {
        error: BackendError,
        /// When the engine will try again on its own, if at all.
        retry_at: Option<Instant>,
    },
}

/// Debounced, order-preserving queue of changes waiting for storage.
///
/// The engine does no I/O itself: [`SyncEngine::begin_flush`] hands out the
/// batch to send and [`SyncEngine::complete_flush`] takes the backend's
/// answer. Records enqueued while a batch is in flight wait behind it.
#[derive(Debug)]
pub struct SyncEngine {
    settings: SyncSettings,
    state: SyncState,
    queue: ChangeSet,
    in_flight: ChangeSet,
    deadline: Option<Instant>,
    failures: u32,
    last_error: Option<String>,
}

impl SyncEngine {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            state: SyncState::Clean,
            queue: Vec::new(),
            in_flight: Vec::new(),
            deadline: None,
            failures: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn enqueue(&mut self, record: ChangeRecord, now: Instant) {
        debug!("Queued {record}");
        self.queue.push(record);
        self.deadline = Some(now + self.settings.debounce);
        if matches!(self.state, SyncState::Clean | SyncState::FlushFailed) {
            self.state = SyncState::Dirty;
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SyncState::Dirty | SyncState::FlushFailed => self.deadline,
            SyncState::Clean | SyncState::Flushing => None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Moves the queue into flight. Returns `None` when there is nothing to
    /// send or a batch is already in flight.
    pub fn begin_flush(&mut self) -> Option<ChangeSet> {
        if self.state == SyncState::Flushing || self.queue.is_empty() {
            return None;
        }
        self.in_flight = std::mem::take(&mut self.queue);
        self.state = SyncState::Flushing;
        self.deadline = None;
        debug!("Flushing {} records", self.in_flight.len());
        Some(self.in_flight.clone())
    }

    pub fn complete_flush(&mut self, result: Result<(), BackendError>, now: Instant) -> FlushOutcome {
        let batch = std::mem::take(&mut self.in_flight);
        match result {
            Ok(()) => {
                self.failures = 0;
                self.last_error = None;
                self.state = if self.queue.is_empty() {
                    SyncState::Clean
                } else {
                    SyncState::Dirty
                };
                FlushOutcome::Flushed(batch)
            }
            Err(error) => {
                self.failures += 1;
                self.last_error = Some(error.to_string());
                self.state = SyncState::FlushFailed;

                let mut queue = batch;
                queue.append(&mut self.queue);
                self.queue = queue;

                let retry = error.is_transient() && self.failures <= self.settings.max_retries;
                let retry_at = retry.then(|| now + self.settings.retry_delay);
                if retry {
                    self.deadline = retry_at;
                } else {
                    warn!(
                        "Giving up automatic retries after {} failed flush(es): {error}",
                        self.failures
                    );
                }
                // A record enqueued during the flight keeps its own debounce
                // deadline, which is not a retry.
                FlushOutcome::Failed { error, retry_at }
            }
        }
    }

    /// Drops every queued record that is not already in flight.
    pub fn discard(&mut self) -> usize {
        let discarded = self.queue.len();
        self.queue.clear();
        self.deadline = None;
        self.failures = 0;
        if self.state != SyncState::Flushing {
            self.state = SyncState::Clean;
        }
        discarded
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len() + self.in_flight.len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_len() > 0
    }

    pub fn pending(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.in_flight.iter().chain(self.queue.iter())
    }

    /// Paths referenced by records that have not reached storage yet.
    pub fn pending_paths(&self) -> HashSet<&str> {
        self.pending().flat_map(ChangeRecord::paths).collect()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    fn engine() -> SyncEngine {
        SyncEngine::new(SyncSettings {
            debounce: WINDOW,
            retry_delay: Duration::from_millis(50),
            max_retries: 2,
        })
    }

    fn unavailable() -> BackendError {
        BackendError::Unavailable {
            message: "offline".into(),
        }
    }

    fn rejected() -> BackendError {
        BackendError::Rejected {
            message: "quota".into(),
        }
    }

    #[test]
    fn burst_of_mutations_coalesces_into_one_batch() {
        let mut engine = engine();
        let start = Instant::now();
        for i in 0..5u64 {
            let now = start + Duration::from_millis(i * 30);
            engine.enqueue(ChangeRecord::create(format!("/f{i}.rs"), None), now);
            assert!(!engine.is_due(now));
        }
        let last = start + Duration::from_millis(120);
        assert!(!engine.is_due(last + WINDOW - Duration::from_millis(1)));
        assert!(engine.is_due(last + WINDOW));

        let batch = engine.begin_flush().unwrap();
        let paths = batch.iter().map(|r| r.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, vec!["/f0.rs", "/f1.rs", "/f2.rs", "/f3.rs", "/f4.rs"]);
        assert!(engine.begin_flush().is_none());
    }

    #[test]
    fn state_machine_walks_clean_dirty_flushing_clean() {
        let mut engine = engine();
        let now = Instant::now();
        assert_eq!(engine.state(), SyncState::Clean);

        engine.enqueue(ChangeRecord::remove("/a.rs"), now);
        assert_eq!(engine.state(), SyncState::Dirty);

        engine.begin_flush().unwrap();
        assert_eq!(engine.state(), SyncState::Flushing);
        assert_eq!(engine.deadline(), None);

        assert!(matches!(
            engine.complete_flush(Ok(()), now),
            FlushOutcome::Flushed(batch) if batch.len() == 1
        ));
        assert_eq!(engine.state(), SyncState::Clean);
        assert!(!engine.has_pending());
    }

    #[test]
    fn records_enqueued_during_flight_wait_behind_the_batch() {
        let mut engine = engine();
        let now = Instant::now();
        engine.enqueue(ChangeRecord::create("/a/", None), now);
        engine.begin_flush().unwrap();

        engine.enqueue(ChangeRecord::create("/a/b.rs", None), now);
        assert_eq!(engine.state(), SyncState::Flushing);
        assert!(engine.begin_flush().is_none());

        engine.complete_flush(Ok(()), now);
        assert_eq!(engine.state(), SyncState::Dirty);
        assert_eq!(engine.pending_len(), 1);
    }

    #[test]
    fn transient_failure_requeues_in_order_and_schedules_retry() {
        let mut engine = engine();
        let now = Instant::now();
        engine.enqueue(ChangeRecord::create("/a/", None), now);
        engine.begin_flush().unwrap();
        engine.enqueue(ChangeRecord::create("/a/b.rs", None), now);

        let outcome = engine.complete_flush(Err(unavailable()), now);
        assert!(matches!(outcome, FlushOutcome::Failed { retry_at: Some(_), .. }));
        assert_eq!(engine.state(), SyncState::FlushFailed);
        assert!(engine.last_error().is_some());

        let order = engine.pending().map(|r| r.path.clone()).collect::<Vec<_>>();
        assert_eq!(order, vec!["/a/", "/a/b.rs"]);
        assert!(engine.is_due(now + Duration::from_millis(50)));

        let retry = engine.begin_flush().unwrap();
        assert_eq!(retry.len(), 2);
    }

    #[test]
    fn permanent_failure_waits_for_next_mutation() {
        let mut engine = engine();
        let now = Instant::now();
        engine.enqueue(ChangeRecord::create("/a.rs", None), now);
        engine.begin_flush().unwrap();

        let outcome = engine.complete_flush(Err(rejected()), now);
        assert!(matches!(outcome, FlushOutcome::Failed { retry_at: None, .. }));
        assert!(!engine.is_due(now + Duration::from_secs(60)));
        assert_eq!(engine.pending_len(), 1);

        engine.enqueue(ChangeRecord::write("/a.rs", vec![1]), now);
        assert_eq!(engine.state(), SyncState::Dirty);
        assert!(engine.is_due(now + WINDOW));
    }

    #[test]
    fn permanent_failure_reports_no_retry_while_a_debounce_is_pending() {
        let mut engine = engine();
        let now = Instant::now();
        engine.enqueue(ChangeRecord::create("/a.rs", None), now);
        engine.begin_flush().unwrap();
        engine.enqueue(ChangeRecord::create("/b.rs", None), now);

        let outcome = engine.complete_flush(Err(rejected()), now);

        assert!(matches!(outcome, FlushOutcome::Failed { retry_at: None, .. }));
        assert_eq!(engine.deadline(), Some(now + WINDOW));
        assert_eq!(engine.pending_len(), 2);
    }

    #[test]
    fn retries_stop_after_limit() {
        let mut engine = engine();
        let now = Instant::now();
        engine.enqueue(ChangeRecord::create("/a.rs", None), now);
        for attempt in 1..=3 {
            engine.begin_flush().unwrap();
            let outcome = engine.complete_flush(Err(unavailable()), now);
            let gave_up = matches!(outcome, FlushOutcome::Failed { retry_at: None, .. });
            assert_eq!(gave_up, attempt == 3);
        }
    }

    #[test]
    fn discard_drops_queue_but_not_in_flight_batch() {
        let mut engine = engine();
        let now = Instant::now();
        engine.enqueue(ChangeRecord::create("/a.rs", None), now);
        engine.begin_flush().unwrap();
        engine.enqueue(ChangeRecord::create("/b.rs", None), now);

        assert_eq!(engine.discard(), 1);
        assert_eq!(engine.state(), SyncState::Flushing);
        assert_eq!(engine.pending_len(), 1);
        assert!(engine.pending_paths().contains("/a.rs"));
    }
}
