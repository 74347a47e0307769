/// Storage outcomes reported to subscribers of an explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Flushed { records: usize },
    /// `transient` failures are retried automatically; the rest wait for the
    /// next change or a manual flush.
    FlushFailed { message: String, transient: bool },
}

/// Result of a debounced flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    Idle,
    Flushed(usize),
    Failed { transient: bool },
}
