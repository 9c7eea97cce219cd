//! Progress events published by the install and uninstall pipelines
//!
//! The pipelines report user-facing progress through these events rather
//! than logging directly, so the CLI decides how to render them.

/// Identifies the kind of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    /// A long-running step has started; renderers show a busy indicator
    StartWait,
    /// The current long-running step ended without a completion message
    StopWait,
    /// A step completed successfully
    Done,
    /// Diagnostic detail, shown only in verbose mode
    Debug,
    /// A non-fatal problem; the pipeline continues
    Warning,
}

/// A progress event with its message
#[derive(Debug, Clone)]
pub struct Event {
    id: EventId,
    message: String,
}

impl Event {
    /// A long-running step is starting
    pub fn start_wait(message: impl Into<String>) -> Self {
        Self {
            id: EventId::StartWait,
            message: message.into(),
        }
    }

    /// The current long-running step is over
    pub fn stop_wait() -> Self {
        Self {
            id: EventId::StopWait,
            message: String::new(),
        }
    }

    /// A step finished successfully
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            id: EventId::Done,
            message: message.into(),
        }
    }

    /// Verbose diagnostic detail
    pub fn debug(message: impl Into<String>) -> Self {
        Self {
            id: EventId::Debug,
            message: message.into(),
        }
    }

    /// A non-fatal problem
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            id: EventId::Warning,
            message: message.into(),
        }
    }

    /// The event kind
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The event message (empty for stop-wait events)
    pub fn message(&self) -> &str {
        &self.message
    }
}
