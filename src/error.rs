use std::fmt;

/// Error returned when `enqueue` refuses a payload at admission time.
///
/// Overload is a normal, frequent outcome under burst traffic.
/// The caller (typically the transport layer) should map it to a
/// "try again later" response, not treat it as a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadError {
    /// Resident item count (`pending + in_flight`) at the moment of refusal.
    pub depth: usize,

    /// Configured capacity threshold the admission would have crossed.
    pub threshold: usize,
}

impl fmt::Display for OverloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queue at capacity: {} resident items, threshold {}",
            self.depth, self.threshold
        )
    }
}

impl std::error::Error for OverloadError {}

/// Error returned by the processor after both attempts have failed.
///
/// The item is discarded; it is never re-queued and never surfaces to
/// the caller that originally enqueued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingError {
    /// Number of attempts made (always 2 under the current policy).
    pub attempts: u32,

    /// Message from the last failed attempt.
    pub last_error: String,
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processing failed after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl std::error::Error for ProcessingError {}

/// Returned when an `ExternalConsumer` is attached to a queue whose
/// dispatch is owned by the internal pump.
///
/// Exactly one dispatch mechanism may pull from a queue; the mode is
/// fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeError;

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue dispatch is internal; external consumer not permitted")
    }
}

impl std::error::Error for ModeError {}
