//! An admission-controlled intake queue for webhook payloads.
//!
//! This crate decouples the arrival of externally-originated events from
//! their processing: a **bounded, in-memory, backpressured** work queue
//! with a concurrency-capped dispatch loop, a two-attempt retrying
//! processor, and drain/shutdown coordination that loses no in-flight
//! work.
//!
//! ## Guarantees
//! - Bounded resident items (admission refusal beyond the threshold)
//! - At most N concurrent processor invocations
//! - At-least-one, at-most-two processing attempts per item
//! - FIFO admission order for waiting items
//! - `drain` resolves exactly when nothing is pending or in flight
//!
//! ## Non-Guarantees
//! - Durability across restarts
//! - Exactly-once processing
//! - Completion ordering among concurrently dispatched items
//! - Distributed coordination
//!
//! The HTTP transport, payload validation, and the metrics registry are
//! external collaborators: the transport maps [`enqueue`](IntakeQueue::enqueue)
//! results to status codes, and the queue reports through whatever
//! [`MetricsSink`] it is given.

mod consumer;
mod error;
mod metrics;
mod processor;
mod queue;

pub use consumer::ExternalConsumer;
pub use error::{ModeError, OverloadError, ProcessingError};
pub use metrics::{CountingMetrics, MetricsSink, NoopMetrics};
pub use processor::{RetryingProcessor, WorkHandler};
pub use queue::{DispatchMode, IntakeQueue, QueueConfig};

#[cfg(feature = "metrics")]
pub use metrics::RuntimeMetrics;
