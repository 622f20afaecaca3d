use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::error::ProcessingError;
use crate::metrics::MetricsSink;

#[cfg(feature = "tracing")]
fn trace_event(message: &'static str) {
    tracing::info!(message);
}

#[cfg(not(feature = "tracing"))]
fn trace_event(_message: &'static str) {}

/// The unit of work performed for each payload.
///
/// Implementations are supplied by the embedder (typically an outbound
/// call to some downstream system). The handler sees each payload by
/// reference; a retried attempt receives the same payload with no other
/// state carried over from the first attempt.
#[async_trait]
pub trait WorkHandler<T>: Send + Sync {
    async fn handle(&self, payload: &T)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Wraps a [`WorkHandler`] with the retry policy:
/// at most two attempts, one fixed delay between them.
///
/// A first-attempt success never incurs the second attempt or its delay.
/// A second failure propagates as [`ProcessingError`]; nothing is
/// reported to the success counters in that case.
pub struct RetryingProcessor<T> {
    handler: Arc<dyn WorkHandler<T>>,
    retry_delay: Duration,
    sink: Arc<dyn MetricsSink>,
}

impl<T> RetryingProcessor<T> {
    pub fn new(
        handler: Arc<dyn WorkHandler<T>>,
        retry_delay: Duration,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            handler,
            retry_delay,
            sink,
        }
    }

    pub async fn process(&self, payload: &T) -> Result<(), ProcessingError> {
        let started = Instant::now();

        match self.handler.handle(payload).await {
            Ok(()) => {
                self.report_success(started);
                return Ok(());
            }
            Err(_first) => {
                trace_event("webhook.process.attempt_failed");
            }
        }

        sleep(self.retry_delay).await;

        match self.handler.handle(payload).await {
            Ok(()) => {
                self.report_success(started);
                Ok(())
            }
            Err(err) => {
                trace_event("webhook.process.failed");
                Err(ProcessingError {
                    attempts: 2,
                    last_error: err.to_string(),
                })
            }
        }
    }

    fn report_success(&self, started: Instant) {
        self.sink.on_processed();
        self.sink.on_processing_duration(started.elapsed());
        trace_event("webhook.process.success");
    }
}
