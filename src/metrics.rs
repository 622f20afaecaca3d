use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Observability capability written to by the queue and the processor.
///
/// Implementations must be cheap and non-blocking: the queue calls the
/// sink while pumping and treats writes as append-only and commutative.
/// The ordering of writes across concurrent completions carries no meaning.
pub trait MetricsSink: Send + Sync {
    /// A payload was admitted into the queue.
    fn on_received(&self);

    /// A payload was processed successfully.
    fn on_processed(&self);

    /// A payload was refused at admission.
    fn on_rejected(&self);

    /// Queue depth (`pending + in_flight`) after a state change.
    fn on_depth_changed(&self, depth: usize);

    /// Time an item spent in `pending` before being pulled.
    fn on_queue_wait(&self, wait: Duration);

    /// Wall-clock duration of a successful processor invocation.
    fn on_processing_duration(&self, duration: Duration);
}

/// Sink that discards everything. Default when no sink is supplied.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn on_received(&self) {}
    fn on_processed(&self) {}
    fn on_rejected(&self) {}
    fn on_depth_changed(&self, _depth: usize) {}
    fn on_queue_wait(&self, _wait: Duration) {}
    fn on_processing_duration(&self, _duration: Duration) {}
}

/// In-memory sink backed by atomics.
///
/// Suitable for tests and for embedders that scrape counters themselves
/// instead of wiring up a metrics registry.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    received: AtomicU64,
    processed: AtomicU64,
    rejected: AtomicU64,
    depth: AtomicUsize,
    queue_wait_samples: AtomicU64,
    processing_samples: AtomicU64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    /// Last reported depth.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn queue_wait_samples(&self) -> u64 {
        self.queue_wait_samples.load(Ordering::SeqCst)
    }

    pub fn processing_samples(&self) -> u64 {
        self.processing_samples.load(Ordering::SeqCst)
    }
}

impl MetricsSink for CountingMetrics {
    fn on_received(&self) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    fn on_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_depth_changed(&self, depth: usize) {
        self.depth.store(depth, Ordering::SeqCst);
    }

    fn on_queue_wait(&self, _wait: Duration) {
        self.queue_wait_samples.fetch_add(1, Ordering::SeqCst);
    }

    fn on_processing_duration(&self, _duration: Duration) {
        self.processing_samples.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink forwarding to the `metrics` crate macros.
///
/// An external registry (for example a Prometheus exporter) owns the
/// exposition format; this sink only emits the raw series.
#[cfg(feature = "metrics")]
#[derive(Debug, Default)]
pub struct RuntimeMetrics;

#[cfg(feature = "metrics")]
impl MetricsSink for RuntimeMetrics {
    fn on_received(&self) {
        metrics::increment_counter!("webhook.intake.received");
    }

    fn on_processed(&self) {
        metrics::increment_counter!("webhook.intake.processed");
    }

    fn on_rejected(&self) {
        metrics::increment_counter!("webhook.intake.rejected");
    }

    fn on_depth_changed(&self, depth: usize) {
        metrics::gauge!("webhook.intake.depth", depth as f64);
    }

    fn on_queue_wait(&self, wait: Duration) {
        metrics::histogram!("webhook.intake.queue_wait_ms", wait.as_secs_f64() * 1000.0);
    }

    fn on_processing_duration(&self, duration: Duration) {
        metrics::histogram!(
            "webhook.intake.processing_ms",
            duration.as_secs_f64() * 1000.0
        );
    }
}
