use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::OverloadError;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::processor::{RetryingProcessor, WorkHandler};

#[cfg(feature = "tracing")]
fn trace_event(message: &'static str) {
    tracing::info!(message);
}

#[cfg(not(feature = "tracing"))]
fn trace_event(_message: &'static str) {}

/// Which mechanism owns pulling items out of the queue.
///
/// Fixed at construction; exactly one mechanism dispatches at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    /// The queue runs its own pump: every enqueue and every completion
    /// moves pending items into processing up to the concurrency limit.
    InternalPush,

    /// An [`ExternalConsumer`](crate::ExternalConsumer) polls the queue;
    /// the internal pump stays inert.
    ExternalPull,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum simultaneous processor invocations.
    pub concurrency_limit: usize,

    /// Admission refuses a payload once `pending + in_flight + 1` would
    /// reach this value, so at most `capacity_threshold - 1` items are
    /// ever resident.
    pub capacity_threshold: usize,

    /// Delay between the first and second processing attempt.
    pub retry_delay: Duration,

    /// Idle wait used by the external consumer between empty polls.
    pub poll_interval: Duration,

    pub dispatch_mode: DispatchMode,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            capacity_threshold: 1_000,
            retry_delay: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
            dispatch_mode: DispatchMode::InternalPush,
        }
    }
}

/// One admitted payload plus its admission timestamp.
struct QueueItem<T> {
    payload: T,
    enqueued_at: Instant,
}

struct QueueState<T> {
    pending: VecDeque<QueueItem<T>>,
    in_flight: usize,
}

impl<T> QueueState<T> {
    /// The single source of truth for queue depth. Always recomputed,
    /// never cached alongside as a second counter.
    fn total(&self) -> usize {
        self.pending.len() + self.in_flight
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

struct QueueInner<T> {
    state: Mutex<QueueState<T>>,
    /// Signaled on every slot release and every dequeue; `drain` waits on it.
    idle: Notify,
    processor: RetryingProcessor<T>,
    sink: Arc<dyn MetricsSink>,
    concurrency_limit: usize,
    capacity_threshold: usize,
    mode: DispatchMode,
}

impl<T> QueueInner<T> {
    fn lock_state(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().expect("queue state lock poisoned")
    }
}

/// Admission-controlled FIFO work queue with concurrency-bounded dispatch.
///
/// Cloning is cheap; all clones share the same queue.
pub struct IntakeQueue<T> {
    inner: Arc<QueueInner<T>>,
    config: QueueConfig,
}

impl<T> Clone for IntakeQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> IntakeQueue<T> {
    pub fn new(config: QueueConfig, handler: Arc<dyn WorkHandler<T>>) -> Self {
        Self::new_with_sink(config, handler, Arc::new(NoopMetrics))
    }

    pub fn new_with_sink(
        mut config: QueueConfig,
        handler: Arc<dyn WorkHandler<T>>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        config.concurrency_limit = config.concurrency_limit.max(1);
        config.capacity_threshold = config.capacity_threshold.max(1);

        let processor = RetryingProcessor::new(handler, config.retry_delay, sink.clone());

        let inner = Arc::new(QueueInner {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: 0,
            }),
            idle: Notify::new(),
            processor,
            sink,
            concurrency_limit: config.concurrency_limit,
            capacity_threshold: config.capacity_threshold,
            mode: config.dispatch_mode,
        });

        Self { inner, config }
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.config.dispatch_mode
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Admit a payload, or refuse it with [`OverloadError`] when the
    /// queue is at capacity.
    ///
    /// The admission check runs before anything is stored; a refused
    /// payload leaves no trace beyond a rejection metric. On success the
    /// new depth is reported and the dispatch pump is triggered
    /// (a no-op trigger if the pump is already keeping up, or if
    /// dispatch is owned by an external consumer).
    pub fn enqueue(&self, payload: T) -> Result<(), OverloadError> {
        let depth = {
            let mut state = self.inner.lock_state();
            let depth = state.total();
            if depth + 1 >= self.inner.capacity_threshold {
                drop(state);
                self.inner.sink.on_rejected();
                trace_event("webhook.intake.rejected");
                return Err(OverloadError {
                    depth,
                    threshold: self.inner.capacity_threshold,
                });
            }

            state.pending.push_back(QueueItem {
                payload,
                enqueued_at: Instant::now(),
            });
            state.total()
        };

        self.inner.sink.on_received();
        self.inner.sink.on_depth_changed(depth);
        trace_event("webhook.intake.received");

        pump(&self.inner);
        Ok(())
    }

    /// Pop the head of the pending buffer without taking a processing
    /// slot. Reports queue wait and the new depth.
    pub fn dequeue(&self) -> Option<T> {
        let (item, depth) = {
            let mut state = self.inner.lock_state();
            let item = state.pending.pop_front()?;
            (item, state.total())
        };

        self.inner.sink.on_queue_wait(item.enqueued_at.elapsed());
        self.inner.sink.on_depth_changed(depth);
        self.inner.idle.notify_waiters();
        Some(item.payload)
    }

    /// `pending + in_flight`, recounted on every call.
    pub fn total_items(&self) -> usize {
        self.inner.lock_state().total()
    }

    /// Alias of [`total_items`](Self::total_items); kept for callers that
    /// think of the queue as a single buffer.
    pub fn size(&self) -> usize {
        self.total_items()
    }

    /// Wait until no item is pending and none is in flight.
    ///
    /// Resolves immediately when the queue is already idle. Completion
    /// happens-after the last in-flight invocation settles; there is no
    /// polling interval involved.
    pub async fn drain(&self) {
        let notified = self.inner.idle.notified();
        tokio::pin!(notified);
        loop {
            // Register before checking so a wake between the check and
            // the await cannot be lost.
            notified.as_mut().enable();
            if self.inner.lock_state().is_idle() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.inner.idle.notified());
        }
    }

    /// Drain and acknowledge completion.
    ///
    /// Does not fence off new enqueues; the transport layer must stop
    /// accepting work before calling this.
    pub async fn shutdown(&self) {
        self.drain().await;
        trace_event("webhook.intake.shutdown_complete");
    }

    /// Atomically take a processing slot together with the head pending
    /// item. Used by whichever dispatch mechanism owns the queue.
    pub(crate) fn checkout(&self) -> Option<CheckedOutItem<T>> {
        checkout(&self.inner)
    }

    pub(crate) fn processor(&self) -> &RetryingProcessor<T> {
        &self.inner.processor
    }
}

/// A dequeued payload holding one processing slot.
///
/// Dropping it releases the slot, reports the new depth, wakes `drain`
/// waiters, and re-triggers the internal pump. Slot release is tied to
/// `Drop` so a panicking handler cannot leak a slot.
pub(crate) struct CheckedOutItem<T: Send + Sync + 'static> {
    payload: Option<T>,
    inner: Arc<QueueInner<T>>,
}

impl<T: Send + Sync + 'static> CheckedOutItem<T> {
    pub(crate) fn payload(&self) -> &T {
        self.payload
            .as_ref()
            .expect("payload taken before release")
    }
}

impl<T: Send + Sync + 'static> Drop for CheckedOutItem<T> {
    fn drop(&mut self) {
        self.payload = None;

        let depth = {
            let mut state = self.inner.lock_state();
            state.in_flight -= 1;
            state.total()
        };
        self.inner.sink.on_depth_changed(depth);
        self.inner.idle.notify_waiters();

        pump(&self.inner);
    }
}

fn checkout<T: Send + Sync + 'static>(inner: &Arc<QueueInner<T>>) -> Option<CheckedOutItem<T>> {
    let (item, depth) = {
        let mut state = inner.lock_state();
        if state.in_flight >= inner.concurrency_limit {
            return None;
        }
        let item = state.pending.pop_front()?;
        state.in_flight += 1;
        (item, state.total())
    };

    inner.sink.on_queue_wait(item.enqueued_at.elapsed());
    inner.sink.on_depth_changed(depth);

    Some(CheckedOutItem {
        payload: Some(item.payload),
        inner: inner.clone(),
    })
}

/// The admission-to-processing pump.
///
/// Checks out items while a slot and a pending item both exist, spawning
/// one processor invocation per item. Invoked after every enqueue and,
/// via `CheckedOutItem::drop`, after every settlement, so a freed slot
/// is reused immediately. Inert unless the queue owns dispatch.
fn pump<T: Send + Sync + 'static>(inner: &Arc<QueueInner<T>>) {
    if inner.mode != DispatchMode::InternalPush {
        return;
    }

    while let Some(item) = checkout(inner) {
        let task_inner = inner.clone();
        tokio::spawn(async move {
            // Failure is already accounted inside the processor; the
            // pump only has to keep going and give the slot back.
            let _ = task_inner.processor.process(item.payload()).await;
            drop(item);
        });
    }
}
