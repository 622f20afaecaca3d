use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::ModeError;
use crate::queue::{DispatchMode, IntakeQueue};

#[cfg(feature = "tracing")]
fn trace_event(message: &'static str) {
    tracing::info!(message);
}

#[cfg(not(feature = "tracing"))]
fn trace_event(_message: &'static str) {}

/// Pull-mode dispatch: a fixed set of polling loops consuming one item
/// each under the queue's concurrency budget.
///
/// Only attaches to queues built with [`DispatchMode::ExternalPull`];
/// the queue's own pump and this consumer are never active together.
pub struct ExternalConsumer<T: Send + Sync + 'static> {
    queue: IntakeQueue<T>,
    is_running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> ExternalConsumer<T> {
    pub fn new(queue: IntakeQueue<T>) -> Result<Self, ModeError> {
        if queue.dispatch_mode() != DispatchMode::ExternalPull {
            return Err(ModeError);
        }

        Ok(Self {
            queue,
            is_running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        })
    }

    /// Spawn one consumption loop per concurrency slot.
    ///
    /// Each loop checks out the head item together with a processing
    /// slot, runs the processor on it, and sleeps the configured poll
    /// interval whenever the queue is empty.
    pub fn start(&mut self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let loops = self.queue.config().concurrency_limit;
        let poll_interval = self.queue.config().poll_interval;

        for _ in 0..loops {
            let queue = self.queue.clone();
            let running = self.is_running.clone();

            self.handles.push(tokio::spawn(async move {
                while running.load(Ordering::SeqCst) {
                    match queue.checkout() {
                        Some(item) => {
                            // Failure already accounted by the processor;
                            // the slot is released when `item` drops.
                            let _ = queue.processor().process(item.payload()).await;
                        }
                        None => sleep(poll_interval).await,
                    }
                }
            }));
        }

        trace_event("webhook.consumer.started");
    }

    /// Signal every loop to exit after its current item and wait for all
    /// of them to finish.
    pub async fn stop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);

        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }

        trace_event("webhook.consumer.stopped");
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}
