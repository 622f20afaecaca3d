use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use webhook_intake::{
    CountingMetrics, DispatchMode, ExternalConsumer, IntakeQueue, ModeError, QueueConfig,
    WorkHandler,
};

fn pull_config(limit: usize) -> QueueConfig {
    QueueConfig {
        concurrency_limit: limit,
        capacity_threshold: 100,
        retry_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(10),
        dispatch_mode: DispatchMode::ExternalPull,
    }
}

struct RecordingHandler {
    seen: Mutex<Vec<u32>>,
}

impl RecordingHandler {
    fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WorkHandler<u32> for RecordingHandler {
    async fn handle(
        &self,
        payload: &u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.seen.lock().expect("seen lock").push(*payload);
        Ok(())
    }
}

struct GatedHandler {
    entered: AtomicU32,
    gate: Semaphore,
}

impl GatedHandler {
    fn new() -> Self {
        Self {
            entered: AtomicU32::new(0),
            gate: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl WorkHandler<u32> for GatedHandler {
    async fn handle(
        &self,
        _payload: &u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await.expect("gate closed").forget();
        Ok(())
    }
}

#[tokio::test]
async fn consumer_refuses_internal_push_queue() {
    let handler = Arc::new(RecordingHandler::new());
    let queue = IntakeQueue::new(
        QueueConfig {
            dispatch_mode: DispatchMode::InternalPush,
            ..pull_config(2)
        },
        handler,
    );

    assert_eq!(ExternalConsumer::new(queue).err(), Some(ModeError));
}

#[tokio::test]
async fn consumer_processes_everything_enqueued() {
    let sink = Arc::new(CountingMetrics::new());
    let handler = Arc::new(RecordingHandler::new());
    let queue = IntakeQueue::new_with_sink(pull_config(2), handler.clone(), sink.clone());

    let mut consumer = ExternalConsumer::new(queue.clone()).expect("pull mode");
    consumer.start();

    for n in 1..=5u32 {
        queue.enqueue(n).expect("within capacity");
    }

    timeout(Duration::from_secs(2), queue.drain())
        .await
        .expect("drain with active consumer");
    consumer.stop().await;

    let mut seen = handler.seen.lock().expect("seen lock").clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(sink.processed(), 5);
    assert_eq!(queue.total_items(), 0);
}

#[tokio::test]
async fn consumer_respects_the_concurrency_budget() {
    let handler = Arc::new(GatedHandler::new());
    let queue = IntakeQueue::new(pull_config(2), handler.clone());

    let mut consumer = ExternalConsumer::new(queue.clone()).expect("pull mode");
    consumer.start();

    for n in 0..3u32 {
        queue.enqueue(n).expect("within capacity");
    }

    timeout(Duration::from_secs(2), async {
        while handler.entered.load(Ordering::SeqCst) < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("two loops pick up work");

    // With both loops occupied, the third item must wait in pending.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(handler.entered.load(Ordering::SeqCst), 2);
    assert_eq!(queue.total_items(), 3);

    handler.gate.add_permits(3);
    timeout(Duration::from_secs(2), queue.drain())
        .await
        .expect("drain after release");
    consumer.stop().await;
    assert_eq!(queue.total_items(), 0);
}

#[tokio::test]
async fn stop_finishes_the_item_in_progress() {
    let sink = Arc::new(CountingMetrics::new());
    let handler = Arc::new(GatedHandler::new());
    let queue = IntakeQueue::new_with_sink(pull_config(1), handler.clone(), sink.clone());

    let mut consumer = ExternalConsumer::new(queue.clone()).expect("pull mode");
    consumer.start();
    assert!(consumer.is_running());

    queue.enqueue(1).expect("within capacity");
    timeout(Duration::from_secs(2), async {
        while handler.entered.load(Ordering::SeqCst) < 1 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("loop picks up the item");

    handler.gate.add_permits(1);
    consumer.stop().await;

    // Stop returned, so the in-progress item must have settled.
    assert!(!consumer.is_running());
    assert_eq!(sink.processed(), 1);
    assert_eq!(queue.total_items(), 0);
}
