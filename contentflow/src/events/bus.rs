//! Asynchronous event fan-out with per-handler fault isolation.

use super::{EventKind, EventSink, PipelineEvent};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// An event handler.
pub type EventHandler = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Delivery counters for an [`EventBus`].
#[derive(Debug, Default)]
pub struct BusMetrics {
    published: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    handler_failures: AtomicU64,
}

impl BusMetrics {
    /// Returns the number of events accepted onto the queue.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Returns the number of events dropped because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of successful handler invocations.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of handler invocations that panicked.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }
}

struct Subscription {
    kind: Option<EventKind>,
    handler: EventHandler,
}

impl Subscription {
    fn matches(&self, kind: EventKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }
}

enum Message {
    Event(PipelineEvent),
    Flush(oneshot::Sender<()>),
}

type Subscriptions = Arc<RwLock<Vec<Arc<Subscription>>>>;

/// An event sink that fans events out to subscribed handlers.
///
/// Events are queued on a bounded channel and dispatched by a worker task,
/// so publishing never blocks. Handlers run in subscription order; each
/// invocation runs inside a panic boundary and a failing handler never
/// affects the publisher or the other handlers.
///
/// When the queue is full, step events and `pipeline.started` are dropped
/// and counted. Terminal events (`pipeline.completed`, `pipeline.failed`,
/// `pipeline.paused`) are handed to a spawned task that waits for room
/// instead. Once the bus is shut down every event is dropped.
pub struct EventBus {
    tx: RwLock<Option<mpsc::Sender<Message>>>,
    subscriptions: Subscriptions,
    metrics: Arc<BusMetrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Creates a bus with a queue of `capacity` events and starts its worker.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let subscriptions: Subscriptions = Arc::new(RwLock::new(Vec::new()));
        let metrics = Arc::new(BusMetrics::default());

        let worker = tokio::spawn(run_worker(rx, subscriptions.clone(), metrics.clone()));

        Self {
            tx: RwLock::new(Some(tx)),
            subscriptions,
            metrics,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Subscribes a handler to one event kind, or to all kinds when `kind` is `None`.
    pub fn subscribe<F>(&self, kind: Option<EventKind>, handler: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.subscriptions.write().push(Arc::new(Subscription {
            kind,
            handler: Arc::new(handler),
        }));
    }

    /// Returns the delivery counters.
    #[must_use]
    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }

    fn sender(&self) -> Option<mpsc::Sender<Message>> {
        self.tx.read().clone()
    }

    /// Waits until every event queued before this call has been dispatched.
    ///
    /// Returns false if the bus has been shut down.
    pub async fn flush(&self) -> bool {
        let Some(tx) = self.sender() else {
            return false;
        };
        let (ack, done) = oneshot::channel();
        if tx.send(Message::Flush(ack)).await.is_err() {
            return false;
        }
        done.await.is_ok()
    }

    /// Stops accepting events, drains the queue and waits for the worker.
    pub async fn shutdown(&self) {
        drop(self.tx.write().take());
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                warn!(error = %e, "Event bus worker ended abnormally");
            }
        }
    }

    fn record_drop(&self, event: &PipelineEvent) {
        self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            event_type = %event.kind,
            dropped_total = self.metrics.dropped(),
            "Event dropped due to backpressure"
        );
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriptions.read().len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Message>,
    subscriptions: Subscriptions,
    metrics: Arc<BusMetrics>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Event(event) => dispatch(&event, &subscriptions, &metrics),
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Event bus worker stopped");
}

fn dispatch(event: &PipelineEvent, subscriptions: &Subscriptions, metrics: &BusMetrics) {
    let matching: Vec<Arc<Subscription>> = subscriptions
        .read()
        .iter()
        .filter(|s| s.matches(event.kind))
        .cloned()
        .collect();

    for (index, subscription) in matching.iter().enumerate() {
        let handler = &subscription.handler;
        if std::panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_ok() {
            metrics.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            metrics.handler_failures.fetch_add(1, Ordering::Relaxed);
            warn!(event_type = %event.kind, handler = index, "Event handler panicked");
        }
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn emit(&self, event: PipelineEvent) {
        let Some(tx) = self.sender() else {
            self.record_drop(&event);
            return;
        };
        match tx.send(Message::Event(event)).await {
            Ok(()) => {
                self.metrics.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::SendError(message)) => {
                if let Message::Event(event) = message {
                    self.record_drop(&event);
                }
            }
        }
    }

    fn try_emit(&self, event: PipelineEvent) {
        let Some(tx) = self.sender() else {
            self.record_drop(&event);
            return;
        };
        match tx.try_send(Message::Event(event)) {
            Ok(()) => {
                self.metrics.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(Message::Event(event))) if event.kind.is_terminal() => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    self.record_drop(&event);
                    return;
                };
                let metrics = self.metrics.clone();
                runtime.spawn(async move {
                    let kind = event.kind;
                    if tx.send(Message::Event(event)).await.is_ok() {
                        metrics.published.fetch_add(1, Ordering::Relaxed);
                    } else {
                        metrics.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(event_type = %kind, "Terminal event dropped, bus shut down");
                    }
                });
            }
            Err(
                mpsc::error::TrySendError::Full(message)
                | mpsc::error::TrySendError::Closed(message),
            ) => {
                if let Message::Event(event) = message {
                    self.record_drop(&event);
                }
            }
        }
    }
}
