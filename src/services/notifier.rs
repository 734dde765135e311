//! Post-commit notification side channel.
//!
//! The engine enqueues a fully-hydrated turn snapshot after a successful
//! commit; a background worker hands it to the configured sink. Delivery is
//! best-effort: sink failures are logged at WARN and never reach the caller,
//! and a full queue drops its oldest entry rather than blocking the request
//! path.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::models::Turn;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, turn: &Turn) -> anyhow::Result<()>;
}

/// Default sink: a structured log line per created turn. The email dispatcher
/// of the full deployment plugs in behind the same trait.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, turn: &Turn) -> anyhow::Result<()> {
        tracing::info!(
            workshop_id = %turn.workshop_id,
            turn_number = turn.turn_number,
            state = %turn.state,
            "turn created"
        );
        Ok(())
    }
}

struct Inner {
    queue: Mutex<VecDeque<Turn>>,
    capacity: usize,
    wake: Notify,
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                capacity: capacity.max(1),
                wake: Notify::new(),
            }),
        }
    }

    /// Start the delivery worker on the current runtime.
    pub fn spawn_worker(&self, sink: Arc<dyn NotificationSink>) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                let next = inner.queue.lock().pop_front();
                match next {
                    Some(turn) => {
                        if let Err(err) = sink.deliver(&turn).await {
                            tracing::warn!(
                                error = %err,
                                turn_number = turn.turn_number,
                                "notification delivery failed"
                            );
                        }
                    }
                    None => inner.wake.notified().await,
                }
            }
        });
    }

    /// Enqueue a created-turn notification. Called only after commit; never
    /// fails. Overflow drops the oldest queued entry.
    pub fn turn_created(&self, turn: Turn) {
        {
            let mut queue = self.inner.queue.lock();
            if queue.len() >= self.inner.capacity {
                queue.pop_front();
                tracing::warn!("notification queue full, dropping oldest entry");
            }
            queue.push_back(turn);
        }
        self.inner.wake.notify_one();
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }
}
