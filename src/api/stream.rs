//! The remote ordered stream seen from the client: append records, subscribe
//! to full ordered snapshots.
//!
//! A subscription is a channel. The stream side holds a [`SnapshotSender`]
//! and pushes one [`Delivery`] per change; the consumer side holds the
//! [`Subscription`] and cancels it by closing the channel.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::models::{Message, NewMessage, Timestamp};
use crate::error::StreamError;

/// One event on a subscription: the full ordered snapshot, or a failure.
pub type Delivery = Result<Vec<Message>, StreamError>;

#[async_trait]
pub trait MessageStream: Send + Sync + 'static {
    /// Appends a record; the stream assigns its id and server timestamp.
    async fn append(&self, message: NewMessage) -> Result<String, StreamError>;

    /// Opens a subscription ordered by `createdAt` ascending.
    async fn subscribe(&self) -> Result<Subscription, StreamError>;
}

pub struct Subscription {
    deliveries: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    pub fn channel() -> (SnapshotSender, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SnapshotSender { tx }, Subscription { deliveries: rx })
    }

    /// Waits for the next delivery. `None` once the stream side has gone away.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }

    /// Stops the stream side from delivering anything further.
    pub fn cancel(&mut self) {
        self.deliveries.close();
    }
}

#[derive(Clone)]
pub struct SnapshotSender {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl SnapshotSender {
    /// Returns `false` if the subscriber has cancelled.
    pub fn deliver(&self, snapshot: Vec<Message>) -> bool {
        self.tx.send(Ok(snapshot)).is_ok()
    }

    pub fn fail(&self, err: StreamError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the subscriber cancels or drops its [`Subscription`].
    pub async fn cancelled(&self) {
        self.tx.closed().await;
    }
}

enum IdScheme {
    Random,
    Sequential { next: u64 },
}

enum Clock {
    System,
    Stepped { next_seconds: i64 },
}

struct Collection {
    messages: Vec<Message>,
    subscribers: Vec<SnapshotSender>,
    ids: IdScheme,
    clock: Clock,
}

impl Collection {
    fn next_id(&mut self) -> String {
        match &mut self.ids {
            IdScheme::Random => uuid::Uuid::new_v4().to_string(),
            IdScheme::Sequential { next } => {
                let id = format!("m{next}");
                *next += 1;
                id
            }
        }
    }

    fn next_timestamp(&mut self) -> Timestamp {
        match &mut self.clock {
            Clock::System => Timestamp::now(),
            Clock::Stepped { next_seconds } => {
                let ts = Timestamp::new(*next_seconds, 0);
                *next_seconds += 1;
                ts
            }
        }
    }

    fn broadcast(&mut self) {
        let snapshot = self.messages.clone();
        self.subscribers.retain(|sub| sub.deliver(snapshot.clone()));
    }
}

/// In-process document collection with server-side ordering.
///
/// Every change pushes the full ordered snapshot to every live subscriber,
/// and a new subscriber gets the current snapshot straight away.
pub struct MemoryStream {
    inner: Mutex<Collection>,
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStream {
    /// Random ids, wall-clock timestamps.
    pub fn new() -> Self {
        Self::with(IdScheme::Random, Clock::System)
    }

    /// Ids `m1`, `m2`, ... and timestamps `first_seconds`, `first_seconds + 1`, ...
    pub fn sequential(first_seconds: i64) -> Self {
        Self::with(
            IdScheme::Sequential { next: 1 },
            Clock::Stepped {
                next_seconds: first_seconds,
            },
        )
    }

    fn with(ids: IdScheme, clock: Clock) -> Self {
        Self {
            inner: Mutex::new(Collection {
                messages: Vec::new(),
                subscribers: Vec::new(),
                ids,
                clock,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Collection>, StreamError> {
        self.inner
            .lock()
            .map_err(|_| StreamError::Protocol("memory stream poisoned".into()))
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().map(|c| c.messages.clone()).unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .map(|mut c| {
                c.subscribers.retain(|s| !s.is_cancelled());
                c.subscribers.len()
            })
            .unwrap_or(0)
    }

    /// Pushes a subscription failure to every subscriber, as a dropped
    /// connection or revoked permission would.
    pub fn fail_subscribers(&self, reason: &str) {
        if let Ok(mut c) = self.lock() {
            c.subscribers
                .retain(|sub| sub.fail(StreamError::Subscription(reason.to_string())));
        }
    }
}

#[async_trait]
impl MessageStream for MemoryStream {
    async fn append(&self, message: NewMessage) -> Result<String, StreamError> {
        let mut c = self.lock()?;
        let id = c.next_id();
        let created_at = c.next_timestamp();
        c.messages.push(message.commit(id.clone(), created_at));
        // stable, so equal timestamps keep append order
        c.messages.sort_by_key(|m| m.created_at);
        c.broadcast();
        log::debug!("appended {id} at {}.{:09}", created_at.seconds, created_at.nanoseconds);
        Ok(id)
    }

    async fn subscribe(&self) -> Result<Subscription, StreamError> {
        let (sender, subscription) = Subscription::channel();
        let mut c = self.lock()?;
        sender.deliver(c.messages.clone());
        c.subscribers.push(sender);
        Ok(subscription)
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
