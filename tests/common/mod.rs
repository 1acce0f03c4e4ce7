#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chat_mirror::storage::DEFAULT_CACHE_KEY;
use chat_mirror::{
    KeyValueStore, MemoryStore, Message, MessageCache, MessageStream, MessageView, NewMessage,
    SnapshotSender, StreamError, Subscription, SyncCoordinator, Timestamp,
};
use chat_mirror::notice::{self, NoticeReceiver};
use tokio::sync::watch;

/// Stream stub: deliveries are pushed by the test, appends are recorded.
#[derive(Default)]
pub struct ScriptedStream {
    subscribers: Mutex<Vec<SnapshotSender>>,
    appended: Mutex<Vec<NewMessage>>,
}

impl ScriptedStream {
    pub fn deliver(&self, snapshot: Vec<Message>) -> bool {
        let subs = self.subscribers.lock().unwrap();
        let mut any = false;
        for sub in subs.iter() {
            any |= sub.deliver(snapshot.clone());
        }
        any
    }

    pub fn appended(&self) -> Vec<NewMessage> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageStream for ScriptedStream {
    async fn append(&self, message: NewMessage) -> Result<String, StreamError> {
        let mut appended = self.appended.lock().unwrap();
        appended.push(message);
        Ok(format!("m{}", appended.len()))
    }

    async fn subscribe(&self) -> Result<Subscription, StreamError> {
        let (sender, subscription) = Subscription::channel();
        self.subscribers.lock().unwrap().push(sender);
        Ok(subscription)
    }
}

pub fn message(id: &str, user: &str, text: &str, seconds: i64) -> Message {
    Message {
        id: id.into(),
        text: Some(text.into()),
        user: user.into(),
        created_at: Some(Timestamp::new(seconds, 0)),
        image_base64: None,
    }
}

pub fn store_with(messages: &[Message]) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_entry(
        DEFAULT_CACHE_KEY,
        &serde_json::to_string(messages).unwrap(),
    ))
}

pub fn coordinator<C: KeyValueStore, S: MessageStream>(
    store: Arc<C>,
    stream: Arc<S>,
) -> (SyncCoordinator<C, S>, NoticeReceiver) {
    let (tx, rx) = notice::channel();
    (
        SyncCoordinator::new(MessageCache::new(store, DEFAULT_CACHE_KEY), stream, tx),
        rx,
    )
}

pub async fn next_view(rx: &mut watch::Receiver<MessageView>) -> MessageView {
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("view update in time")
        .expect("coordinator alive");
    rx.borrow_and_update().clone()
}

pub fn cached_raw(store: &MemoryStore) -> Option<serde_json::Value> {
    store
        .raw(DEFAULT_CACHE_KEY)
        .map(|raw| serde_json::from_str(&raw).unwrap())
}
