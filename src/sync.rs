//! Keeps the on-screen message list in step with the remote stream.
//!
//! `start` publishes whatever the cache holds, then subscribes. Each delivery
//! is a full ordered snapshot: it overwrites the cache and then replaces the
//! published view. Nothing is merged or diffed, so applying a snapshot twice
//! is the same as applying it once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::models::Message;
use crate::api::stream::{MessageStream, Subscription};
use crate::error::StreamError;
use crate::notice::{self, Notice, NoticeSender};
use crate::storage::{KeyValueStore, MessageCache};

/// Where the currently published messages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewSource {
    #[default]
    Empty,
    Cache,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageView {
    pub messages: Vec<Message>,
    pub source: ViewSource,
    /// Set after a subscription failure, cleared by the next good snapshot.
    pub offline: bool,
}

pub struct SyncCoordinator<C, S> {
    cache: MessageCache<C>,
    stream: Arc<S>,
    view: Arc<watch::Sender<MessageView>>,
    notices: NoticeSender,
    live: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<C: KeyValueStore, S: MessageStream> SyncCoordinator<C, S> {
    pub fn new(cache: MessageCache<C>, stream: Arc<S>, notices: NoticeSender) -> Self {
        let (view, _) = watch::channel(MessageView::default());
        Self {
            cache,
            stream,
            view: Arc::new(view),
            notices,
            live: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            worker: None,
        }
    }

    pub fn view(&self) -> watch::Receiver<MessageView> {
        self.view.subscribe()
    }

    pub fn current(&self) -> MessageView {
        self.view.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub async fn start(&mut self) {
        if self.is_running() {
            log::warn!("sync already started, ignoring");
            return;
        }
        self.live.store(true, Ordering::Release);

        if let Some(messages) = self.cache.load().await {
            log::debug!("showing {} cached messages", messages.len());
            self.view.send_modify(|view| {
                view.messages = messages;
                view.source = ViewSource::Cache;
            });
        }

        match self.stream.subscribe().await {
            Ok(subscription) => {
                let worker = SyncWorker {
                    cache: self.cache.clone(),
                    view: Arc::clone(&self.view),
                    notices: self.notices.clone(),
                    live: Arc::clone(&self.live),
                };
                let (shutdown, shutdown_rx) = oneshot::channel();
                self.shutdown = Some(shutdown);
                self.worker = Some(tokio::spawn(worker.run(subscription, shutdown_rx)));
            }
            Err(err) => report_offline(&self.view, &self.notices, &err),
        }
    }

    /// After this returns no delivery touches the view or the cache again.
    ///
    /// The worker is signalled, not aborted, so a cache write it already
    /// handed to the store lands before this returns.
    pub async fn stop(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                log::error!("sync worker failed: {err}");
            }
        }
    }
}

impl<C, S> Drop for SyncCoordinator<C, S> {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
        // dropping the sender wakes the worker too
        self.shutdown.take();
    }
}

fn report_offline(view: &watch::Sender<MessageView>, notices: &NoticeSender, err: &StreamError) {
    log::error!("message listener error: {err}");
    view.send_modify(|view| view.offline = true);
    notice::post(notices, Notice::offline(err));
}

struct SyncWorker<C> {
    cache: MessageCache<C>,
    view: Arc<watch::Sender<MessageView>>,
    notices: NoticeSender,
    live: Arc<AtomicBool>,
}

impl<C: KeyValueStore> SyncWorker<C> {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    async fn run(self, mut subscription: Subscription, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let delivery = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                delivery = subscription.next() => delivery,
            };
            let Some(delivery) = delivery else { break };
            if !self.is_live() {
                break;
            }
            match delivery {
                Ok(snapshot) => self.apply(snapshot).await,
                Err(err) => report_offline(&self.view, &self.notices, &err),
            }
        }
        subscription.cancel();
        log::debug!("sync worker finished");
    }

    async fn apply(&self, snapshot: Vec<Message>) {
        self.cache.save(&snapshot).await;
        if !self.is_live() {
            return;
        }
        log::debug!("applying snapshot of {} messages", snapshot.len());
        self.view.send_replace(MessageView {
            messages: snapshot,
            source: ViewSource::Remote,
            offline: false,
        });
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;
