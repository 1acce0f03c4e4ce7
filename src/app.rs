use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::api::stream::MessageStream;
use crate::asset::{AssetPick, DEFAULT_MAX_IMAGE_BYTES};
use crate::composer::{Composer, SendOutcome};
use crate::error::{ComposeError, ConfigError};
use crate::identity::{AuthState, Identity};
use crate::notice::{self, Notice, NoticeSender};
use crate::storage::{DEFAULT_CACHE_KEY, KeyValueStore, MessageCache};
use crate::sync::{MessageView, SyncCoordinator};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub collection: String,
    pub cache_key: String,
    /// Defaults to `cache.sqlite` in the platform data dir.
    pub cache_path: Option<PathBuf>,
    pub max_image_bytes: u64,
    /// Login email to sign in with on startup.
    pub user: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            collection: "messages".to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_path: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            user: None,
        }
    }
}

impl AppConfig {
    pub fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("chat-mirror.toml"))
    }

    /// Reads the default config file. A missing or broken file yields defaults.
    pub fn load() -> Self {
        let Some(path) = Self::toml_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring config at {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::toml_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn server_url(&self) -> Option<String> {
        if self.server_url.trim().is_empty() {
            None
        } else {
            Some(crate::utils::normalize_url(&self.server_url))
        }
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_path
            .clone()
            .or_else(crate::storage::default_db_path)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.user.clone().and_then(Identity::new)
    }
}

/// Everything that lives while one identity is signed in: the sync
/// coordinator and the composer that share its stream.
pub struct ChatSession<C, S> {
    identity: Identity,
    sync: SyncCoordinator<C, S>,
    composer: Composer<S>,
    notices: NoticeSender,
}

impl<C: KeyValueStore, S: MessageStream> ChatSession<C, S> {
    pub async fn open(
        identity: Identity,
        cache: MessageCache<C>,
        stream: Arc<S>,
        notices: NoticeSender,
        max_image_bytes: u64,
    ) -> Self {
        let mut sync = SyncCoordinator::new(cache, Arc::clone(&stream), notices.clone());
        sync.start().await;
        let composer =
            Composer::new(stream, identity.clone()).with_max_image_bytes(max_image_bytes);
        Self {
            identity,
            sync,
            composer,
            notices,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn view(&self) -> watch::Receiver<MessageView> {
        self.sync.view()
    }

    pub fn current_view(&self) -> MessageView {
        self.sync.current()
    }

    pub fn composer(&self) -> &Composer<S> {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer<S> {
        &mut self.composer
    }

    pub async fn send_text(&mut self) -> Result<SendOutcome, ComposeError> {
        let res = self.composer.send_text().await;
        self.report(res)
    }

    pub async fn send_image(&mut self, pick: AssetPick) -> Result<SendOutcome, ComposeError> {
        let res = self.composer.send_image(pick).await;
        self.report(res)
    }

    fn report(
        &self,
        res: Result<SendOutcome, ComposeError>,
    ) -> Result<SendOutcome, ComposeError> {
        if let Err(err) = &res {
            notice::post(&self.notices, Notice::from(err));
        }
        res
    }

    pub async fn close(mut self) {
        self.sync.stop().await;
        log::info!("chat session for {} closed", self.identity);
    }
}

/// Opens a chat session while someone is signed in and tears it down on sign-out.
pub struct ChatApp<C, S> {
    cache: MessageCache<C>,
    stream: Arc<S>,
    notices: NoticeSender,
    max_image_bytes: u64,
    session: Option<ChatSession<C, S>>,
}

impl<C: KeyValueStore, S: MessageStream> ChatApp<C, S> {
    pub fn new(cache: MessageCache<C>, stream: Arc<S>, notices: NoticeSender) -> Self {
        Self {
            cache,
            stream,
            notices,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            session: None,
        }
    }

    pub fn with_max_image_bytes(mut self, max: u64) -> Self {
        self.max_image_bytes = max;
        self
    }

    pub fn session(&self) -> Option<&ChatSession<C, S>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ChatSession<C, S>> {
        self.session.as_mut()
    }

    pub async fn apply(&mut self, state: &AuthState) {
        match state {
            AuthState::SignedIn(identity) => {
                if self.session.as_ref().map(ChatSession::identity) == Some(identity) {
                    return;
                }
                self.shutdown().await;
                log::info!("opening chat session for {identity}");
                let session = ChatSession::open(
                    identity.clone(),
                    self.cache.clone(),
                    Arc::clone(&self.stream),
                    self.notices.clone(),
                    self.max_image_bytes,
                )
                .await;
                self.session = Some(session);
            }
            AuthState::SignedOut => self.shutdown().await,
        }
    }

    pub async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;
