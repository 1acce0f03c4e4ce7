//! Offline-first chat core.
//!
//! A [`sync::SyncCoordinator`] mirrors a remote, server-ordered message
//! stream into a local key-value cache and publishes the current list;
//! a [`composer::Composer`] appends new text and image messages.
//! Both are built per signed-in identity by [`app::ChatApp`].

pub mod api;
pub mod app;
pub mod asset;
pub mod composer;
pub mod error;
pub mod identity;
pub mod notice;
pub mod storage;
pub mod sync;
pub mod ui;
pub mod utils;

pub use api::models::{Message, NewMessage, Timestamp};
pub use api::stream::{Delivery, MemoryStream, MessageStream, SnapshotSender, Subscription};
pub use app::{AppConfig, ChatApp, ChatSession};
pub use composer::{Composer, SendOutcome};
pub use error::{CacheError, ComposeError, ConfigError, ImageReadError, StreamError};
pub use identity::{AuthState, Identity, IdentityProvider, LocalIdentity};
pub use notice::Notice;
pub use storage::{KeyValueStore, MemoryStore, MessageCache, SqliteStore};
pub use sync::{MessageView, SyncCoordinator, ViewSource};
