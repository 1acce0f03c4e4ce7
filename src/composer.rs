use std::sync::Arc;

use crate::api::models::NewMessage;
use crate::api::stream::MessageStream;
use crate::asset::{AssetPick, DEFAULT_MAX_IMAGE_BYTES};
use crate::error::ComposeError;
use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the stream. It shows up once a snapshot carries it.
    Sent { id: String },
    /// Nothing to send: blank draft or cancelled pick.
    Skipped,
}

/// Builds outbound records from the input box and appends them to the stream.
///
/// The draft is cleared only after the stream accepts a record, so a failed
/// send leaves the text in place for a manual retry.
pub struct Composer<S> {
    stream: Arc<S>,
    identity: Identity,
    draft: String,
    max_image_bytes: u64,
}

impl<S: MessageStream> Composer<S> {
    pub fn new(stream: Arc<S>, identity: Identity) -> Self {
        Self {
            stream,
            identity,
            draft: String::new(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_image_bytes(mut self, max: u64) -> Self {
        self.max_image_bytes = max;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Whether the text send action should be enabled.
    pub fn can_send_text(&self) -> bool {
        !self.draft.trim().is_empty()
    }

    pub async fn send_text(&mut self) -> Result<SendOutcome, ComposeError> {
        if !self.can_send_text() {
            return Ok(SendOutcome::Skipped);
        }
        let record = NewMessage::text(self.identity.as_str(), self.draft.clone());
        self.append(record).await
    }

    /// Sends the picked image, captioned with the current draft if there is one.
    pub async fn send_image(&mut self, pick: AssetPick) -> Result<SendOutcome, ComposeError> {
        let AssetPick::Picked(asset) = pick else {
            return Ok(SendOutcome::Skipped);
        };

        let encoded = asset.read_base64(self.max_image_bytes).await.map_err(|err| {
            log::error!("Error reading image {}: {err}", asset.uri);
            ComposeError::from(err)
        })?;
        let caption = (!self.draft.is_empty()).then(|| self.draft.clone());
        let record = NewMessage::image(self.identity.as_str(), encoded, caption);
        self.append(record).await
    }

    async fn append(&mut self, record: NewMessage) -> Result<SendOutcome, ComposeError> {
        match self.stream.append(record).await {
            Ok(id) => {
                log::debug!("message {id} accepted");
                self.draft.clear();
                Ok(SendOutcome::Sent { id })
            }
            Err(err) => {
                log::error!("Error sending message: {err}");
                Err(ComposeError::Append(err))
            }
        }
    }
}

#[cfg(test)]
#[path = "composer_test.rs"]
mod composer_test;
