use std::path::PathBuf;

use base64::{Engine, prelude::BASE64_STANDARD};
use url::Url;

use crate::error::ImageReadError;

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// What the platform asset picker hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPick {
    Picked(PickedAsset),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedAsset {
    pub uri: String,
}

impl PickedAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Resolves `file://` URIs and bare paths. Other schemes are not readable here.
    pub fn local_path(&self) -> Result<PathBuf, ImageReadError> {
        match Url::parse(&self.uri) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|()| ImageReadError::UnsupportedUri(self.uri.clone())),
            // single-letter "schemes" are windows drive letters
            Ok(url) if url.scheme().len() > 1 => {
                Err(ImageReadError::UnsupportedUri(self.uri.clone()))
            }
            _ => Ok(PathBuf::from(&self.uri)),
        }
    }

    /// Reads the whole asset and encodes it as standard base64.
    pub async fn read_base64(&self, max_bytes: u64) -> Result<String, ImageReadError> {
        let path = self.local_path()?;
        let io_err = |source| ImageReadError::Io {
            path: path.clone(),
            source,
        };

        let size = tokio::fs::metadata(&path).await.map_err(io_err)?.len();
        if size > max_bytes {
            return Err(ImageReadError::TooLarge {
                size,
                max: max_bytes,
            });
        }

        let bytes = tokio::fs::read(&path).await.map_err(io_err)?;
        if bytes.is_empty() {
            return Err(ImageReadError::Empty(path));
        }
        Ok(BASE64_STANDARD.encode(bytes))
    }
}
