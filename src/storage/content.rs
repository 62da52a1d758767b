//! Content-addressed image storage.
//!
//! Images are named by the SHA-256 of their bytes, so storing the same
//! image twice lands on the same file with the same content. Nothing is
//! ever deleted or reference counted.
//!
//! # Storage Layout
//!
//! ```text
//! <image_dir>/
//! ├── default.jpg                 # placeholder served for missing blobs
//! └── <sha256 hex>.jpeg           # one file per distinct image
//! ```

use std::path::{Path, PathBuf};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{ListingError, Result};

/// File suffix appended to every digest
pub const IMAGE_EXTENSION: &str = "jpeg";

/// File name of the placeholder image inside the image directory
pub const DEFAULT_IMAGE_NAME: &str = "default.jpg";

/// Length of a hex-encoded SHA-256 digest
const DIGEST_HEX_LEN: usize = 64;

/// Image key (`<sha256 hex>.jpeg`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageKey(String);

impl ImageKey {
    /// Compute the key for a blob
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(format!("{}.{}", hex::encode(digest), IMAGE_EXTENSION))
    }

    /// Parse a stored key. Only lowercase hex digests with the fixed
    /// suffix are accepted, which keeps keys inside the image directory.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || ListingError::Validation(format!("malformed image key: {}", s));

        let (digest, ext) = s.rsplit_once('.').ok_or_else(invalid)?;
        if ext != IMAGE_EXTENSION || digest.len() != DIGEST_HEX_LEN {
            return Err(invalid());
        }
        if !digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }

    /// The hex digest without the suffix
    pub fn digest(&self) -> &str {
        &self.0[..DIGEST_HEX_LEN]
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ImageKey {
    type Error = ListingError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ImageKey> for String {
    fn from(key: ImageKey) -> Self {
        key.0
    }
}

impl ToSql for ImageKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for ImageKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Filesystem store for image blobs
#[derive(Debug, Clone)]
pub struct ContentStore {
    /// Directory holding `<digest>.jpeg` files
    image_dir: PathBuf,

    /// Placeholder returned by `locate` when a blob is gone
    default_image: PathBuf,
}

impl ContentStore {
    /// Create a store rooted at `image_dir`, using `default.jpg` inside it
    /// as the placeholder
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        let image_dir = image_dir.into();
        let default_image = image_dir.join(DEFAULT_IMAGE_NAME);
        Self {
            image_dir,
            default_image,
        }
    }

    /// Override the placeholder path
    pub fn with_default_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_image = path.into();
        self
    }

    /// Get the image directory
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Get the placeholder path
    pub fn default_image(&self) -> &Path {
        &self.default_image
    }

    /// Ensure the image directory exists
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.image_dir)
            .await
            .map_err(|e| ListingError::storage(&self.image_dir, e))
    }

    /// Hash `bytes`, write them to `<image_dir>/<key>` and return the key.
    ///
    /// An existing file with the same key is overwritten; its content is
    /// identical by construction.
    pub async fn store(&self, bytes: &[u8]) -> Result<ImageKey> {
        let key = ImageKey::from_bytes(bytes);
        self.ensure_dir().await?;

        let path = self.resolve(&key);
        fs::write(&path, bytes)
            .await
            .map_err(|e| ListingError::storage(&path, e))?;

        debug!(key = %key, bytes = bytes.len(), "Stored image blob");
        Ok(key)
    }

    /// Storage path for `key`, whether or not the file exists
    pub fn resolve(&self, key: &ImageKey) -> PathBuf {
        self.image_dir.join(key.as_str())
    }

    /// Path to serve for `key`: the blob if present, otherwise the
    /// placeholder
    pub async fn locate(&self, key: &ImageKey) -> PathBuf {
        let path = self.resolve(key);
        match fs::try_exists(&path).await {
            Ok(true) => path,
            _ => {
                info!(path = %path.display(), "Image not found, serving default");
                self.default_image.clone()
            }
        }
    }

    /// Read the bytes `locate` resolves to
    pub async fn load(&self, key: &ImageKey) -> Result<Vec<u8>> {
        let path = self.locate(key).await;
        fs::read(&path)
            .await
            .map_err(|e| ListingError::storage(&path, e))
    }
}
