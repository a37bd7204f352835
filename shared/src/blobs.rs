//! Opaque storage for uploaded proof documents and profile pictures.

use base64::Engine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;

use crate::types::UploadedFile;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("{0}")]
    InvalidData(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("blob storage failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub trait BlobStore: Send + Sync {
    fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), BlobError>> + Send;

    fn fetch(&self, key: &str) -> impl Future<Output = Result<StoredBlob, BlobError>> + Send;
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        self.blobs.lock().insert(
            key.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<StoredBlob, BlobError> {
        self.blobs
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFolder {
    AchievementProofs,
    ProfilePictures,
}

impl UploadFolder {
    pub const ALL: [UploadFolder; 2] = [UploadFolder::AchievementProofs, UploadFolder::ProfilePictures];

    pub fn prefix(&self) -> &'static str {
        match self {
            UploadFolder::AchievementProofs => "achievement_proofs",
            UploadFolder::ProfilePictures => "profile_pictures",
        }
    }

    /// Profile pictures take images only; proofs take any document.
    fn accepts(&self, extension: &str) -> bool {
        match self {
            UploadFolder::AchievementProofs => true,
            UploadFolder::ProfilePictures => IMAGE_EXTENSIONS.contains(&extension),
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Decodes an inline upload, stores it under `{folder}/{uuid}.{ext}` and
/// returns the public reference `{media_base_url}/{key}`.
///
/// The stored content type follows the file extension; any type the client
/// claims is ignored.
pub async fn upload<B: BlobStore>(
    blobs: &B,
    folder: UploadFolder,
    file: &UploadedFile,
    media_base_url: &str,
) -> Result<String, BlobError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(file.file_data.trim())
        .map_err(|e| BlobError::InvalidData(format!("Failed to decode base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(BlobError::InvalidData(
            "The submitted file is empty.".to_string(),
        ));
    }

    let extension = extension(&file.file_name);
    if !folder.accepts(&extension) {
        return Err(BlobError::InvalidData(
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                .to_string(),
        ));
    }
    let content_type = guess_content_type(&extension);
    let key = format!(
        "{}/{}.{}",
        folder.prefix(),
        uuid::Uuid::new_v4(),
        extension
    );

    blobs.put(&key, content_type, bytes).await?;
    tracing::info!("Stored upload {} ({})", key, content_type);
    Ok(format!("{}/{}", media_base_url, key))
}

/// Keys this service wrote: a known folder and one safe file name.
pub fn is_served_key(key: &str) -> bool {
    let Some((folder, name)) = key.split_once('/') else {
        return false;
    };
    UploadFolder::ALL.iter().any(|f| f.prefix() == folder)
        && !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// Content type for a served key, from its extension alone.
pub fn content_type_for_key(key: &str) -> &'static str {
    guess_content_type(&extension(key))
}

fn guess_content_type(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
