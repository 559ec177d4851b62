use crate::{
    domain::FileStorage,
    errors::StorageError,
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{
    primitives::ByteStream,
    Client as S3Client,
    error::SdkError,
};
use std::path::PathBuf;
use tracing;
use uuid::Uuid;

/// Prefix shared by every uploaded photo key.
pub const UPLOAD_PREFIX: &str = "uploads";

/// URL path under which stored assets are served.
pub const STATIC_ROUTE: &str = "/static";

/// Builds a collision-resistant key for an uploaded file: `uploads/<hex uuid>_<name>`.
pub fn upload_key(original_filename: Option<&str>) -> String {
    format!(
        "{}/{}_{}",
        UPLOAD_PREFIX,
        Uuid::new_v4().simple(),
        sanitize_filename(original_filename.unwrap_or_default())
    )
}

/// Public URL of a stored key.
pub fn public_url(key: &str) -> String {
    format!("{}/{}", STATIC_ROUTE, key)
}

/// Keeps only the last path component and maps anything outside `[A-Za-z0-9._-]` to `_`.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Rejects keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.contains('\\')
        || key.starts_with('/')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn guess_content_type(key: &str) -> Option<String> {
    mime_guess::from_path(key).first_raw().map(|s| s.to_string())
}

// --- Local filesystem ---

#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// `root` is the static directory; keys resolve relative to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tracing::debug!(path = %path.display(), content_type = ?content_type, "Local: Writing file");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::UploadFailed(format!("creating {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("writing {}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "Local: Write successful");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((bytes, guess_content_type(key))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::BackendError(
                anyhow::Error::new(e).context(format!("Local: Failed to read '{}'", path.display())),
            )),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::BackendError(
                anyhow::Error::new(e).context(format!("Local: Failed to remove '{}'", path.display())),
            )),
        }
    }
}

// --- S3 ---

#[derive(Debug, Clone)]
pub struct S3FileStorage {
    client: S3Client,
    bucket_name: String,
}

impl S3FileStorage {
    pub fn new(client: S3Client, bucket_name: String) -> Self {
        Self { client, bucket_name }
    }
}

#[async_trait]
impl FileStorage for S3FileStorage {
    /// Uploads data to S3 using PutObject. Sets Content-Type.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError> {
        validate_key(key)?;
        let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, %content_type, "S3: Uploading file");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .context(format!("S3: Failed to upload object with key '{}'", key))
            .map_err(|e| StorageError::UploadFailed(format!("{:#}", e)))?;

        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Upload successful");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
        validate_key(key)?;
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Downloading file");

        let output = self.client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|sdk_err| {
                if let SdkError::ServiceError(service_err) = &sdk_err {
                    if service_err.err().is_no_such_key() {
                        tracing::warn!(s3_key = %key, bucket = %self.bucket_name, "S3: NoSuchKey error downloading file");
                        return StorageError::NotFound(key.to_string());
                    }
                }
                tracing::error!(s3_key = %key, bucket = %self.bucket_name, error = %sdk_err, "S3: Error downloading file");
                StorageError::BackendError(anyhow::Error::new(sdk_err).context(format!("S3: Failed to download object with key '{}'", key)))
            })?;

        let content_type = output.content_type().map(|s| s.to_string());
        let data = output
            .body
            .collect()
            .await
            .context(format!("S3: Failed to read body of '{}'", key))?;

        Ok((data.into_bytes().to_vec(), content_type.or_else(|| guess_content_type(key))))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Deleting file");

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .context(format!("S3: Failed to delete object with key '{}'", key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_keys_are_unique_and_keep_filename() {
        let a = upload_key(Some("orion.jpg"));
        let b = upload_key(Some("orion.jpg"));
        assert_ne!(a, b);
        assert!(a.starts_with("uploads/"));
        assert!(a.ends_with("_orion.jpg"));
        // 32 hex chars between the prefix and the underscore
        let stem = a.trim_start_matches("uploads/");
        assert_eq!(stem.find('_'), Some(32));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\pics\\my photo.png"), "my_photo.png");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn traversal_keys_are_rejected() {
        assert!(validate_key("uploads/a.jpg").is_ok());
        for key in ["", "../secret", "uploads/../../x", "/etc/passwd", "uploads//a", "a\\b"] {
            assert!(matches!(validate_key(key), Err(StorageError::InvalidKey(_))), "{key}");
        }
    }

    #[test]
    fn public_url_is_under_static() {
        assert_eq!(public_url("uploads/x_a.png"), "/static/uploads/x_a.png");
    }

    #[tokio::test]
    async fn local_storage_round_trips_and_reports_missing() {
        let root = std::env::temp_dir().join(format!("stargaze-test-{}", Uuid::new_v4().simple()));
        let storage = LocalFileStorage::new(&root);

        storage
            .upload("uploads/sky.png", b"png-bytes".to_vec(), None)
            .await
            .unwrap();
        let (bytes, content_type) = storage.download("uploads/sky.png").await.unwrap();
        assert_eq!(bytes, b"png-bytes");
        assert_eq!(content_type.as_deref(), Some("image/png"));

        assert!(matches!(
            storage.download("uploads/missing.png").await,
            Err(StorageError::NotFound(_))
        ));

        storage.delete("uploads/sky.png").await.unwrap();
        assert!(matches!(
            storage.download("uploads/sky.png").await,
            Err(StorageError::NotFound(_))
        ));
        storage.delete("uploads/sky.png").await.unwrap();

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
