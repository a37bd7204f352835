use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::blobs::{BlobError, BlobStore, StoredBlob};

/// Upload bucket on S3. Objects are private and served back through `/media`.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BlobError::Backend(format!("Failed to upload to S3: {}", e)))?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<StoredBlob, BlobError> {
        let result = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(result) => result,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => {
                return Err(BlobError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(BlobError::Backend(format!(
                    "Failed to get object from S3: {}",
                    e
                )))
            }
        };

        let content_type = result
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = result
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Backend(format!("Failed to read S3 body: {}", e)))?
            .into_bytes();

        Ok(StoredBlob {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
