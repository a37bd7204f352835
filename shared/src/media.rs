use lambda_http::{http::StatusCode, Body, Response};

use crate::blobs::{content_type_for_key, is_served_key, BlobStore};
use crate::error::ApiError;
use crate::http::ApiResult;

/// Stream an uploaded proof document or profile picture back to the client.
pub async fn serve<B: BlobStore>(blobs: &B, key: &str) -> ApiResult {
    if !is_served_key(key) {
        return Err(ApiError::not_found("File"));
    }
    let blob = blobs.fetch(key).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type_for_key(key))
        .header("X-Content-Type-Options", "nosniff")
        .header("Access-Control-Allow-Origin", "*")
        .header("Cache-Control", "public, max-age=31536000, immutable") // keys are never reused
        .body(Body::from(blob.bytes))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}
