use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;
use tracker_shared::blobs::{BlobStore, MemoryBlobStore};
use tracker_shared::config::{Config, StoreBackend};
use tracker_shared::s3::S3BlobStore;
use tracker_shared::store::{DynamoStore, MemoryStore, Store};
use tracker_shared::AppState;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;
    tracing::info!(
        "Starting achievement tracker API with {:?} backend",
        config.backend
    );

    match config.backend {
        StoreBackend::Memory => {
            serve(AppState::new(config, MemoryStore::new(), MemoryBlobStore::new())?).await
        }
        StoreBackend::DynamoDb => {
            // Initialize AWS clients once at startup
            let aws = aws_config::load_from_env().await;
            let store = DynamoStore::new(DynamoClient::new(&aws), config.table_name.clone());
            let blobs = S3BlobStore::new(S3Client::new(&aws), config.bucket_name.clone());
            serve(AppState::new(config, store, blobs)?).await
        }
    }
}

async fn serve<S, B>(state: Arc<AppState<S, B>>) -> Result<(), Error>
where
    S: Store + 'static,
    B: BlobStore + 'static,
{
    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
