pub mod access;
pub mod achievements;
pub mod auth;
pub mod blobs;
pub mod config;
pub mod error;
pub mod filters;
pub mod http;
pub mod media;
pub mod notifications;
pub mod passwords;
pub mod profiles;
pub mod s3;
pub mod store;
pub mod tokens;
pub mod transitions;
pub mod types;
pub mod users;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use blobs::BlobStore;
use config::{Config, ConfigError};
use passwords::CredentialHasher;
use store::Store;
use tokens::TokenIssuer;

/// Shared application state
pub struct AppState<S, B> {
    pub config: Config,
    pub store: S,
    pub blobs: B,
    pub tokens: TokenIssuer,
    pub hasher: CredentialHasher,
}

impl<S: Store, B: BlobStore> AppState<S, B> {
    pub fn new(config: Config, store: S, blobs: B) -> Result<Arc<Self>, ConfigError> {
        let hasher = CredentialHasher::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
        )?;
        let tokens = TokenIssuer::new(
            &config.jwt_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        );
        Ok(Arc::new(Self {
            config,
            store,
            blobs,
            tokens,
            hasher,
        }))
    }
}
