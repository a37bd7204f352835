use std::str::FromStr;

const DEV_JWT_SECRET: &str = "local-development-secret";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StoreBackend::DynamoDb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                key: "STORE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// Runtime settings read from the Lambda environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub table_name: String,
    pub bucket_name: String,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub media_base_url: String,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match var("STORE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::DynamoDb,
        };
        let jwt_secret = match (var("JWT_SECRET"), backend) {
            (Some(secret), _) => secret,
            (None, StoreBackend::Memory) => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
            (None, StoreBackend::DynamoDb) => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        Ok(Self {
            backend,
            table_name: var("TABLE_NAME").unwrap_or_else(|| "achievement-tracker".to_string()),
            bucket_name: var("BUCKET_NAME")
                .unwrap_or_else(|| "achievement-tracker-media".to_string()),
            jwt_secret,
            access_token_ttl_secs: number(&var, "ACCESS_TOKEN_TTL_SECS", 300)?,
            refresh_token_ttl_secs: number(&var, "REFRESH_TOKEN_TTL_SECS", 86_400)?,
            media_base_url: var("MEDIA_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "/media".to_string()),
            password_hash_memory_kib: number(&var, "PASSWORD_HASH_MEMORY_KIB", 19_456)?,
            password_hash_iterations: number(&var, "PASSWORD_HASH_ITERATIONS", 2)?,
        })
    }

    /// In-memory settings with cheap password hashing, for tests.
    pub fn for_tests() -> Self {
        Self {
            backend: StoreBackend::Memory,
            table_name: "achievement-tracker-test".to_string(),
            bucket_name: "achievement-tracker-test".to_string(),
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_secs: 300,
            refresh_token_ttl_secs: 86_400,
            media_base_url: "/media".to_string(),
            password_hash_memory_kib: 256,
            password_hash_iterations: 1,
        }
    }
}

fn number<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => Ok(value),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}
