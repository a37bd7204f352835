use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: u64,
    pub role: Role,
    pub student_id: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token is invalid or expired")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("Token has wrong type")]
    WrongType,
}

/// HS256 issuer and verifier for access/refresh pairs.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn issue(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access(user)?,
            refresh: self.sign(user, TokenType::Refresh, self.refresh_ttl_secs)?,
        })
    }

    pub fn issue_access(&self, user: &User) -> Result<String, TokenError> {
        self.sign(user, TokenType::Access, self.access_ttl_secs)
    }

    /// Checks signature, expiry and that the token is of the `expected` type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }

    fn sign(&self, user: &User, token_type: TokenType, ttl_secs: i64) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            user_id: user.id,
            role: user.role,
            student_id: user.student_id.clone(),
            token_type,
            iat: now,
            exp: now + ttl_secs,
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            student_id: "21CS042".to_string(),
            email: "s42@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Coordinator,
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_superuser: false,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn issued_pair_verifies_by_type() {
        let issuer = TokenIssuer::new("secret", 300, 86_400);
        let pair = issuer.issue(&user()).unwrap();

        let claims = issuer.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, Role::Coordinator);
        assert_eq!(claims.exp - claims.iat, 300);

        let refresh = issuer.verify(&pair.refresh, TokenType::Refresh).unwrap();
        assert_eq!(refresh.exp - refresh.iat, 86_400);
        assert_ne!(claims.jti, refresh.jti);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let issuer = TokenIssuer::new("secret", 300, 86_400);
        let pair = issuer.issue(&user()).unwrap();
        assert!(matches!(
            issuer.verify(&pair.access, TokenType::Refresh),
            Err(TokenError::WrongType)
        ));
        assert!(matches!(
            issuer.verify(&pair.refresh, TokenType::Access),
            Err(TokenError::WrongType)
        ));
    }

    #[test]
    fn expired_or_foreign_tokens_are_invalid() {
        let expired = TokenIssuer::new("secret", -60, -60);
        let token = expired.issue_access(&user()).unwrap();
        assert!(matches!(
            expired.verify(&token, TokenType::Access),
            Err(TokenError::Invalid(_))
        ));

        let other = TokenIssuer::new("other-secret", 300, 300);
        let foreign = other.issue_access(&user()).unwrap();
        let issuer = TokenIssuer::new("secret", 300, 300);
        assert!(matches!(
            issuer.verify(&foreign, TokenType::Access),
            Err(TokenError::Invalid(_))
        ));
        assert!(issuer.verify("garbage", TokenType::Access).is_err());
    }
}
