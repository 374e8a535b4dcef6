//! Authentication collaborator: username/password accounts with Argon2
//! hashing, and HMAC-signed JWTs that resolve a bearer token to an
//! `owner_id`. Internals are free per the design (§1); the orchestrator only
//! ever sees the resolved id.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::database::MetadataStore;
use crate::error::{DfsError, DfsResult};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION".to_string(),
            jwt_ttl_secs: 24 * 3600,
        }
    }
}

pub struct AuthService {
    metadata: Arc<dyn MetadataStore>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(metadata: Arc<dyn MetadataStore>, config: AuthConfig) -> Self {
        Self { metadata, config }
    }

    fn hash_password(password: &str) -> DfsResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DfsError::Internal(format!("password hashing failed: {e}")))
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    }

    /// Registers a new account. Fails with `UsernameTaken` if the username
    /// is taken.
    pub async fn register(&self, username: &str, password: &str) -> DfsResult<i64> {
        if self.metadata.find_user_by_username(username).await?.is_some() {
            return Err(DfsError::UsernameTaken);
        }
        let hash = Self::hash_password(password)?;
        self.metadata.create_user(username, &hash).await
    }

    /// Verifies credentials and issues a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> DfsResult<String> {
        let user = self
            .metadata
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| DfsError::AuthFailure("invalid username or password".to_string()))?;

        if !Self::verify_password(password, &user.password_hash) {
            return Err(DfsError::AuthFailure("invalid username or password".to_string()));
        }

        let exp = chrono::Utc::now().timestamp() + self.config.jwt_ttl_secs;
        let claims = Claims {
            sub: user.id.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| DfsError::Internal(format!("token signing failed: {e}")))
    }

    /// Resolves a bearer token to an `owner_id`.
    pub fn resolve_token(&self, token: &str) -> DfsResult<i64> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| DfsError::AuthFailure(format!("invalid token: {e}")))?;

        data.claims
            .sub
            .parse()
            .map_err(|_| DfsError::AuthFailure("malformed token subject".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteMetadataStore;

    fn service() -> AuthService {
        let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        AuthService::new(metadata, AuthConfig::default())
    }

    #[tokio::test]
    async fn register_login_resolve_roundtrip() {
        let auth = service();
        let id = auth.register("alice", "hunter2").await.unwrap();
        let token = auth.login("alice", "hunter2").await.unwrap();
        assert_eq!(auth.resolve_token(&token).unwrap(), id);
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();
        let err = auth.register("alice", "other").await.unwrap_err();
        assert!(matches!(err, DfsError::UsernameTaken));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();
        let err = auth.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, DfsError::AuthFailure(_)));
    }

    #[tokio::test]
    async fn resolve_rejects_garbage_token() {
        let auth = service();
        assert!(auth.resolve_token("not-a-jwt").is_err());
    }
}
