//! Token-based identity lookup
//!
//! Users authenticate the stream with an opaque bearer token. Only the
//! SHA-256 digest of the token is stored.

use async_trait::async_trait;
use emotrack_common::IdentityId;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identity::IdentityResolver;

/// Lower-case hex SHA-256 of a token
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}

/// Store the digest of `token` for `user_id`, replacing any previous token
pub async fn store_token(pool: &SqlitePool, user_id: IdentityId, token: &str) -> Result<()> {
    let result = sqlx::query("UPDATE users SET token_hash = ? WHERE id = ?")
        .bind(token_digest(token))
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Common(emotrack_common::Error::NotFound(format!(
            "user {}",
            user_id
        ))));
    }
    Ok(())
}

/// Resolves tokens against `users.token_hash`
#[derive(Debug, Clone)]
pub struct SqliteIdentityResolver {
    pool: SqlitePool,
}

impl SqliteIdentityResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityResolver for SqliteIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<IdentityId> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(Error::Auth("missing token".to_string()));
        }

        let row: Option<(IdentityId, i64)> =
            sqlx::query_as("SELECT id, active FROM users WHERE token_hash = ?")
                .bind(token_digest(credential))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    // Fail closed: a lookup that cannot complete rejects admission
                    warn!("Identity lookup failed: {}", e);
                    Error::Auth("identity lookup unavailable".to_string())
                })?;

        match row {
            Some((id, active)) if active != 0 => {
                debug!(identity_id = id, "Resolved identity");
                Ok(id)
            }
            Some((id, _)) => Err(Error::Auth(format!("user {} is inactive", id))),
            None => Err(Error::Auth("unknown token".to_string())),
        }
    }
}
