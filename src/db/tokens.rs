//! Refresh token persistence. Only SHA-256 hashes are stored.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::RefreshToken;

pub async fn insert(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
           VALUES ($1, $2, $3)"#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find(pool: &PgPool, token_hash: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
    sqlx::query_as::<_, RefreshToken>(
        r#"SELECT id, user_id, token_hash, expires_at, revoked, created_at
           FROM refresh_tokens
           WHERE token_hash = $1"#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
}

/// Revoke a single token. Returns true when an active token was revoked.
pub async fn revoke(pool: &PgPool, token_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked = true WHERE token_hash = $1 AND revoked = false",
    )
    .bind(token_hash)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

const PURGE_STALE: &str =
    "DELETE FROM refresh_tokens WHERE expires_at < now() OR revoked = true";

/// Drop tokens that can never be exchanged again: expired or revoked.
pub async fn purge_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(PURGE_STALE).execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_covers_expired_and_revoked_tokens() {
        assert!(PURGE_STALE.contains("expires_at < now()"));
        assert!(PURGE_STALE.contains("revoked = true"));
    }
}
