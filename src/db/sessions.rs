use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::row_parsers::session_from_row;
use super::timestamp;
use crate::errors::AppResult;
use crate::models::session::Session;

/// Tokens are never stored; only their SHA-256 digest is.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub async fn record(pool: &SqlitePool, user_id: Uuid, token: &str) -> AppResult<Session> {
    let session = Session {
        id: Uuid::new_v4(),
        user_id,
        token_hash: hash_token(token),
        created_at: Utc::now(),
        revoked_at: None,
    };

    sqlx::query("INSERT INTO sessions (id, user_id, token_hash, created_at) VALUES (?, ?, ?, ?)")
        .bind(session.id.to_string())
        .bind(user_id.to_string())
        .bind(&session.token_hash)
        .bind(timestamp(session.created_at))
        .execute(pool)
        .await?;

    Ok(session)
}

pub async fn find_active(pool: &SqlitePool, token: &str) -> AppResult<Option<Session>> {
    let row = sqlx::query("SELECT * FROM sessions WHERE token_hash = ? AND revoked_at IS NULL")
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(session_from_row).transpose()
}

pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<Session>> {
    let rows = sqlx::query("SELECT * FROM sessions WHERE user_id = ? ORDER BY created_at")
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(session_from_row).collect()
}

/// Revoke every live session of a user; returns how many were revoked.
pub async fn revoke_all(conn: &mut SqliteConnection, user_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query("UPDATE sessions SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL")
        .bind(timestamp(Utc::now()))
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = hash_token("secret-token");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_token("secret-token"));
        assert_ne!(hash, hash_token("other-token"));
    }
}
