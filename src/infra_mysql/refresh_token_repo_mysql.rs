use super::util::downcast;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::Row;

pub struct MySqlRefreshTokenRepo;

impl MySqlRefreshTokenRepo {
    pub fn new() -> Self {
        MySqlRefreshTokenRepo
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MySqlRefreshTokenRepo {
    async fn create_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
        token: &str,
        role: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO refresh_token (user_id, token, role, expires_at)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(user_id)
        .bind(token)
        .bind(role)
        .bind(expires_at)
        .execute(tx.conn())
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn consume_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let tx = downcast(tx);

        // The locking read serializes concurrent consumers of the same
        // token string; only the first one sees the row.
        let row_opt = sqlx::query(
            r#"
SELECT user_id, token, role, expires_at
FROM refresh_token
WHERE token = ?
FOR UPDATE
"#,
        )
        .bind(token)
        .fetch_optional(tx.conn())
        .await
        .map_err(|e| AuthError::Store(format!("lock refresh token: {e}")))?;

        let Some(row) = row_opt else {
            return Ok(None);
        };

        let record = RefreshTokenRecord {
            user_id: row
                .try_get("user_id")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            token: row
                .try_get("token")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            role: row
                .try_get("role")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            expires_at: row
                .try_get("expires_at")
                .map_err(|e| AuthError::Store(e.to_string()))?,
        };

        sqlx::query(r#"DELETE FROM refresh_token WHERE token = ?"#)
            .bind(token)
            .execute(tx.conn())
            .await
            .map_err(|e| AuthError::Store(format!("delete refresh token: {e}")))?;

        Ok(Some(record))
    }
}
