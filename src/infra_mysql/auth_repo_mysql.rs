use super::util::downcast;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlAuthRepo {
    pool: MySqlPool,
}

impl MySqlAuthRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlAuthRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<AuthCredentialsRecord, AuthError> {
        Ok(AuthCredentialsRecord {
            user_id: row
                .try_get("user_id")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            username: row
                .try_get("username")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            is_active: row
                .try_get("is_active")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| AuthError::Store(e.to_string()))?,
        })
    }
}

#[async_trait::async_trait]
impl AuthRepo for MySqlAuthRepo {
    async fn create_credentials_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
        username: &str,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO auth_credential (user_id, username, password_hash)
VALUES (?, ?, ?)
"#,
        )
        .bind(user_id)
        .bind(username)
        .bind(password_hash)
        .execute(tx.conn())
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthCredentialsRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT c.user_id, c.username, c.password_hash, u.is_active, c.created_at
FROM auth_credential c
JOIN user u ON u.id = c.user_id
WHERE c.username = ?
"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }
}
