use super::util::downcast;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, AuthError> {
        Ok(UserRecord {
            user_id: row
                .try_get("id")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            username: row
                .try_get("username")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            email: row
                .try_get("email")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            bio: row
                .try_get("bio")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            profile_image_url: row
                .try_get("profile_image_url")
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
impl UserRepo for MySqlUserRepo {
    async fn create_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        username: &str,
        email: &str,
    ) -> Result<UserId, AuthError> {
        let tx = downcast(tx);

        let result = sqlx::query(
            r#"
INSERT INTO user (username, email, is_active)
VALUES (?, ?, 1)
"#,
        )
        .bind(username)
        .bind(email)
        .execute(tx.conn())
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(UserId(result.last_insert_id() as i64))
    }

    async fn get_username_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
    ) -> Result<String, AuthError> {
        let tx = downcast(tx);

        if let Some(row) =
            sqlx::query("SELECT username FROM user WHERE id = ? AND is_active = 1")
                .bind(user_id)
                .fetch_optional(tx.conn())
                .await
                .map_err(|e| AuthError::Store(format!("query username: {e}")))?
        {
            return Ok(row.get::<String, _>("username"));
        }

        Err(AuthError::UserNotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, username, email, bio, profile_image_url, is_active, created_at
FROM user
WHERE username = ? AND is_active = 1
"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM user WHERE username = ?"#)
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM user WHERE email = ?"#)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(count > 0)
    }

    async fn id_exists(&self, user_id: UserId) -> Result<bool, AuthError> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(1) FROM user WHERE id = ? AND is_active = 1"#)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(count > 0)
    }
}
