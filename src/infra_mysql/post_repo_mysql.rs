use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlPostRepo {
    pool: MySqlPool,
}

impl MySqlPostRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlPostRepo { pool }
    }

    fn row_to_post(row: MySqlRow) -> Result<PostRecord, PostError> {
        Ok(PostRecord {
            post_id: row
                .try_get("id")
                .map_err(|e| PostError::Store(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| PostError::Store(e.to_string()))?,
            image_url: row
                .try_get("image_url")
                .map_err(|e| PostError::Store(e.to_string()))?,
            caption: row
                .try_get("caption")
                .map_err(|e| PostError::Store(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| PostError::Store(e.to_string()))?,
        })
    }
}

#[async_trait::async_trait]
impl PostRepo for MySqlPostRepo {
    async fn insert(
        &self,
        user_id: UserId,
        image_url: &str,
        caption: Option<&str>,
    ) -> Result<PostRecord, PostError> {
        let result = sqlx::query(
            r#"
INSERT INTO post (user_id, image_url, caption)
VALUES (?, ?, ?)
"#,
        )
        .bind(user_id)
        .bind(image_url)
        .bind(caption)
        .execute(&self.pool)
        .await
        .map_err(|e| PostError::Store(e.to_string()))?;

        let id = result.last_insert_id() as i64;
        let row = sqlx::query(
            r#"SELECT id, user_id, image_url, caption, created_at FROM post WHERE id = ?"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PostError::Store(e.to_string()))?;

        Self::row_to_post(row)
    }

    async fn get_by_id(&self, post_id: PostId) -> Result<Option<PostRecord>, PostError> {
        let row_opt = sqlx::query(
            r#"SELECT id, user_id, image_url, caption, created_at FROM post WHERE id = ?"#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PostError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_post).transpose()
    }

    async fn insert_like(&self, post_id: PostId, user_id: UserId) -> Result<bool, PostError> {
        let result = sqlx::query(r#"INSERT INTO post_like (post_id, user_id) VALUES (?, ?)"#)
            .bind(post_id)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_dup_key(&e) => Ok(false),
            Err(e) => Err(PostError::Store(e.to_string())),
        }
    }

    async fn insert_comment(
        &self,
        post_id: PostId,
        user_id: UserId,
        content: &str,
    ) -> Result<CommentRecord, PostError> {
        let result = sqlx::query(
            r#"
INSERT INTO comment (post_id, user_id, content)
VALUES (?, ?, ?)
"#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(|e| PostError::Store(e.to_string()))?;

        let id = result.last_insert_id() as i64;
        let row = sqlx::query(
            r#"SELECT id, post_id, user_id, content, created_at FROM comment WHERE id = ?"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PostError::Store(e.to_string()))?;

        Ok(CommentRecord {
            comment_id: row
                .try_get("id")
                .map_err(|e| PostError::Store(e.to_string()))?,
            post_id: row
                .try_get("post_id")
                .map_err(|e| PostError::Store(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| PostError::Store(e.to_string()))?,
            content: row
                .try_get("content")
                .map_err(|e| PostError::Store(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| PostError::Store(e.to_string()))?,
        })
    }
}
