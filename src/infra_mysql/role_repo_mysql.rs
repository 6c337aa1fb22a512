use crate::application_port::*;
use crate::domain_port::*;
use sqlx::MySqlPool;

pub struct MySqlRoleRepo {
    pool: MySqlPool,
}

impl MySqlRoleRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRoleRepo { pool }
    }
}

#[async_trait::async_trait]
impl RoleRepo for MySqlRoleRepo {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM role WHERE name = ?"#)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(count > 0)
    }
}
