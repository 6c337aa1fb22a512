use crate::application_port::*;

#[async_trait::async_trait]
pub trait RoleRepo: Send + Sync {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError>;
}
