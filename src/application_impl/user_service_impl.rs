use crate::application_port::{AuthError, UserService};
use crate::domain_model::{UserId, UserProfile};
use crate::domain_port::UserRepo;
use std::sync::Arc;

pub struct RealUserService {
    user_repo: Arc<dyn UserRepo>,
}

impl RealUserService {
    pub fn new(user_repo: Arc<dyn UserRepo>) -> RealUserService {
        RealUserService { user_repo }
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn exists(&self, user_id: UserId) -> Result<bool, AuthError> {
        self.user_repo.id_exists(user_id).await
    }

    async fn get_profile(&self, username: &str) -> Result<UserProfile, AuthError> {
        let record = self
            .user_repo
            .get_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserProfile {
            user_id: record.user_id,
            username: record.username,
            bio: record.bio,
            profile_image_url: record.profile_image_url,
            created_at: record.created_at,
        })
    }
}
