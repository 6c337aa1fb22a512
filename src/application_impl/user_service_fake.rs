use crate::application_port::{AuthError, UserService};
use crate::domain_model::{UserId, UserProfile};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// Fixed roster of known users; everything else is unknown.
pub struct FakeUserService {
    users: Mutex<HashMap<UserId, String>>,
}

impl FakeUserService {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_users(pairs: &[(UserId, &str)]) -> Self {
        let service = Self::new();
        {
            let mut users = service.users.lock().unwrap();
            for (id, name) in pairs {
                users.insert(*id, (*name).to_string());
            }
        }
        service
    }
}

#[async_trait::async_trait]
impl UserService for FakeUserService {
    async fn exists(&self, user_id: UserId) -> Result<bool, AuthError> {
        Ok(self.users.lock().unwrap().contains_key(&user_id))
    }

    async fn get_profile(&self, username: &str) -> Result<UserProfile, AuthError> {
        let user_id = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(_, name)| name.as_str() == username)
            .map(|(id, _)| *id)
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserProfile {
            user_id,
            username: username.to_string(),
            bio: None,
            profile_image_url: None,
            created_at: Utc::now(),
        })
    }
}
