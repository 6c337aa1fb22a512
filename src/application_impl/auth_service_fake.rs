use crate::application_port::*;
use crate::domain_model::UserId;
use chrono::{Duration, Utc};

#[derive(Debug)]
pub struct FakeAuthService;

impl FakeAuthService {
    pub fn new() -> Self {
        Self
    }
}

// Minimal fake for handler/guard tests. Tokens look like
// "fake-access-token:<id>:<role>"; user id 0 stands in for a deleted user,
// and the store only recognizes the "User" role.
#[async_trait::async_trait]
impl AuthService for FakeAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        Ok(get_fake_id(&request.username))
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let user_id = get_fake_id(&request.username);
        Ok(LoginResult {
            user_id,
            tokens: get_fake_tokens(user_id),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        if let Some(rest) = refresh_token.strip_prefix("fake-refresh-token:") {
            let user_id = rest.parse::<UserId>().map_err(|_| AuthError::TokenInvalid)?;
            Ok(get_fake_tokens(user_id))
        } else {
            Err(AuthError::TokenInvalid)
        }
    }

    async fn authorize(&self, token: &str) -> Result<AuthContext, AuthError> {
        let Some(rest) = token.strip_prefix("fake-access-token:") else {
            return Err(AuthError::TokenInvalid);
        };
        let (id, role) = rest.split_once(':').unwrap_or((rest, "User"));
        let user_id = id.parse::<UserId>().map_err(|_| AuthError::TokenInvalid)?;

        if role != "User" {
            return Err(AuthError::InsufficientRole);
        }
        if user_id.0 == 0 {
            return Err(AuthError::UserNotFound);
        }

        Ok(AuthContext {
            user_id,
            username: format!("user{}", user_id),
            role: role.to_string(),
        })
    }
}

fn get_fake_id(username: &str) -> UserId {
    // Stable, collision-tolerant id for a fixture name.
    let id = username
        .bytes()
        .fold(7i64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as i64));
    UserId(id.unsigned_abs() as i64)
}

fn get_fake_tokens(user_id: UserId) -> AuthTokens {
    let now = Utc::now();
    AuthTokens {
        access_token: AccessToken(format!("fake-access-token:{}:User", user_id)),
        access_token_expires_at: now + Duration::days(1),
        refresh_token: RefreshToken(format!("fake-refresh-token:{}", user_id)),
        refresh_token_expires_at: now + Duration::days(7),
    }
}
