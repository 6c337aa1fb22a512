use crate::application_port::{
    AccessClaims, AccessToken, AuthContext, AuthError, AuthService, AuthTokens, CredentialHasher,
    LoginInput, LoginResult, RefreshToken, RegisterInput, TokenCodec,
};
use crate::domain_model::UserId;
use crate::domain_port::{AuthRepo, RefreshTokenRepo, RoleRepo, TxManager, UserRepo};
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Role claimed by every freshly registered account.
pub const DEFAULT_ROLE: &str = "User";

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash).map_err(|e| {
            AuthError::InternalError(format!("invalid PHC hash: {}", e.to_string()))
        })?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::InternalError(format!(
                "verify error: {}",
                e.to_string()
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessTokenClaims {
    sub: String, // user id as string
    username: String,
    role: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
}

fn encode_access(
    uid: UserId,
    username: &str,
    role: &str,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + cfg.access_ttl;
    let claims = AccessTokenClaims {
        sub: uid.to_string(),
        username: username.to_owned(),
        role: role.to_owned(),
        exp: exp_dt.timestamp(),
        iat: iat_dt.timestamp(),
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::InternalError(e.to_string()))?;
    Ok((token, exp_dt))
}

fn decode_access(token: &str, cfg: &JwtConfig) -> Result<AccessTokenClaims, AuthError> {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = true;
    v.leeway = 0; // no clock-skew allowance
    v.set_audience(&[cfg.audience.clone()]);
    v.set_issuer(&[cfg.issuer.clone()]);
    let data = decode::<AccessTokenClaims>(token, &DecodingKey::from_secret(&cfg.signing_key), &v)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        })?;
    Ok(data.claims)
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    #[inline]
    fn parse_user_id(sub: &str) -> Result<UserId, AuthError> {
        let id = sub.parse::<UserId>().map_err(|_| AuthError::TokenInvalid)?;
        Ok(id)
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_access_token(
        &self,
        user_id: UserId,
        username: &str,
        role: &str,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_access(user_id, username, role, &self.cfg)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn verify_access_token(&self, token: &AccessToken) -> Result<AccessClaims, AuthError> {
        let claims = decode_access(&token.0, &self.cfg)?;
        let user_id = Self::parse_user_id(&claims.sub)?;
        Ok(AccessClaims {
            user_id,
            username: claims.username,
            role: claims.role,
        })
    }
}

pub struct RealAuthService {
    auth_repo: Arc<dyn AuthRepo>,
    user_repo: Arc<dyn UserRepo>,
    role_repo: Arc<dyn RoleRepo>,
    refresh_token_repo: Arc<dyn RefreshTokenRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    tx_manager: Arc<dyn TxManager>,
    refresh_ttl: Duration,
    max_username_len: usize,
    min_username_len: usize,
    min_password_len: usize,
}

impl RealAuthService {
    pub fn new(
        auth_repo: Arc<dyn AuthRepo>,
        user_repo: Arc<dyn UserRepo>,
        role_repo: Arc<dyn RoleRepo>,
        refresh_token_repo: Arc<dyn RefreshTokenRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        tx_manager: Arc<dyn TxManager>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            auth_repo,
            user_repo,
            role_repo,
            refresh_token_repo,
            credential_hasher,
            token_codec,
            tx_manager,
            refresh_ttl,
            max_username_len: 30,
            min_username_len: 3,
            min_password_len: 6,
        }
    }

    fn validate_register(&self, request: &RegisterInput) -> Result<(), AuthError> {
        let len = request.username.chars().count();
        if len < self.min_username_len || len > self.max_username_len {
            return Err(AuthError::Validation("invalid username length".to_string()));
        }
        if !request.email.contains('@') {
            return Err(AuthError::Validation("invalid email".to_string()));
        }
        if request.password.len() < self.min_password_len {
            return Err(AuthError::Validation("password too short".to_string()));
        }
        Ok(())
    }

    /// 256 bits from the OS RNG, hex encoded. Opaque to clients.
    fn new_refresh_token() -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Access token plus a fresh persisted refresh row.
    async fn issue_token_pair(
        &self,
        user_id: UserId,
        username: &str,
        role: &str,
    ) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self
            .token_codec
            .issue_access_token(user_id, username, role)
            .await?;

        let refresh_token = Self::new_refresh_token();
        let refresh_exp = Utc::now() + self.refresh_ttl;

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        self.refresh_token_repo
            .create_in_tx(tx.as_mut(), user_id, &refresh_token, role, refresh_exp)
            .await?;
        tx.commit()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(AuthTokens {
            access_token,
            refresh_token: RefreshToken(refresh_token),
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        self.validate_register(&request)?;

        // One indistinct error for both collisions.
        if self.user_repo.username_exists(&request.username).await?
            || self.user_repo.email_exists(&request.email).await?
        {
            return Err(AuthError::UserExists);
        }

        let password_hash = self
            .credential_hasher
            .hash_password(&request.password)
            .await?;

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let user_id = self
            .user_repo
            .create_in_tx(tx.as_mut(), &request.username, &request.email)
            .await?;

        self.auth_repo
            .create_credentials_in_tx(tx.as_mut(), user_id, &request.username, &password_hash)
            .await?;

        tx.commit()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(user_id)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { username, password } = request;

        let rec = self
            .auth_repo
            .get_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !rec.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self
            .issue_token_pair(rec.user_id, &rec.username, DEFAULT_ROLE)
            .await?;

        Ok(LoginResult {
            user_id: rec.user_id,
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let Some(record) = self
            .refresh_token_repo
            .consume_in_tx(tx.as_mut(), refresh_token)
            .await?
        else {
            let _ = tx.rollback().await;
            return Err(AuthError::TokenInvalid);
        };

        if record.expires_at <= Utc::now() {
            // Keep the deletion: an expired row is dead either way.
            tx.commit()
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;
            return Err(AuthError::TokenInvalid);
        }

        let username = match self
            .user_repo
            .get_username_in_tx(tx.as_mut(), record.user_id)
            .await
        {
            Ok(username) => username,
            Err(AuthError::UserNotFound) => {
                // Owner gone: consume the row and fail like any unknown token.
                tx.commit()
                    .await
                    .map_err(|e| AuthError::Store(e.to_string()))?;
                return Err(AuthError::TokenInvalid);
            }
            Err(e) => return Err(e),
        };

        let next_token = Self::new_refresh_token();
        let next_exp = Utc::now() + self.refresh_ttl;
        self.refresh_token_repo
            .create_in_tx(tx.as_mut(), record.user_id, &next_token, &record.role, next_exp)
            .await?;

        tx.commit()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let (access_token, access_exp) = self
            .token_codec
            .issue_access_token(record.user_id, &username, &record.role)
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token: RefreshToken(next_token),
            access_token_expires_at: access_exp,
            refresh_token_expires_at: next_exp,
        })
    }

    async fn authorize(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self
            .token_codec
            .verify_access_token(&AccessToken(token.to_string()))
            .await?;

        // A token naming a role the store no longer knows must not authorize,
        // and neither must a token for a deleted user.
        if !self.role_repo.role_exists(&claims.role).await? {
            return Err(AuthError::InsufficientRole);
        }
        if !self.user_repo.id_exists(claims.user_id).await? {
            return Err(AuthError::UserNotFound);
        }

        Ok(AuthContext {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        })
    }
}
