use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub user_id: UserId,
    pub token: String,
    /// Role snapshot taken at issue time; carried into the next access token.
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn create_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
        token: &str,
        role: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Atomically look up and delete the row for `token`. At most one
    /// concurrent caller gets `Some`; every later call gets `None`.
    /// The row is consumed even when it turns out to be expired.
    async fn consume_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;
}
