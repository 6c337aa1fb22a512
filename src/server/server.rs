use crate::application_impl::*;
use crate::application_port::*;
use crate::domain::*;
use crate::domain_port::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::Settings;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    pub message_service: Arc<dyn MessageService>,
    pub notification_service: Arc<dyn NotificationService>,
    pub post_service: Arc<dyn PostService>,
    pub connection_acceptor: Arc<dyn ConnectionAcceptor>,
    registry: Arc<ConnectionRegistry>,
    pool: Pool<MySql>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.database.max_connections)
            .connect(&settings.database.url)
            .await?;
        let tx_manager: Arc<dyn TxManager> = Arc::new(MySqlTxManager::new(pool.clone()));

        let auth_repo: Arc<dyn AuthRepo> = Arc::new(MySqlAuthRepo::new(pool.clone()));
        let user_repo: Arc<dyn UserRepo> = Arc::new(MySqlUserRepo::new(pool.clone()));
        let role_repo: Arc<dyn RoleRepo> = Arc::new(MySqlRoleRepo::new(pool.clone()));
        let refresh_token_repo: Arc<dyn RefreshTokenRepo> = Arc::new(MySqlRefreshTokenRepo::new());
        let message_repo: Arc<dyn MessageRepo> = Arc::new(MySqlMessageRepo::new(pool.clone()));
        let notification_repo: Arc<dyn NotificationRepo> =
            Arc::new(MySqlNotificationRepo::new(pool.clone()));
        let post_repo: Arc<dyn PostRepo> = Arc::new(MySqlPostRepo::new(pool.clone()));

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher {});
        let key = std::env::var("JWT_SIGNING_KEY")
            .unwrap_or_else(|_| "my-dev-secret-key".to_string())
            .into_bytes();
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.jwt.issuer.clone(),
            audience: settings.jwt.audience.clone(),
            access_ttl: Duration::from_secs(settings.jwt.access_ttl_secs),
            signing_key: key,
        }));

        let auth_service: Arc<dyn AuthService> = match settings.auth.backend.as_str() {
            "real" => Arc::new(RealAuthService::new(
                auth_repo,
                user_repo.clone(),
                role_repo,
                refresh_token_repo,
                credential_hasher,
                token_codec,
                tx_manager.clone(),
                Duration::from_secs(settings.jwt.refresh_ttl_secs),
            )),
            "fake" => Arc::new(FakeAuthService::new()),
            other => return Err(anyhow::anyhow!("Unknown auth backend: {}", other)),
        };

        let user_service: Arc<dyn UserService> = Arc::new(RealUserService::new(user_repo.clone()));
        let message_service: Arc<dyn MessageService> =
            Arc::new(RealMessageService::new(message_repo));

        // One registry instance for the process; both the message and the
        // notification traffic flow through it.
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(RealtimeDispatcher::new(
            registry.clone(),
            user_service.clone(),
            message_service.clone(),
        ));

        let notification_service: Arc<dyn NotificationService> =
            Arc::new(RealNotificationService::new(
                notification_repo,
                post_repo.clone(),
                user_repo.clone(),
                dispatcher.clone(),
            ));
        let post_service: Arc<dyn PostService> = Arc::new(RealPostService::new(
            post_repo,
            notification_service.clone(),
        ));

        let connection_acceptor: Arc<dyn ConnectionAcceptor> = dispatcher;

        info!("server started");

        Ok(Self {
            auth_service,
            user_service,
            message_service,
            notification_service,
            post_service,
            connection_acceptor,
            registry,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.registry.shutdown().await;
        self.pool.close().await;
    }
}
