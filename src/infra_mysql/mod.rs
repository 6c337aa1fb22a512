mod auth_repo_mysql;
mod message_repo_mysql;
mod notification_repo_mysql;
mod post_repo_mysql;
mod refresh_token_repo_mysql;
mod repo_tx_mysql;
mod role_repo_mysql;
mod user_repo_mysql;
mod util;

pub use auth_repo_mysql::*;
pub use message_repo_mysql::*;
pub use notification_repo_mysql::*;
pub use post_repo_mysql::*;
pub use refresh_token_repo_mysql::*;
pub use repo_tx_mysql::*;
pub use role_repo_mysql::*;
pub use user_repo_mysql::*;
pub use util::*;
