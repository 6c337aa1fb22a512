mod auth_service;
mod message_service;
mod notification_service;
mod post_service;
mod user_service;

pub use auth_service::*;
pub use message_service::*;
pub use notification_service::*;
pub use post_service::*;
pub use user_service::*;
