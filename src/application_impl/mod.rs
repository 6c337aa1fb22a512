mod auth_service_fake;
mod message_service_fake;
mod user_service_fake;
mod user_service_impl;

pub use auth_service_fake::*;
pub use message_service_fake::*;
pub use user_service_fake::*;
pub use user_service_impl::*;
