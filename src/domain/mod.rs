mod auth_service_impl;
mod message_service_impl;
mod notification_service_impl;
mod post_service_impl;

pub use auth_service_impl::*;
pub use message_service_impl::*;
pub use notification_service_impl::*;
pub use post_service_impl::*;
