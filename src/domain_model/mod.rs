mod message;
mod notification;
mod post;
mod stream;
mod user;

pub use message::*;
pub use notification::*;
pub use post::*;
pub use stream::*;
pub use user::*;
