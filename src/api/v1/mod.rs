mod error;
mod guard;
mod handler;
mod router;

pub use error::recover_error;
pub use guard::*;
pub use router::routes;
