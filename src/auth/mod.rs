mod helpers;
mod middleware;
mod token;

pub use middleware::{AuthError, RequireCaller};
pub use token::{TokenGenerator, parse_token};
