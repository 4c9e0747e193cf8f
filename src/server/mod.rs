pub mod dto;
pub mod features;
pub mod response;
mod router;
mod sentry_apps;
pub mod validation;

pub use router::{AppState, create_router};
pub use sentry_apps::sentry_apps_router;
