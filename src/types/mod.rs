pub mod feature;
mod models;
mod scope;

pub use models::*;
pub use scope::Scopes;
