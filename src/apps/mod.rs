//! App registry core: who sees which apps, and how new apps are recorded.

pub mod creator;
pub mod visibility;

pub use creator::{NewSentryApp, create};
pub use visibility::{Page, list_visible};
