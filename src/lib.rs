//! # Sentry Apps
//!
//! Registry of third-party integration apps owned by organizations, served over
//! HTTP. Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sentry_apps::server::{AppState, create_router};
//! use sentry_apps::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/sentry-apps.db").unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), Vec::new()));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `sentry-apps` binary. Disable with `default-features = false`.

pub mod apps;
pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
