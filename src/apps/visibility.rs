use crate::error::Result;
use crate::store::Store;
use crate::types::{AppStatus, Caller, SentryApp};

/// Offset window into an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

/// Returns the apps the caller may see, newest first.
///
/// Superusers see every app. Everyone else sees published apps only, including
/// for organizations they belong to.
pub fn list_visible(store: &dyn Store, caller: &Caller, page: Page) -> Result<Vec<SentryApp>> {
    if caller.is_superuser() {
        store.find_all(page.offset, page.limit)
    } else {
        store.find_by_status(AppStatus::Published, page.offset, page.limit)
    }
}
