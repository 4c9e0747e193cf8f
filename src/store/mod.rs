mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Organization operations
    fn create_organization(&self, org: &Organization) -> Result<()>;
    fn get_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>>;
    fn add_organization_member(&self, organization_id: &str, user_id: &str) -> Result<()>;
    fn list_user_organizations(&self, user_id: &str) -> Result<Vec<Organization>>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn has_superuser(&self) -> Result<bool>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Feature operations
    fn enable_organization_feature(&self, organization_id: &str, feature: &str) -> Result<()>;
    fn has_feature_for_any(&self, organization_ids: &[&str], feature: &str) -> Result<bool>;

    // App operations. Listings are ordered by date_added, newest first.
    fn create_sentry_app(&self, app: &SentryApp) -> Result<()>;
    fn get_sentry_app(&self, uuid: &str) -> Result<Option<SentryApp>>;
    fn find_all(&self, offset: i64, limit: i64) -> Result<Vec<SentryApp>>;
    fn find_by_status(&self, status: AppStatus, offset: i64, limit: i64)
    -> Result<Vec<SentryApp>>;
    fn count_sentry_apps(&self) -> Result<i64>;
    fn update_sentry_app_status(&self, uuid: &str, status: AppStatus) -> Result<()>;
}
