use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;
use crate::types::{AppStatus, Organization, Scopes, SentryApp};

/// Input to [`create`]. Callers are expected to have validated it already.
#[derive(Debug, Clone)]
pub struct NewSentryApp {
    pub name: String,
    pub organization: Organization,
    pub scopes: Scopes,
    pub webhook_url: String,
}

/// Persists a new unpublished app for the organization with a fresh uuid.
///
/// Not idempotent: identical inputs produce distinct records. The record is
/// written with a single insert, so a failure leaves nothing behind.
pub fn create(store: &dyn Store, new_app: NewSentryApp) -> Result<SentryApp> {
    let uuid = Uuid::new_v4().to_string();
    let slug = slugify(&new_app.name).unwrap_or_else(|| format!("app-{}", &uuid[..8]));

    let app = SentryApp {
        id: Uuid::new_v4().to_string(),
        uuid,
        name: new_app.name,
        slug,
        organization_id: new_app.organization.id,
        scopes: new_app.scopes,
        webhook_url: new_app.webhook_url,
        status: AppStatus::Unpublished,
        date_added: Utc::now(),
    };

    store.create_sentry_app(&app)?;

    tracing::info!(
        uuid = %app.uuid,
        organization = %new_app.organization.slug,
        scopes = %app.scopes,
        "Created sentry app '{}'",
        app.name
    );

    Ok(app)
}

/// Lowercases and joins alphanumeric runs with hyphens. None if nothing is left.
fn slugify(name: &str) -> Option<String> {
    let slug = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    (!slug.is_empty()).then_some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SqliteStore, Organization) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();

        let org = Organization {
            id: "org-1".to_string(),
            slug: "acme".to_string(),
            name: "Acme".to_string(),
            created_at: Utc::now(),
        };
        store.create_organization(&org).unwrap();
        (temp, store, org)
    }

    fn new_app(org: &Organization) -> NewSentryApp {
        NewSentryApp {
            name: "MyApp".to_string(),
            organization: org.clone(),
            scopes: Scopes::PROJECT_READ.union(Scopes::PROJECT_WRITE),
            webhook_url: "https://example.com".to_string(),
        }
    }

    #[test]
    fn test_create_persists_unpublished_app() {
        let (_temp, store, org) = setup();

        let app = create(&store, new_app(&org)).unwrap();

        assert_eq!(app.name, "MyApp");
        assert_eq!(app.slug, "myapp");
        assert_eq!(app.status, AppStatus::Unpublished);
        assert_eq!(app.organization_id, "org-1");
        assert_eq!(app.scopes.to_strings(), vec!["project:read", "project:write"]);

        let stored = store.get_sentry_app(&app.uuid).unwrap().unwrap();
        assert_eq!(stored.name, "MyApp");
        assert_eq!(stored.webhook_url, "https://example.com");
        assert_eq!(stored.status, AppStatus::Unpublished);
    }

    #[test]
    fn test_create_is_not_idempotent() {
        let (_temp, store, org) = setup();

        let first = create(&store, new_app(&org)).unwrap();
        let second = create(&store, new_app(&org)).unwrap();

        assert_ne!(first.uuid, second.uuid);
        assert_ne!(first.id, second.id);
        assert_eq!(store.count_sentry_apps().unwrap(), 2);
    }

    #[test]
    fn test_create_allows_empty_scopes() {
        let (_temp, store, org) = setup();

        let mut input = new_app(&org);
        input.scopes = Scopes::default();
        let app = create(&store, input).unwrap();

        assert!(app.scopes.is_empty());
    }

    #[test]
    fn test_create_fails_for_unknown_organization() {
        let (_temp, store, mut org) = setup();
        org.id = "missing".to_string();

        assert!(create(&store, new_app(&org)).is_err());
        assert_eq!(store.count_sentry_apps().unwrap(), 0);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Cool App!"), Some("my-cool-app".to_string()));
        assert_eq!(slugify("  --Jira  Sync--"), Some("jira-sync".to_string()));
        assert_eq!(slugify("!!!"), None);
    }
}
