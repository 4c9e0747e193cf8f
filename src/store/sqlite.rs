use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const SENTRY_APP_COLUMNS: &str =
    "id, uuid, name, slug, organization_id, scopes, webhook_url, status, date_added";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width so that text ordering in SQL matches chronological ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// True for UNIQUE and PRIMARY KEY violations. Foreign key failures stay database errors.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        is_superuser: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn sentry_app_from_row(row: &Row<'_>) -> rusqlite::Result<SentryApp> {
    let status: String = row.get(7)?;
    let status = status.parse::<AppStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(SentryApp {
        id: row.get(0)?,
        uuid: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        organization_id: row.get(4)?,
        scopes: Scopes::from(row.get::<_, i64>(5)?),
        webhook_url: row.get(6)?,
        status,
        date_added: parse_datetime(&row.get::<_, String>(8)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Organization operations

    fn create_organization(&self, org: &Organization) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO organizations (id, slug, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![org.id, org.slug, org.name, format_datetime(&org.created_at)],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        self.conn()
            .query_row(
                "SELECT id, slug, name, created_at FROM organizations WHERE slug = ?1",
                params![slug],
                organization_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn add_organization_member(&self, organization_id: &str, user_id: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO organization_members (organization_id, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![organization_id, user_id, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn list_user_organizations(&self, user_id: &str) -> Result<Vec<Organization>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT o.id, o.slug, o.name, o.created_at
             FROM organizations o
             JOIN organization_members m ON m.organization_id = o.id
             WHERE m.user_id = ?1
             ORDER BY o.slug",
        )?;

        let rows = stmt.query_map(params![user_id], organization_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, email, is_superuser, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id,
                user.email,
                user.is_superuser,
                format_datetime(&user.created_at)
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT id, email, is_superuser, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT id, email, is_superuser, created_at FROM users WHERE email = ?1",
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn has_superuser(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE is_superuser = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                "SELECT id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at
                 FROM tokens WHERE token_lookup = ?1",
                params![lookup],
                |row| {
                    Ok(Token {
                        id: row.get(0)?,
                        token_hash: row.get(1)?,
                        token_lookup: row.get(2)?,
                        user_id: row.get(3)?,
                        created_at: parse_datetime(&row.get::<_, String>(4)?),
                        expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                        last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Feature operations

    fn enable_organization_feature(&self, organization_id: &str, feature: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO organization_features (organization_id, feature, created_at)
             VALUES (?1, ?2, ?3)",
            params![organization_id, feature, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn has_feature_for_any(&self, organization_ids: &[&str], feature: &str) -> Result<bool> {
        if organization_ids.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; organization_ids.len()].join(", ");
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM organization_features
             WHERE feature = ? AND organization_id IN ({placeholders}))"
        );

        let bindings = std::iter::once(feature).chain(organization_ids.iter().copied());
        let exists: bool = self
            .conn()
            .query_row(&sql, params_from_iter(bindings), |row| row.get(0))?;
        Ok(exists)
    }

    // App operations

    fn create_sentry_app(&self, app: &SentryApp) -> Result<()> {
        let result = self.conn().execute(
            &format!("INSERT INTO sentry_apps ({SENTRY_APP_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                app.id,
                app.uuid,
                app.name,
                app.slug,
                app.organization_id,
                i64::from(app.scopes),
                app.webhook_url,
                app.status.as_str(),
                format_datetime(&app.date_added),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_sentry_app(&self, uuid: &str) -> Result<Option<SentryApp>> {
        self.conn()
            .query_row(
                &format!("SELECT {SENTRY_APP_COLUMNS} FROM sentry_apps WHERE uuid = ?1"),
                params![uuid],
                sentry_app_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn find_all(&self, offset: i64, limit: i64) -> Result<Vec<SentryApp>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SENTRY_APP_COLUMNS} FROM sentry_apps
             ORDER BY date_added DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))?;

        let rows = stmt.query_map(params![limit, offset], sentry_app_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn find_by_status(
        &self,
        status: AppStatus,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SentryApp>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SENTRY_APP_COLUMNS} FROM sentry_apps WHERE status = ?1
             ORDER BY date_added DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![status.as_str(), limit, offset], sentry_app_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_sentry_apps(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM sentry_apps", [], |row| row.get(0))?;
        Ok(count)
    }

    fn update_sentry_app_status(&self, uuid: &str, status: AppStatus) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE sentry_apps SET status = ?1 WHERE uuid = ?2",
            params![status.as_str(), uuid],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn org(id: &str, slug: &str) -> Organization {
        Organization {
            id: id.to_string(),
            slug: slug.to_string(),
            name: slug.to_string(),
            created_at: Utc::now(),
        }
    }

    fn user(id: &str, email: &str, is_superuser: bool) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            is_superuser,
            created_at: Utc::now(),
        }
    }

    fn app(id: &str, org_id: &str, status: AppStatus, date_added: DateTime<Utc>) -> SentryApp {
        SentryApp {
            id: id.to_string(),
            uuid: format!("uuid-{id}"),
            name: format!("App {id}"),
            slug: format!("app-{id}"),
            organization_id: org_id.to_string(),
            scopes: Scopes::PROJECT_READ,
            webhook_url: "https://example.com".to_string(),
            status,
            date_added,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = test_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"organizations".to_string()));
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"organization_members".to_string()));
        assert!(tables.contains(&"organization_features".to_string()));
        assert!(tables.contains(&"tokens".to_string()));
        assert!(tables.contains(&"sentry_apps".to_string()));
    }

    #[test]
    fn test_organization_membership() {
        let (_temp, store) = test_store();

        store.create_organization(&org("o1", "zeta")).unwrap();
        store.create_organization(&org("o2", "alpha")).unwrap();
        store.create_organization(&org("o3", "other")).unwrap();
        store.create_user(&user("u1", "boop@example.com", false)).unwrap();
        store.add_organization_member("o1", "u1").unwrap();
        store.add_organization_member("o2", "u1").unwrap();
        store.add_organization_member("o2", "u1").unwrap();

        let orgs = store.list_user_organizations("u1").unwrap();
        let slugs: Vec<&str> = orgs.iter().map(|o| o.slug.as_str()).collect();
        assert_eq!(slugs, vec!["alpha", "zeta"]);

        assert_eq!(
            store.get_organization_by_slug("other").unwrap().unwrap().id,
            "o3"
        );
        assert!(matches!(
            store.create_organization(&org("o4", "alpha")),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn test_user_lookup_and_superuser() {
        let (_temp, store) = test_store();

        assert!(!store.has_superuser().unwrap());
        store.create_user(&user("u1", "a@example.com", true)).unwrap();
        assert!(store.has_superuser().unwrap());

        let fetched = store.get_user_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(fetched.id, "u1");
        assert!(fetched.is_superuser);
        assert!(matches!(
            store.create_user(&user("u2", "a@example.com", false)),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn test_token_lookup_collision() {
        let (_temp, store) = test_store();
        store.create_user(&user("u1", "a@example.com", false)).unwrap();

        let token = |id: &str| Token {
            id: id.to_string(),
            token_hash: "hash".to_string(),
            token_lookup: "lookup12".to_string(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        };

        store.create_token(&token("token-1")).unwrap();
        let result = store.create_token(&token("token-2"));
        assert!(matches!(result, Err(Error::TokenLookupCollision)));

        store.update_token_last_used("token-1").unwrap();
        let fetched = store.get_token_by_lookup("lookup12").unwrap().unwrap();
        assert!(fetched.last_used_at.is_some());
    }

    #[test]
    fn test_feature_for_any_organization() {
        let (_temp, store) = test_store();
        store.create_organization(&org("o1", "one")).unwrap();
        store.create_organization(&org("o2", "two")).unwrap();

        assert!(!store.has_feature_for_any(&["o1", "o2"], "organizations:x").unwrap());
        assert!(!store.has_feature_for_any(&[], "organizations:x").unwrap());

        store.enable_organization_feature("o2", "organizations:x").unwrap();
        store.enable_organization_feature("o2", "organizations:x").unwrap();

        assert!(store.has_feature_for_any(&["o1", "o2"], "organizations:x").unwrap());
        assert!(!store.has_feature_for_any(&["o1"], "organizations:x").unwrap());
        assert!(!store.has_feature_for_any(&["o2"], "organizations:y").unwrap());
    }

    #[test]
    fn test_listing_orders_newest_first() {
        let (_temp, store) = test_store();
        store.create_organization(&org("o1", "one")).unwrap();

        let now = Utc::now();
        store
            .create_sentry_app(&app("a", "o1", AppStatus::Published, now - Duration::hours(2)))
            .unwrap();
        store
            .create_sentry_app(&app("b", "o1", AppStatus::Unpublished, now - Duration::hours(1)))
            .unwrap();
        store
            .create_sentry_app(&app("c", "o1", AppStatus::Published, now))
            .unwrap();

        let all: Vec<String> = store
            .find_all(0, 10)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(all, vec!["c", "b", "a"]);

        let published: Vec<String> = store
            .find_by_status(AppStatus::Published, 0, 10)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(published, vec!["c", "a"]);

        let second_page = store.find_all(1, 1).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, "b");
        assert_eq!(store.count_sentry_apps().unwrap(), 3);
    }

    #[test]
    fn test_sentry_app_round_trip_and_status_update() {
        let (_temp, store) = test_store();
        store.create_organization(&org("o1", "one")).unwrap();
        store
            .create_sentry_app(&app("a", "o1", AppStatus::Unpublished, Utc::now()))
            .unwrap();

        let fetched = store.get_sentry_app("uuid-a").unwrap().unwrap();
        assert_eq!(fetched.scopes, Scopes::PROJECT_READ);
        assert_eq!(fetched.status, AppStatus::Unpublished);
        assert_eq!(fetched.organization_id, "o1");

        store
            .update_sentry_app_status("uuid-a", AppStatus::Published)
            .unwrap();
        let fetched = store.get_sentry_app("uuid-a").unwrap().unwrap();
        assert_eq!(fetched.status, AppStatus::Published);

        assert!(matches!(
            store.update_sentry_app_status("missing", AppStatus::Published),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_duplicate_uuid_rejected() {
        let (_temp, store) = test_store();
        store.create_organization(&org("o1", "one")).unwrap();

        let first = app("a", "o1", AppStatus::Unpublished, Utc::now());
        let mut second = app("b", "o1", AppStatus::Unpublished, Utc::now());
        second.uuid = first.uuid.clone();

        store.create_sentry_app(&first).unwrap();
        assert!(matches!(
            store.create_sentry_app(&second),
            Err(Error::AlreadyExists)
        ));
        assert_eq!(store.count_sentry_apps().unwrap(), 1);
    }

    #[test]
    fn test_app_requires_existing_organization() {
        let (_temp, store) = test_store();

        let result =
            store.create_sentry_app(&app("a", "missing", AppStatus::Unpublished, Utc::now()));
        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(store.count_sentry_apps().unwrap(), 0);
    }
}
