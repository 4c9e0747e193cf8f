use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use sentry_apps::apps::{self, NewSentryApp};
use sentry_apps::auth::TokenGenerator;
use sentry_apps::server::{AppState, create_router};
use sentry_apps::store::{SqliteStore, Store};
use sentry_apps::types::feature::INTERNAL_CATCHALL;
use sentry_apps::types::{AppStatus, Organization, Scopes, SentryApp, User};

/// An in-process server over a throwaway SQLite database.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    router: Router,
}

pub struct TestUser {
    pub user: User,
    pub token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with_features(Vec::new())
    }

    pub fn start_with_features(features: Vec<String>) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("test.db")).expect("open store");
        store.initialize().expect("initialize store");
        let store = Arc::new(store);

        let state = Arc::new(AppState::new(store.clone(), features));
        let router = create_router(state);

        Self {
            temp_dir,
            store,
            router,
        }
    }

    pub fn create_user(&self, email: &str, is_superuser: bool) -> TestUser {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            is_superuser,
            created_at: Utc::now(),
        };
        self.store.create_user(&user).expect("create user");

        let (token, raw) = TokenGenerator::new()
            .issue(&user.id, None)
            .expect("issue token");
        self.store.create_token(&token).expect("store token");

        TestUser { user, token: raw }
    }

    /// Creates an organization owned by `owner`.
    pub fn create_organization(&self, slug: &str, owner: Option<&TestUser>) -> Organization {
        let org = Organization {
            id: Uuid::new_v4().to_string(),
            slug: slug.to_string(),
            name: slug.to_string(),
            created_at: Utc::now(),
        };
        self.store.create_organization(&org).expect("create org");
        if let Some(owner) = owner {
            self.store
                .add_organization_member(&org.id, &owner.user.id)
                .expect("add member");
        }
        org
    }

    pub fn enable_catchall(&self, org: &Organization) {
        self.store
            .enable_organization_feature(&org.id, INTERNAL_CATCHALL)
            .expect("enable feature");
    }

    pub fn create_app(&self, name: &str, org: &Organization) -> SentryApp {
        apps::create(
            self.store.as_ref(),
            NewSentryApp {
                name: name.to_string(),
                organization: org.clone(),
                scopes: Scopes::default(),
                webhook_url: "https://example.com".to_string(),
            },
        )
        .expect("create app")
    }

    pub fn publish(&self, app: &SentryApp) {
        self.store
            .update_sentry_app_status(&app.uuid, AppStatus::Published)
            .expect("publish app");
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.send(method, uri, token, body.map(|body| body.to_string()))
            .await
    }

    /// Sends `body` verbatim as a JSON request body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body))
            .await
    }
}
