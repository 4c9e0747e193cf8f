use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AppStatus, Scopes, SentryApp};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub per_page: Option<i64>,
}

/// Body of `POST /sentry-apps`. Fields are kept as raw JSON so that missing
/// or mistyped fields are reported per field by validation rather than by the
/// JSON extractor.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CreateSentryAppRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub organization: Option<Value>,
    #[serde(default)]
    pub scopes: Option<Value>,
    #[serde(default)]
    pub webhook_url: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SentryAppResponse {
    pub name: String,
    pub scopes: Scopes,
    pub uuid: String,
    pub webhook_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppStatus>,
}

impl SentryAppResponse {
    /// The public view: name, scopes, uuid and webhook url.
    #[must_use]
    pub fn public(app: SentryApp) -> Self {
        Self {
            name: app.name,
            scopes: app.scopes,
            uuid: app.uuid,
            webhook_url: app.webhook_url,
            slug: None,
            status: None,
        }
    }

    /// The public view plus slug and publish status.
    #[must_use]
    pub fn detailed(mut app: SentryApp) -> Self {
        let slug = std::mem::take(&mut app.slug);
        let status = app.status;
        Self {
            slug: Some(slug),
            status: Some(status),
            ..Self::public(app)
        }
    }
}
