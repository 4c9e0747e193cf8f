use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Scopes;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Publish status of an app. New apps start unpublished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    #[default]
    Unpublished,
    Published,
}

impl AppStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AppStatus::Unpublished => "unpublished",
            AppStatus::Published => "published",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpublished" => Ok(AppStatus::Unpublished),
            "published" => Ok(AppStatus::Published),
            other => Err(format!("unknown app status: {other}")),
        }
    }
}

/// A third-party integration registered against an organization.
#[derive(Debug, Clone, Serialize)]
pub struct SentryApp {
    #[serde(skip)]
    pub id: String,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    #[serde(skip)]
    pub organization_id: String,
    pub scopes: Scopes,
    pub webhook_url: String,
    pub status: AppStatus,
    pub date_added: DateTime<Utc>,
}

/// The authenticated user together with the organizations they belong to.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub organizations: Vec<Organization>,
}

impl Caller {
    #[must_use]
    pub fn is_superuser(&self) -> bool {
        self.user.is_superuser
    }

    /// Resolves an organization slug against the caller's own memberships.
    #[must_use]
    pub fn find_organization(&self, slug: &str) -> Option<&Organization> {
        self.organizations.iter().find(|org| org.slug == slug)
    }

    #[must_use]
    pub fn organization_ids(&self) -> Vec<&str> {
        self.organizations.iter().map(|org| org.id.as_str()).collect()
    }
}
