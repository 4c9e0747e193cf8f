pub const SCHEMA: &str = r#"
-- Organizations own apps; slugs are how callers refer to them
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    is_superuser INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS organization_members (
    organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (organization_id, user_id)
);

-- A row means the feature is enabled for the organization
CREATE TABLE IF NOT EXISTS organization_features (
    organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    feature TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (organization_id, feature)
);

-- Tokens are auth credentials bound to a user
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- 8-char lookup segment of the raw token
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

-- Third-party integration apps
CREATE TABLE IF NOT EXISTS sentry_apps (
    id TEXT PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL CHECK (length(name) > 0),
    slug TEXT NOT NULL,
    organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    scopes INTEGER NOT NULL DEFAULT 0,  -- bitmask over the scope vocabulary
    webhook_url TEXT NOT NULL CHECK (length(webhook_url) > 0),
    status TEXT NOT NULL DEFAULT 'unpublished' CHECK (status IN ('unpublished', 'published')),
    date_added TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_members_user ON organization_members(user_id);
CREATE INDEX IF NOT EXISTS idx_sentry_apps_date_added ON sentry_apps(date_added DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_sentry_apps_status ON sentry_apps(status, date_added DESC);
CREATE INDEX IF NOT EXISTS idx_sentry_apps_organization ON sentry_apps(organization_id);
"#;
