use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sentry_apps::apps::{self, NewSentryApp};
use sentry_apps::auth::TokenGenerator;
use sentry_apps::config::ServerConfig;
use sentry_apps::server::{AppState, create_router};
use sentry_apps::store::{SqliteStore, Store};
use sentry_apps::types::feature::validate_feature_name;
use sentry_apps::types::{AppStatus, Organization, Scopes, User};

const TOKEN_FILE: &str = ".superuser_token";
const DB_FILE: &str = "sentry-apps.db";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "sentry-apps")]
#[command(about = "A registry of third-party integration apps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        /// Data directory for the database
        #[arg(long, default_value = "./data", global = true)]
        data_dir: PathBuf,

        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML config file with a [server] table
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Feature enabled for every organization (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the database and create the first superuser
    Init {
        /// Superuser email; prompted for when omitted
        #[arg(long)]
        email: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Create a user and print a token for it
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        superuser: bool,
    },

    /// Issue another token for an existing user
    CreateToken {
        #[arg(long)]
        email: String,

        /// Token lifetime in seconds; never expires when omitted
        #[arg(long)]
        expires_in_seconds: Option<i64>,
    },

    /// Create an organization
    CreateOrg {
        #[arg(long)]
        slug: String,

        #[arg(long)]
        name: Option<String>,

        /// Email of a user to add as the first member
        #[arg(long)]
        owner: Option<String>,
    },

    /// Add a user to an organization
    AddMember {
        #[arg(long)]
        org: String,

        #[arg(long)]
        email: String,
    },

    /// Enable a feature for an organization
    EnableFeature {
        #[arg(long)]
        org: String,

        #[arg(long)]
        feature: String,
    },

    /// Register an app directly, bypassing request validation
    CreateApp {
        #[arg(long)]
        org: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        webhook_url: String,

        /// Scope token (repeatable)
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },

    /// Mark an app as published
    PublishApp { uuid: String },
}

fn open_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    open_db(&data_dir.join(DB_FILE))
}

fn open_db(db_path: &Path) -> anyhow::Result<SqliteStore> {
    if !db_path.exists() {
        bail!("Database not found. Run 'sentry-apps admin init' first.");
    }
    let store = SqliteStore::new(db_path)?;
    store.initialize()?;
    Ok(store)
}

fn find_user(store: &SqliteStore, email: &str) -> anyhow::Result<User> {
    store
        .get_user_by_email(email)?
        .with_context(|| format!("User '{email}' not found"))
}

fn find_org(store: &SqliteStore, slug: &str) -> anyhow::Result<Organization> {
    store
        .get_organization_by_slug(slug)?
        .with_context(|| format!("Organization '{slug}' not found"))
}

fn validate_slug(slug: &str) -> anyhow::Result<()> {
    let valid = !slug.is_empty()
        && slug.len() <= 64
        && !slug.starts_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        bail!(
            "Invalid slug '{slug}': use up to 64 lowercase letters, digits, and hyphens, not starting with a hyphen"
        );
    }
    Ok(())
}

fn create_user(store: &SqliteStore, email: &str, is_superuser: bool) -> anyhow::Result<(User, String)> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        is_superuser,
        created_at: Utc::now(),
    };
    store
        .create_user(&user)
        .with_context(|| format!("Failed to create user '{email}'"))?;

    let (token, raw_token) = TokenGenerator::new().issue(&user.id, None)?;
    store.create_token(&token)?;

    Ok((user, raw_token))
}

fn create_org(store: &SqliteStore, slug: &str, name: Option<String>) -> anyhow::Result<Organization> {
    validate_slug(slug)?;
    let org = Organization {
        id: Uuid::new_v4().to_string(),
        slug: slug.to_string(),
        name: name.unwrap_or_else(|| slug.to_string()),
        created_at: Utc::now(),
    };
    store
        .create_organization(&org)
        .with_context(|| format!("Failed to create organization '{slug}'"))?;
    Ok(org)
}

/// Expiry timestamp `secs` seconds from now. Rejects non-positive and
/// out-of-range lifetimes.
fn expiry_after(secs: i64) -> anyhow::Result<DateTime<Utc>> {
    if secs <= 0 {
        bail!("Token lifetime must be a positive number of seconds, got {secs}");
    }
    Duration::try_seconds(secs)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .with_context(|| format!("Token lifetime of {secs} seconds is out of range"))
}

fn print_token(label: &str, raw_token: &str) {
    println!();
    println!("========================================");
    println!("{label} (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
}

fn run_init(data_dir: &Path, email: Option<String>, non_interactive: bool) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let store = SqliteStore::new(data_dir.join(DB_FILE))?;
    store.initialize()?;

    let token_file = data_dir.join(TOKEN_FILE);

    if store.has_superuser()? {
        bail!(
            "Server already initialized. Superuser token exists at: {}",
            token_file.display()
        );
    }

    let email = match email {
        Some(email) => email,
        None if non_interactive => "admin@localhost".to_string(),
        None => inquire::Text::new("Superuser email:")
            .with_default("admin@localhost")
            .prompt()?,
    };

    let (user, raw_token) = create_user(&store, &email, true)?;

    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    print_token("Superuser token", &raw_token);
    println!("Token also written to: {}", token_file.display());

    if !non_interactive {
        create_default_org_prompt(&store, &user)?;
    }

    Ok(())
}

fn create_default_org_prompt(store: &SqliteStore, user: &User) -> anyhow::Result<()> {
    let create = inquire::Confirm::new("Would you like to create an organization for this user?")
        .with_default(false)
        .prompt()?;

    if !create {
        return Ok(());
    }

    let slug = inquire::Text::new("Organization slug:")
        .with_validator(|input: &str| match validate_slug(input) {
            Ok(()) => Ok(inquire::validator::Validation::Valid),
            Err(e) => Ok(inquire::validator::Validation::Invalid(e.to_string().into())),
        })
        .prompt()?;

    let org = create_org(store, &slug, None)?;
    store.add_organization_member(&org.id, &user.id)?;

    println!("Created organization '{}' owned by {}", org.slug, user.email);
    Ok(())
}

fn run_admin(data_dir: &Path, command: AdminCommands) -> anyhow::Result<()> {
    match command {
        AdminCommands::Init {
            email,
            non_interactive,
        } => run_init(data_dir, email, non_interactive)?,
        AdminCommands::CreateUser { email, superuser } => {
            let store = open_store(data_dir)?;
            let (user, raw_token) = create_user(&store, &email, superuser)?;
            println!("Created user {} ({})", user.email, user.id);
            print_token("User token", &raw_token);
        }
        AdminCommands::CreateToken {
            email,
            expires_in_seconds,
        } => {
            let store = open_store(data_dir)?;
            let user = find_user(&store, &email)?;
            let expires_at = expires_in_seconds.map(expiry_after).transpose()?;
            let (token, raw_token) = TokenGenerator::new().issue(&user.id, expires_at)?;
            store.create_token(&token)?;
            print_token("User token", &raw_token);
        }
        AdminCommands::CreateOrg { slug, name, owner } => {
            let store = open_store(data_dir)?;
            let owner = owner.map(|email| find_user(&store, &email)).transpose()?;
            let org = create_org(&store, &slug, name)?;
            if let Some(owner) = owner {
                store.add_organization_member(&org.id, &owner.id)?;
            }
            println!("Created organization '{}' ({})", org.slug, org.id);
        }
        AdminCommands::AddMember { org, email } => {
            let store = open_store(data_dir)?;
            let org = find_org(&store, &org)?;
            let user = find_user(&store, &email)?;
            store.add_organization_member(&org.id, &user.id)?;
            println!("Added {} to '{}'", user.email, org.slug);
        }
        AdminCommands::EnableFeature { org, feature } => {
            let store = open_store(data_dir)?;
            validate_feature_name(&feature).map_err(anyhow::Error::msg)?;
            let org = find_org(&store, &org)?;
            store.enable_organization_feature(&org.id, &feature)?;
            println!("Enabled '{feature}' for '{}'", org.slug);
        }
        AdminCommands::CreateApp {
            org,
            name,
            webhook_url,
            scopes,
        } => {
            let store = open_store(data_dir)?;
            let organization = find_org(&store, &org)?;
            let scopes = Scopes::parse_many(scopes.as_slice())
                .map_err(|token| anyhow::anyhow!("'{token}' is not a valid scope"))?;
            let app = apps::create(
                &store,
                NewSentryApp {
                    name,
                    organization,
                    scopes,
                    webhook_url,
                },
            )?;
            println!("Created app '{}' ({})", app.name, app.uuid);
        }
        AdminCommands::PublishApp { uuid } => {
            let store = open_store(data_dir)?;
            store
                .update_sentry_app_status(&uuid, AppStatus::Published)
                .with_context(|| format!("Failed to publish app '{uuid}'"))?;
            println!("Published app {uuid}");
        }
    }

    Ok(())
}

async fn run_serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    features: Vec<String>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    config.features.extend(features);

    for feature in &config.features {
        validate_feature_name(feature).map_err(anyhow::Error::msg)?;
    }

    let store = open_db(&config.db_path())?;
    if !store.has_superuser()? {
        bail!("Server not initialized. Run 'sentry-apps admin init' first.");
    }

    if !config.features.is_empty() {
        info!("Globally enabled features: {}", config.features.join(", "));
    }

    let state = Arc::new(AppState::new(Arc::new(store), config.features.clone()));

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sentry_apps=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { data_dir, command } => run_admin(&data_dir, command)?,
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            features,
        } => run_serve(config, host, port, data_dir, features).await?,
    }

    Ok(())
}
