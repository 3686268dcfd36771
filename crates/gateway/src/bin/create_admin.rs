//! Provision an admin account for the upload endpoint
//!
//! ```text
//! create-admin --username registrar --password '...'
//! PAPERVAULT_ADMIN_PASSWORD='...' create-admin --username registrar
//! ```

use anyhow::Context;
use clap::Parser;
use papervault_common::{
    auth::hash_password, config::AppConfig, db::DbPool, errors::AppError, Repository,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "create-admin", version, about = "Create a PaperVault admin account")]
struct Args {
    /// Login name for the new admin
    #[arg(long)]
    username: String,

    /// Password for the new admin
    #[arg(long, env = "PAPERVAULT_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    /// Read configuration from this file instead of the layered defaults
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level)),
        )
        .init();

    let username = args.username.trim();
    if username.is_empty() || args.password.is_empty() {
        anyhow::bail!("username and password must not be empty");
    }

    let db = DbPool::new(&config.database).await?;
    db.ensure_schema().await?;
    let repo = Repository::new(db);

    let hash = hash_password(&args.password)?;
    match repo.create_user(username, hash).await {
        Ok(user) => {
            tracing::info!(id = user.id, username = %user.username, "Admin user created");
            Ok(())
        }
        Err(AppError::Duplicate { .. }) => {
            anyhow::bail!("admin user '{}' already exists; nothing changed", username)
        }
        Err(e) => Err(e).context("failed to create admin user"),
    }
}
