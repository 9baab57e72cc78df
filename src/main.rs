use clap::Parser;
use migration::MigratorTrait;
use miette::{IntoDiagnostic, Result};
use quizgate::authz::seed::ensure_default_policies;
use quizgate::authz::Enforcer;
use quizgate::settings::Settings;
use quizgate::storage::{self, SqlPolicyStore};
use quizgate::web;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "quizgate", version, about = "Access control service for the quiz platform")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database)
    let db = storage::init(&settings.database).await?;
    migration::Migrator::up(&db, None).await.into_diagnostic()?;

    let store = Arc::new(SqlPolicyStore::new(db));
    let enforcer = Arc::new(Enforcer::new(store, settings.authz.enforcer_options()));
    tracing::info!(
        role_resolution = ?settings.authz.role_resolution,
        max_role_depth = settings.authz.max_role_depth,
        "Enforcer ready"
    );

    if settings.authz.seed_defaults {
        ensure_default_policies(&enforcer, settings.authz.super_admin.as_deref()).await?;
    }

    // start web server
    web::serve(settings, enforcer).await?;
    Ok(())
}
