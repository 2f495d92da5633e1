use clap::Parser;
use tracing_subscriber::EnvFilter;

use microblog::config::{Cli, Config};
use microblog::db;
use microblog::identity::ProofKey;
use microblog::posts::SqliteContentStore;
use microblog::routes;
use microblog::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = cli.resolve_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli, &data_dir)?;

    // Initialize database
    let pool = db::create_pool(&config.database.path)?;
    db::run_migrations(&pool)?;

    let proofs = match &config.auth.proof_secret {
        Some(secret) => ProofKey::new(hex::decode(secret.trim())?),
        None => ProofKey::load_or_create(&data_dir)?,
    };

    let state = AppState::new(pool, config.clone(), proofs);

    if cli.seed {
        let posts = SqliteContentStore::new(state.db.clone());
        db::seed::seed_sample_data(state.users.as_ref(), &posts).await?;
    }

    let purged = state.sessions.purge_expired().await?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    let app = routes::app(state);

    // Start server
    let addr = config.bind_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
