use sea_orm::Database;
use std::sync::Arc;
use surfer::AppState;
use surfer::api::{cancel_on_signal, start_webserver};
use surfer::clock::system_clock;
use surfer::config::load_config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "surfer=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    initialize_tracing();

    let config = load_config()?;

    let db = Arc::new(Database::connect(&config.database_url).await?);
    tracing::info!("connected to database");

    let shutdown = CancellationToken::new();
    let reap_interval = config.session.reaper_interval();
    let state = AppState::new(config, db, system_clock(), shutdown.clone())?;

    let reaper = state.states.spawn_reaper(reap_interval, shutdown.clone());

    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    start_webserver(state, shutdown.clone()).await?;

    shutdown.cancel();
    reaper.await?;
    Ok(())
}
