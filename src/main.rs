use std::time::Duration;

use shaadi_mantrana::{
    app::{build_app, serve},
    config::AppConfig,
    db,
    likes::reconcile::Reconciler,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "shaadi_mantrana=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr = config.bind_addr()?;
    let reconcile_every = config.matching.reconcile_interval_secs;
    let app_state = AppState::init(config).await?;

    db::migrate(&app_state.db).await?;

    if reconcile_every > 0 {
        Reconciler::new(app_state.store.clone())
            .spawn_periodic(Duration::from_secs(reconcile_every));
        tracing::info!(interval_secs = reconcile_every, "reconciliation task started");
    }

    serve(build_app(app_state), addr).await
}
