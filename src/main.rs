use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum_storefront_api::{
    app::build_app,
    cache::MemoryCache,
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    notifications::{TracingNotifier, spawn_dispatcher},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,axum_storefront_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let (notifier, dispatcher) = spawn_dispatcher(TracingNotifier);
    let state = AppState::new(orm, config, Arc::new(MemoryCache::new()), notifier);
    let app = build_app(state);

    tracing::info!(%addr, "storefront api listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    dispatcher.abort();
    Ok(())
}
