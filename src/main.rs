use image_relay::{observability, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Repo-root .env first, then the service's own .env wins.
    dotenvy::dotenv().ok();
    dotenvy::from_filename_override("backend/.env").ok();

    let cfg = AppConfig::from_env()?;
    observability::init_tracing(cfg.server.debug);

    let state = AppState::new(&cfg)?;
    for service in state.registry().descriptors() {
        tracing::info!(id = %service.id, available = service.available, "service registered");
    }

    let app = image_relay::router(state, &cfg.server);

    let addr = cfg.server.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("image relay listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
