use extentrack_server::config::Config;
use extentrack_server::coordinators::bootstrap_admin;
use extentrack_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::load()?;
    let addr = config.addr;
    let state = AppState::connect(config).await?;
    if let Some(admin) = state.config.admin.clone() {
        bootstrap_admin(&state, &admin).await?;
    }

    let app = extentrack_server::app(state);
    log::info!("Starting ExtenTrack HTTP Server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    log::info!("Received Ctrl+C, shutting down");
}
