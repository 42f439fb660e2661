use std::sync::Arc;

use mirror::MemoryStore;
use rsvp_core::RsvpSync;
use rsvp_server::{AppState, Config, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr;

    let store = Arc::new(MemoryStore::new(config.asset_base_url.clone()));
    let sync = Arc::new(RsvpSync::activate(store));
    let app = router(AppState::new(sync.clone(), config));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    log::info!("rsvp-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for ctrl-c: {e}");
            }
            log::info!("Shutting down");
        })
        .await?;

    sync.deactivate();
    Ok(())
}
