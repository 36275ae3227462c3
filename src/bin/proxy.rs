use log::info;

use chefscript::proxy::{router, ProxyState};
use chefscript::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AppConfig::load()?;
    let state = ProxyState::new(&config)?;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3001);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on port {port}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
