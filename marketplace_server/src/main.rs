use log::{error, info};
use marketplace_server::{config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    info!("🚀️ Starting marketplace server on {}:{}", config.host, config.port);
    if let Err(e) = run_server(config).await {
        error!("🚀️ Server terminated abnormally: {e}");
    }
    info!("🚀️ Server shut down");
}
