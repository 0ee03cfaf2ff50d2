use std::sync::Arc;

use gfw_truth::api::server::{run_server, AppState};
use gfw_truth::collectors::cartodb::SqlGateway;
use gfw_truth::utils::{config::AppConfig, logging};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return;
        }
    };
    logging::init(&config.log_level);
    info!(cartodb = %config.cartodb_endpoint, ee = %config.earth_engine.url, "gfw-truth initialized");

    if config.earth_engine.access_token.is_none() {
        warn!("EE_ACCESS_TOKEN not set, truth lookups will be refused");
    }

    let cartodb = match SqlGateway::new(config.cartodb_endpoint.clone()) {
        Ok(gw) => gw,
        Err(e) => {
            error!(error = %e, "Failed to build CartoDB client");
            return;
        }
    };

    let addr = config.bind_addr;
    let state = AppState { config: Arc::new(config), cartodb };
    if let Err(e) = run_server(state, addr).await {
        error!(error = %e, "API server stopped");
    }
}
