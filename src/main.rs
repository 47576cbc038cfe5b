use std::sync::Arc;

use portalauth::config::{load_config, print_schema};
use portalauth::startup::run;
use portalauth::utils::logger::init_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    if std::env::args().skip(1).any(|arg| arg == "--schema") {
        print_schema();
        return;
    }

    let config = Arc::new(load_config());

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error initialising logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("Server terminated: {}", e);
        std::process::exit(1);
    }
}
