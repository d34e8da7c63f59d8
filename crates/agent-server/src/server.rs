use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;

/// Chat histories grow with every turn; allow more than the 256 KiB default.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Routes, shared by the binary and the integration tests.
pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES)).service(
        web::scope("/api")
            .route("/chat", web::post().to(handlers::chat::handler))
            .route("/health", web::get().to(handlers::health::handler)),
    );
}

pub async fn run_server(config: ServerConfig) -> io::Result<()> {
    let state = AppState::from_config(&config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let state = web::Data::new(state);

    tracing::info!("Chat bridge listening on 0.0.0.0:{}", config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind(format!("0.0.0.0:{}", config.port))?
    .run()
    .await
}
