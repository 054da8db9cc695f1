// API module for the MCP server
//
// This module contains the API endpoints, handlers, and middleware
// for the MCP server.

mod routes;
pub mod handlers;

pub use routes::configure as configure_routes;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;

use crate::McpServer;

/// Initialize the API server with the appropriate routes and middleware
pub async fn init_server(server: Arc<McpServer>) -> std::io::Result<()> {
    let settings = server.settings.clone();
    let bind_address = (settings.server.host.clone(), settings.server.port);
    let workers = settings.server.workers.max(1);

    log::info!(
        "Starting HTTP server on {}:{} with {} workers",
        bind_address.0,
        bind_address.1,
        workers
    );
    if server.auth.is_enabled() {
        log::info!("API key authentication enabled");
    } else {
        log::warn!("API key authentication disabled");
    }

    HttpServer::new(move || {
        let server_settings = &server.settings.server;
        let cors = if server_settings.cors_enabled {
            server_settings
                .cors_origins
                .iter()
                .fold(Cors::default(), |cors, origin| {
                    if origin == "*" {
                        cors.allow_any_origin()
                    } else {
                        cors.allowed_origin(origin)
                    }
                })
                .allowed_methods(vec!["GET", "POST"])
                .allow_any_header()
                .max_age(3600)
        } else {
            Cors::default()
        };

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(server.clone()))
            .configure(configure_routes)
    })
    .workers(workers)
    .client_request_timeout(Duration::from_secs(settings.server.request_timeout))
    .bind(bind_address)?
    .run()
    .await
}

/// Health check handler
pub async fn health_check() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": crate::MCP_VERSION,
    }))
}
