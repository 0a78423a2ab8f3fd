mod config;
mod model;
mod routes;
mod service;
mod validation;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use config::ServingConfig;
use model::PipelineModel;
use routes::configure_routes;
use service::PredictionService;
use std::env;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServingConfig::load().map_err(|e| {
        log::error!("Failed to load serving config: {}", e);
        std::io::Error::other(format!("Config loading failed: {}", e))
    })?;

    let load_model = |path: &std::path::Path| {
        PipelineModel::load(path).map_err(|e| {
            log::error!("Failed to preload model at startup: {}", e);
            std::io::Error::other(format!("Model loading failed: {}", e))
        })
    };
    let yield_model = load_model(&config.models.yield_model)?;
    let production_model = load_model(&config.models.production)?;

    let policy = config.to_prediction_policy();
    log::info!(
        "Prediction policy: scale factor {}, clamp negative {}, timeout {:?}",
        policy.yield_scale_factor,
        policy.clamp_negative,
        policy.timeout
    );

    let service = web::Data::new(PredictionService::new(
        Arc::new(yield_model),
        Arc::new(production_model),
        policy,
    ));

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(service.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
