mod agents;
mod config;
mod context;
mod error;
mod file_system;
mod gemini;
mod handlers;
mod models;
mod report;
mod session;
mod source;
mod tree;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpServer};
use agents::AgentStore;
use config::Config;
use gemini::{ContentGenerator, GeminiClient};
use log::{error, info, warn};
use rustls::ServerConfig;
use rustls_pemfile::{certs, pkcs8_private_keys};
use session::AppState;
use std::env;
use std::fs::File as FsFile;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

fn load_tls_config(cert_path: &str, key_path: &str) -> std::io::Result<ServerConfig> {
    let cert_file = &mut BufReader::new(FsFile::open(cert_path)?);
    let key_file = &mut BufReader::new(FsFile::open(key_path)?);
    let cert_chain = certs(cert_file).collect::<Result<Vec<_>, _>>()?;
    let mut keys = pkcs8_private_keys(key_file).collect::<Result<Vec<_>, _>>()?;

    if keys.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "No private keys found in key file",
        ));
    }

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, keys.remove(0).into())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    // Override the log level with RUST_LOG, e.g. `RUST_LOG=debug`.
    env::set_var("RUST_LOG", env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    env_logger::init();

    let config = Config::from_env();
    let generator: Option<Arc<dyn ContentGenerator>> = match &config.api_key {
        Some(key) => {
            info!("Using Gemini model '{}'.", config.model);
            Some(Arc::new(GeminiClient::new(
                key.clone(),
                config.model.clone(),
                config.base_url.clone(),
            )))
        }
        None => {
            error!("API_KEY environment variable not set. Analysis is disabled.");
            None
        }
    };
    let state = web::Data::new(AppState::new(generator, AgentStore::with_defaults()));

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Server running at http://{}", addr);

    let max_upload_bytes = config.max_upload_bytes;
    let mut http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(max_upload_bytes))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    });

    match (&config.cert_path, &config.key_path) {
        (Some(cert_path), Some(key_path)) => {
            if !Path::new(cert_path).exists() || !Path::new(key_path).exists() {
                warn!("CERT_PATH or KEY_PATH points to a non-existent file. Starting without HTTPS.");
                http_server = http_server.bind(addr)?;
            } else {
                info!("Attempting to start HTTPS server...");
                let tls_config = load_tls_config(cert_path, key_path)?;
                info!("Successfully configured TLS. Binding to https://{}", addr);
                http_server = http_server.bind_rustls_0_23(addr, tls_config)?;
            }
        }
        _ => {
            info!("No CERT_PATH or KEY_PATH found in env. Starting plain HTTP server.");
            http_server = http_server.bind(addr)?;
        }
    }

    http_server.run().await
}
