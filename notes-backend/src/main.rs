use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use std::sync::Arc;

mod config;
mod controllers;
mod identity;
mod notes;
mod telemetry;

use config::Config;
use identity::{IdentityClient, IdentityProvider};
use notes::NoteBoard;
use notes::attachments::HttpObjectStore;
use notes::repository::GraphqlNotesClient;
use telemetry::{LogSink, OpsSink};

pub struct AppState {
    pub board: Arc<NoteBoard>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Config,
    pub started_at: std::time::Instant,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("notes-backend v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Notes API: {}", config.notes_api_url);
    log::info!("Object storage: {}", config.storage_url);
    log::info!("Identity provider: {}", config.identity_url);

    let ops: Arc<dyn OpsSink> = Arc::new(LogSink);
    let repo = Arc::new(GraphqlNotesClient::new(
        &config.notes_api_url,
        config.notes_api_key.clone(),
        Arc::clone(&ops),
    ));
    let store = Arc::new(HttpObjectStore::new(&config.storage_url, Arc::clone(&ops)));
    let board = Arc::new(NoteBoard::new(repo, store, ops));

    // Warm the note list; a failure here just means the first page load
    // carries the error banner instead.
    if let Err(e) = board.refresh().await {
        log::warn!("Initial note fetch failed: {}", e);
    }

    let identity: Arc<dyn IdentityProvider> = Arc::new(IdentityClient::new(&config.identity_url));

    let state = web::Data::new(AppState {
        board,
        identity,
        config,
        started_at: std::time::Instant::now(),
    });

    log::info!("Listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(controllers::health::config_routes)
            .configure(controllers::pages::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
