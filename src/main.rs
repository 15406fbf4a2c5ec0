use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kindred::auth::TokenVerifier;
use kindred::clock::{Clock, SystemClock};
use kindred::config::{LoggingSettings, Settings, StoreBackend};
use kindred::realtime::PresenceBoard;
use kindred::routes::{self, AppState};
use kindred::services::{
    AppwriteClient, CachedPhotoSource, MemoryStore, NoPhotos, PhotoSource, PostgresStore, Store,
    StoreError, TimeoutStore,
};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    pub retry: String,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap_or_default())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
        retry: "fix_input".to_string(),
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
        retry: "fix_input".to_string(),
    }
    .into()
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn Store>, StoreError> {
    let inner: Arc<dyn Store> = match settings.database.backend {
        StoreBackend::Postgres => {
            let db = &settings.database;
            Arc::new(
                PostgresStore::from_settings(
                    &db.url,
                    db.max_connections,
                    db.min_connections,
                    db.acquire_timeout_secs,
                    db.idle_timeout_secs,
                )
                .await?,
            )
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; all data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let timeout = Duration::from_millis(settings.store.timeout_ms);
    info!("Store calls bounded to {}ms", settings.store.timeout_ms);
    Ok(Arc::new(TimeoutStore::new(inner, timeout)))
}

fn build_photo_source(settings: &Settings) -> Arc<dyn PhotoSource> {
    let Some(appwrite) = &settings.appwrite else {
        info!("No Appwrite configuration, candidates are served without photos");
        return Arc::new(NoPhotos);
    };

    let client = AppwriteClient::new(
        appwrite.endpoint.clone(),
        appwrite.api_key.clone(),
        appwrite.project_id.clone(),
        appwrite.database_id.clone(),
        appwrite.photos_collection.clone(),
        Duration::from_millis(appwrite.timeout_ms),
    );

    match client {
        Ok(client) => {
            let ttl = settings.cache.ttl_secs.unwrap_or(300);
            let max_entries = settings.cache.max_entries.unwrap_or(1000);
            info!("Photo cache initialized ({} entries, TTL: {}s)", max_entries, ttl);
            Arc::new(CachedPhotoSource::new(client, max_entries, Duration::from_secs(ttl)))
        }
        Err(e) => {
            error!("Failed to build Appwrite client ({}), running without photos", e);
            Arc::new(NoPhotos)
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_tracing(&settings.logging);
    info!("Starting Kindred service...");

    let store = build_store(&settings).await.map_err(|e| {
        error!("Failed to initialize store: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let photos = build_photo_source(&settings);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Presence lives for the lifetime of the server; its sweeper stops on shutdown
    let presence = Arc::new(PresenceBoard::new(
        clock.clone(),
        Duration::from_secs(settings.presence.typing_ttl_secs),
    ));
    let shutdown = CancellationToken::new();
    let sweeper = presence
        .clone()
        .spawn_sweeper(Duration::from_secs(settings.presence.sweep_secs), shutdown.clone());

    let ranker_settings = settings.discovery.ranker_settings();
    info!(
        "Discovery: completion threshold {}%, window {}",
        ranker_settings.completion_threshold, ranker_settings.window_size
    );

    let app_state = AppState::new(
        store,
        photos,
        clock,
        presence,
        ranker_settings,
        settings.realtime.intervals(),
    );
    let verifier = web::Data::new(TokenVerifier::new(&settings.auth.secret));

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(verifier.clone())
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Presence sweeper ended abnormally: {}", e);
    }
    info!("Kindred service stopped");

    result
}
