// Route exports
pub mod channels;
pub mod discovery;
pub mod presence;
pub mod signals;

use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::clock::Clock;
use crate::core::{CandidateRanker, MessageStore, RankerSettings, SwipeLedger};
use crate::models::HealthResponse;
use crate::realtime::{PresenceBoard, RealtimeSettings};
use crate::services::{PhotoSource, Store};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub ranker: CandidateRanker,
    pub ledger: SwipeLedger,
    pub messages: MessageStore,
    pub presence: Arc<PresenceBoard>,
    pub realtime: RealtimeSettings,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        photos: Arc<dyn PhotoSource>,
        clock: Arc<dyn Clock>,
        presence: Arc<PresenceBoard>,
        ranker_settings: RankerSettings,
        realtime: RealtimeSettings,
    ) -> Self {
        Self {
            ranker: CandidateRanker::new(store.clone(), photos, ranker_settings),
            ledger: SwipeLedger::new(store.clone(), clock.clone()),
            messages: MessageStore::new(store.clone(), clock.clone()),
            store,
            clock,
            presence,
            realtime,
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .configure(discovery::configure)
            .configure(signals::configure)
            .configure(channels::configure)
            .configure(presence::configure),
    );
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.store.health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}
