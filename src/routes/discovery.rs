use actix_web::{web, HttpResponse};

use crate::auth::Viewer;
use crate::core::Discovery;
use crate::error::AppError;
use crate::models::DiscoveryResponse;
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/discovery/next", web::get().to(next_candidate));
}

/// Next candidate endpoint
///
/// GET /api/v1/discovery/next
///
/// Response:
/// ```json
/// { "status": "candidate", "candidate": { "userId": "...", "score": { ... }, ... } }
/// ```
/// or `{ "status": "no_profiles" }` once the pool is exhausted.
async fn next_candidate(state: web::Data<AppState>, viewer: Viewer) -> Result<HttpResponse, AppError> {
    let start = std::time::Instant::now();

    let response = match state.ranker.next_candidate(&viewer.user_id).await? {
        Discovery::Candidate(candidate) => {
            tracing::info!(
                "Discovery for {}: candidate {} (score {}) in {}ms",
                viewer.user_id,
                candidate.user_id,
                candidate.score.total,
                start.elapsed().as_millis()
            );
            DiscoveryResponse::Candidate { candidate }
        }
        Discovery::NoProfiles => DiscoveryResponse::NoProfiles,
    };

    Ok(HttpResponse::Ok().json(response))
}
