use actix_web::{web, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::auth::Viewer;
use crate::error::AppError;
use crate::models::{BlockRequest, SignalRequest};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/signals/like", web::post().to(like))
        .route("/signals/pass", web::post().to(pass))
        .route("/blocks", web::post().to(block));
}

/// Like endpoint
///
/// POST /api/v1/signals/like
///
/// Request body:
/// ```json
/// { "toUser": "string" }
/// ```
async fn like(
    state: web::Data<AppState>,
    viewer: Viewer,
    req: web::Json<SignalRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let outcome = state.ledger.record_like(&viewer.user_id, &req.to_user).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Pass endpoint
///
/// POST /api/v1/signals/pass
async fn pass(
    state: web::Data<AppState>,
    viewer: Viewer,
    req: web::Json<SignalRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let outcome = state.ledger.record_pass(&viewer.user_id, &req.to_user).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Block endpoint
///
/// POST /api/v1/blocks
///
/// Request body:
/// ```json
/// { "userId": "string" }
/// ```
async fn block(
    state: web::Data<AppState>,
    viewer: Viewer,
    req: web::Json<BlockRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    state.ledger.block(&viewer.user_id, &req.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "blocked": true })))
}
