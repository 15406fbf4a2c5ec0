use actix_web::{web, HttpResponse};

use crate::auth::Viewer;
use crate::error::AppError;
use crate::models::{TypingQuery, TypingRequest, TypingResponse};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/presence/typing", web::post().to(set_typing))
        .route("/presence/typing", web::get().to(who_is_typing));
}

/// POST /api/v1/presence/typing
///
/// Request body:
/// ```json
/// { "channelId": "uuid", "typing": true }
/// ```
async fn set_typing(
    state: web::Data<AppState>,
    viewer: Viewer,
    req: web::Json<TypingRequest>,
) -> Result<HttpResponse, AppError> {
    let channel = state
        .messages
        .require_member(req.channel_id, &viewer.user_id)
        .await?;

    if req.typing {
        state.presence.set_typing(channel.id, &viewer.user_id);
    } else {
        state.presence.clear_typing(channel.id, &viewer.user_id);
    }

    Ok(HttpResponse::Ok().json(TypingResponse {
        channel_id: channel.id,
        typing: state.presence.who_is_typing(channel.id, &viewer.user_id),
    }))
}

/// GET /api/v1/presence/typing?channelId=
async fn who_is_typing(
    state: web::Data<AppState>,
    viewer: Viewer,
    query: web::Query<TypingQuery>,
) -> Result<HttpResponse, AppError> {
    let channel = state
        .messages
        .require_member(query.channel_id, &viewer.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(TypingResponse {
        channel_id: channel.id,
        typing: state.presence.who_is_typing(channel.id, &viewer.user_id),
    }))
}
