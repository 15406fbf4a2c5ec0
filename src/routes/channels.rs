use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Viewer;
use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{ChannelListResponse, MessageListResponse, PostMessageRequest};
use crate::realtime::{sse_response, ConversationWatcher, MatchListWatcher};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/channels", web::get().to(list_channels))
        .route("/channels/stream", web::get().to(stream_channels))
        .route("/channels/{id}/messages", web::get().to(list_messages))
        .route("/channels/{id}/messages", web::post().to(post_message))
        .route("/channels/{id}/messages/stream", web::get().to(stream_messages));
}

/// GET /api/v1/channels
async fn list_channels(state: web::Data<AppState>, viewer: Viewer) -> Result<HttpResponse, AppError> {
    let channels = state.messages.list_channels(&viewer.user_id).await?;
    Ok(HttpResponse::Ok().json(ChannelListResponse {
        total: channels.len(),
        channels,
    }))
}

/// GET /api/v1/channels/{id}/messages
///
/// Marks the other member's unread messages as read.
async fn list_messages(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let channel_id = path.into_inner();
    let messages = state.messages.list_messages(channel_id, &viewer.user_id).await?;
    Ok(HttpResponse::Ok().json(MessageListResponse { channel_id, messages }))
}

/// POST /api/v1/channels/{id}/messages
///
/// Request body:
/// ```json
/// { "text": "string" }
/// ```
async fn post_message(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
    req: web::Json<PostMessageRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let message = state
        .messages
        .post_message(path.into_inner(), &viewer.user_id, &req.text)
        .await?;

    // A new message ends the sender's typing state
    state.presence.clear_typing(message.channel_id, &viewer.user_id);

    Ok(HttpResponse::Created().json(message))
}

/// GET /api/v1/channels/stream
///
/// Server-sent `refresh` events when the viewer's match list changes.
async fn stream_channels(state: web::Data<AppState>, viewer: Viewer) -> Result<HttpResponse, AppError> {
    tracing::info!("Opening match list stream for {}", viewer.user_id);

    let watcher = MatchListWatcher::new(state.store.clone(), state.clock.clone(), viewer.user_id)
        .with_late_commit_window(state.realtime.late_commit_window);
    Ok(sse_response(
        Box::new(watcher),
        state.clock.clone(),
        state.realtime.match_list_timers(),
        state.realtime.fallback_interval,
    ))
}

/// GET /api/v1/channels/{id}/messages/stream
///
/// Server-sent `messages` events for new messages in one channel.
async fn stream_messages(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let channel = state
        .messages
        .require_member(path.into_inner(), &viewer.user_id)
        .await?;

    tracing::info!("Opening message stream for {} on channel {}", viewer.user_id, channel.id);

    let watcher = ConversationWatcher::new(state.store.clone(), channel.id, state.clock.now())
        .with_late_commit_window(state.realtime.late_commit_window);
    Ok(sse_response(
        Box::new(watcher),
        state.clock.clone(),
        state.realtime.conversation_timers(),
        state.realtime.fallback_interval,
    ))
}
