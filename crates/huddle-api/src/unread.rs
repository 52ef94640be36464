use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_core::Actor;
use huddle_types::api::{Claims, MarkReadResponse, UnreadCountResponse};

use crate::AppState;
use crate::error::ApiResult;

/// Acknowledge a whole channel. Clients call this when the channel view is
/// focused; repeat calls are free.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let marked = state
        .chat
        .mark_read(&Actor::from(&claims), channel_id)
        .await?;
    Ok(Json(MarkReadResponse { marked }))
}

/// Cross-device resync point: the count is recomputed from durable state on
/// every call, so a client that missed live events lands back on the truth.
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let unread = state.chat.unread_count(&Actor::from(&claims)).await?;
    Ok(Json(UnreadCountResponse { unread }))
}
