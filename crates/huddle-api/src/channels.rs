use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_core::Actor;
use huddle_types::api::{ChannelPatch, Claims, CreateChannelRequest};

use crate::AppState;
use crate::error::ApiResult;

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let channels = state.chat.list_channels(&Actor::from(&claims)).await?;
    Ok(Json(channels))
}

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<impl IntoResponse> {
    let channel = state
        .chat
        .create_channel(&Actor::from(&claims), req)
        .await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

pub async fn update_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(patch): Json<ChannelPatch>,
) -> ApiResult<impl IntoResponse> {
    let channel = state
        .chat
        .update_channel(&Actor::from(&claims), channel_id, patch)
        .await?;
    Ok(Json(channel))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .chat
        .delete_channel(&Actor::from(&claims), channel_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
