use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use uuid::Uuid;

use ripple_gateway::coordinator::MediaUpload;
use ripple_types::api::{Claims, SendMessageRequest};

use crate::auth::AppState;
use crate::error::error_status;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let media = match req.media {
        Some(payload) => {
            let bytes = B64
                .decode(&payload.data)
                .map_err(|_| StatusCode::BAD_REQUEST)?;
            Some(MediaUpload {
                bytes,
                kind: payload.kind,
            })
        }
        None => None,
    };

    let message = state
        .coordinator
        .send_message(claims.sub, req.recipient_id, req.text, media)
        .await
        .map_err(error_status)?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let conversations = state
        .coordinator
        .list_conversations(claims.sub)
        .await
        .map_err(error_status)?;

    Ok(Json(conversations))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messages = state
        .coordinator
        .list_messages(conversation_id)
        .await
        .map_err(error_status)?;

    Ok(Json(messages))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .coordinator
        .mark_seen(conversation_id, claims.sub)
        .await
        .map_err(error_status)?;

    Ok(StatusCode::NO_CONTENT)
}
