use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use ripple_types::api::{Claims, InteractionRequest};

use crate::auth::AppState;
use crate::error::error_status;

/// The hook the application's like/comment/follow handlers call. The
/// notification row is the durable source of truth; the push is a latency
/// optimization for already-connected clients, reported in the outcome tag.
pub async fn create_interaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InteractionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let outcome = state
        .coordinator
        .notify(
            req.recipient_id,
            claims.sub,
            req.kind,
            req.related_post_id,
            req.message,
        )
        .await
        .map_err(error_status)?;

    Ok(Json(outcome))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let notifications = state
        .coordinator
        .list_notifications(claims.sub)
        .await
        .map_err(error_status)?;

    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .coordinator
        .mark_read(notification_id)
        .await
        .map_err(error_status)?;

    Ok(StatusCode::NO_CONTENT)
}
