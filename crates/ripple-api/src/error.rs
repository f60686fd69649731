use axum::http::StatusCode;
use tracing::error;

use ripple_types::error::CoreError;

/// Translate core error kinds into transport status codes. The core never
/// formats a response body; this mapping is owned by the handler layer.
pub fn error_status(err: CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Upload(_) => StatusCode::BAD_GATEWAY,
        CoreError::Internal(e) => {
            error!("internal error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
