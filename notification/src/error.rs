use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::clients::ClientError;
use common::http::error_response;
use common::pagination::SortError;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification not found")]
    NotFound,

    #[error("device token not found")]
    TokenNotFound,

    #[error(transparent)]
    Sort(#[from] SortError),

    #[error(transparent)]
    Upstream(#[from] ClientError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound | Self::TokenNotFound => StatusCode::NOT_FOUND,
            Self::Sort(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
            }
        };

        error_response(status, &self.to_string())
    }
}
