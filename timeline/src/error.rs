use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::clients::ClientError;
use common::http::error_response;
use common::pagination::SortError;

#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error(transparent)]
    Sort(#[from] SortError),

    #[error(transparent)]
    Upstream(#[from] ClientError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for TimelineError {
    fn into_response(self) -> Response {
        match &self {
            Self::Sort(_) => error_response(StatusCode::BAD_REQUEST, &self.to_string()),
            Self::Upstream(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, &self.to_string()),
            Self::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}
