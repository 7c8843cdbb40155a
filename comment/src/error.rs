use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::clients::ClientError;
use common::http::error_response;
use common::pagination::SortError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("a comment targets either a tweet or a parent comment, not both")]
    AmbiguousTarget,

    #[error("comment content must not be empty")]
    EmptyContent,

    #[error("comment not found")]
    NotFound,

    #[error("parent comment not found: {0}")]
    ParentNotFound(Uuid),

    #[error("tweet not found: {0}")]
    TweetNotFound(Uuid),

    #[error("not allowed to modify this comment")]
    Forbidden,

    #[error(transparent)]
    Sort(#[from] SortError),

    #[error(transparent)]
    Upstream(#[from] ClientError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for CommentError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::AmbiguousTarget | Self::EmptyContent | Self::Sort(_) => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::ParentNotFound(_) | Self::TweetNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
            }
        };

        error_response(status, &self.to_string())
    }
}
