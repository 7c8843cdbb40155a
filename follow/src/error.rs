use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::clients::ClientError;
use common::http::error_response;
use common::pagination::SortError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("users cannot follow themselves")]
    SelfFollow,

    #[error("already following this user")]
    AlreadyFollowing,

    #[error("not following this user")]
    NotFollowing,

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Sort(#[from] SortError),

    #[error(transparent)]
    Upstream(#[from] ClientError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for FollowError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::SelfFollow | Self::Sort(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyFollowing => StatusCode::CONFLICT,
            Self::NotFollowing | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
            }
        };

        error_response(status, &self.to_string())
    }
}
