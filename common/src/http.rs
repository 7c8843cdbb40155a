//! Small helpers shared by every service's HTTP surface.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::pagination::{PageRequest, Sort, SortError};

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message, "success": false }))).into_response()
}

/// Caller identity, threaded explicitly from the `x-user-id` header the
/// gateway sets after authentication. Nothing below the HTTP surface ever
/// reaches for ambient identity.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing caller identity"))?;

        let id = Uuid::parse_str(raw)
            .map_err(|_| error_response(StatusCode::UNAUTHORIZED, "invalid caller identity"))?;

        Ok(Self(id))
    }
}

/// Query parameters accepted by every paginated endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

impl PageParams {
    pub fn to_request(&self, default_sort: &str, max_size: u32) -> Result<PageRequest, SortError> {
        let sort = Sort::parse(self.sort.as_deref().unwrap_or(default_sort))?;
        Ok(PageRequest::new(
            self.page.unwrap_or(1),
            self.size.unwrap_or(20).clamp(1, max_size),
            sort,
        ))
    }
}
