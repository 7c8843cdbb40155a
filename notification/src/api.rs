use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use common::http::{CallerId, PageParams};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::database::DeleteFilter;
use crate::error::NotificationError;
use crate::global::GlobalState;

const DEFAULT_SORT: &str = "createdAt,desc";
const MAX_PAGE_SIZE: u32 = 100;

pub fn routes(global: &Arc<GlobalState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/notifications", get(list).delete(delete_many))
        .route("/api/v1/notifications/unread-count", get(unread_count))
        .route("/api/v1/notifications/read-all", put(mark_all_read))
        .route("/api/v1/notifications/:id/read", put(mark_read))
        .route("/api/v1/notifications/:id", delete(delete_one))
        .route(
            "/api/v1/notifications/devices",
            post(register_device).delete(unregister_device),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(global.clone())
}

pub async fn run(global: Arc<GlobalState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&global.config.bind_address).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    let ctx = global.ctx.clone();
    axum::serve(listener, routes(&global))
        .with_graceful_shutdown(async move { ctx.done().await })
        .await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, NotificationError> {
    let request = params.to_request(DEFAULT_SORT, MAX_PAGE_SIZE)?;
    Ok(Json(global.notifications.list(caller, request).await?))
}

async fn unread_count(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, NotificationError> {
    let count = global.notifications.unread_count(caller).await?;
    Ok(Json(json!({ "count": count })))
}

async fn mark_read(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, NotificationError> {
    global.notifications.mark_read(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, NotificationError> {
    let updated = global.notifications.mark_all_read(caller).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_one(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, NotificationError> {
    global.notifications.delete(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    read: Option<bool>,
}

async fn delete_many(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, NotificationError> {
    let filter = match params.read {
        None => DeleteFilter::All,
        Some(true) => DeleteFilter::Read,
        Some(false) => DeleteFilter::Unread,
    };

    let deleted = global.notifications.delete_many(caller, filter).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
struct DeviceBody {
    token: String,
}

async fn register_device(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Json(body): Json<DeviceBody>,
) -> Result<impl IntoResponse, NotificationError> {
    global.notifications.register_device(caller, &body.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unregister_device(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Json(body): Json<DeviceBody>,
) -> Result<impl IntoResponse, NotificationError> {
    global
        .notifications
        .unregister_device(caller, &body.token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
