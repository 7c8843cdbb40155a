use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use common::http::{CallerId, PageParams};
use tower_http::trace::TraceLayer;

use crate::error::TimelineError;
use crate::global::GlobalState;

const DEFAULT_SORT: &str = "createdAt,desc";
const MAX_PAGE_SIZE: u32 = 100;

pub fn routes(global: &Arc<GlobalState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/timeline", get(timeline))
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
    Json(serde_json::json!({ "status": "ok" }))
}

async fn timeline(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, TimelineError> {
    let request = params.to_request(DEFAULT_SORT, MAX_PAGE_SIZE)?;
    Ok(Json(global.timeline.get_timeline(caller, request).await?))
}
