use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::http::{CallerId, PageParams};
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::FollowError;
use crate::global::GlobalState;

const DEFAULT_SORT: &str = "createdAt,desc";
const MAX_PAGE_SIZE: u32 = 100;

pub fn routes(global: &Arc<GlobalState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/follows/:user_id", post(follow).delete(unfollow))
        .route("/api/v1/follows/:user_id/status", get(status))
        .route("/api/v1/follows/:user_id/followers", get(followers))
        .route("/api/v1/follows/:user_id/following", get(following))
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

async fn follow(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, FollowError> {
    let follow = global.graph.follow(caller, user_id).await?;
    Ok((StatusCode::CREATED, Json(follow)))
}

async fn unfollow(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, FollowError> {
    global.graph.unfollow(caller, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn status(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, FollowError> {
    let following = global.graph.is_following(caller, user_id).await?;
    Ok(Json(json!({ "following": following })))
}

async fn followers(
    State(global): State<Arc<GlobalState>>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, FollowError> {
    let request = params.to_request(DEFAULT_SORT, MAX_PAGE_SIZE)?;
    Ok(Json(global.graph.followers(user_id, request).await?))
}

async fn following(
    State(global): State<Arc<GlobalState>>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, FollowError> {
    let request = params.to_request(DEFAULT_SORT, MAX_PAGE_SIZE)?;
    Ok(Json(global.graph.following(user_id, request).await?))
}
