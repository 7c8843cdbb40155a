use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::http::{CallerId, PageParams};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::comment::CreateComment;
use crate::error::CommentError;
use crate::global::GlobalState;

// Comment listings read oldest first by default.
const DEFAULT_SORT: &str = "createdAt,asc";
const MAX_PAGE_SIZE: u32 = 100;

pub fn routes(global: &Arc<GlobalState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/comments", post(create))
        .route(
            "/api/v1/comments/:id",
            get(get_one).put(update).delete(delete_one),
        )
        .route("/api/v1/comments/:id/replies", get(replies))
        .route("/api/v1/comments/tweet/:tweet_id", get(top_level))
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

async fn create(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Json(body): Json<CreateComment>,
) -> Result<impl IntoResponse, CommentError> {
    let comment = global.comments.create(caller, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn get_one(
    State(global): State<Arc<GlobalState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CommentError> {
    Ok(Json(global.comments.get(id).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    content: String,
}

async fn update(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, CommentError> {
    Ok(Json(global.comments.update(caller, id, &body.content).await?))
}

async fn delete_one(
    State(global): State<Arc<GlobalState>>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CommentError> {
    global.comments.delete(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn top_level(
    State(global): State<Arc<GlobalState>>,
    Path(tweet_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, CommentError> {
    let request = params.to_request(DEFAULT_SORT, MAX_PAGE_SIZE)?;
    Ok(Json(global.comments.top_level(tweet_id, request).await?))
}

async fn replies(
    State(global): State<Arc<GlobalState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, CommentError> {
    let request = params.to_request(DEFAULT_SORT, MAX_PAGE_SIZE)?;
    Ok(Json(global.comments.replies(id, request).await?))
}
