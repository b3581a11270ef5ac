//! Axum server and routes.

use alert_types::{
    AlertersResponse, BaseResponse, ChannelTarget, ChannelsResponse, CreateAlerterRequest,
    IssuedKey, KeyCount, SubscribeRequest, SubscriptionError, SubscriptionService,
    TargetsResponse, UnsubscribeRequest, Unsubscribed,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub service: Arc<dyn SubscriptionService + Send + Sync>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/alerters", post(handle_create_alerter))
        .route("/alerters/:user_id/keys", post(handle_issue_key))
        .route("/alerters/:user_id/keys/count", get(handle_key_count))
        .route("/alerters/:user_id/targets", get(handle_list_targets))
        .route("/alerters/:user_id/channels", get(handle_list_channels))
        .route(
            "/subscriptions",
            post(handle_subscribe).delete(handle_unsubscribe),
        )
        .route("/communities/:guild_id/alerters", get(handle_list_alerters))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Envelope code for a domain error.
pub fn error_code(err: &SubscriptionError) -> i32 {
    match err {
        SubscriptionError::NotFound(_) => 404,
        SubscriptionError::AlreadyExists(_) => 409,
        SubscriptionError::InvalidKey => 403,
        SubscriptionError::ConnectionFailure { .. } => 503,
        SubscriptionError::Timeout { .. } => 504,
        SubscriptionError::MalformedState { .. } | SubscriptionError::Store { .. } => 500,
    }
}

fn respond<T>(op: &'static str, result: Result<T, SubscriptionError>) -> Json<BaseResponse<T>> {
    match result {
        Ok(data) => Json(BaseResponse::ok(data)),
        Err(e) => {
            let code = error_code(&e);
            if code >= 500 {
                tracing::error!(op, error = %e, "request failed");
            } else {
                tracing::info!(op, error = %e, "request rejected");
            }
            Json(BaseResponse::error(code, e.to_string()))
        }
    }
}

async fn handle_create_alerter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAlerterRequest>,
) -> Json<BaseResponse<String>> {
    let result = state.service.create_alerter(&req.user_id).await;
    respond("create_alerter", result.map(|()| req.user_id))
}

async fn handle_issue_key(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<BaseResponse<IssuedKey>> {
    let result = state.service.issue_key(&user_id).await;
    respond("issue_key", result.map(|key| IssuedKey { key }))
}

async fn handle_key_count(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<BaseResponse<KeyCount>> {
    let result = state.service.key_count(&user_id).await;
    respond("key_count", result.map(|count| KeyCount { count }))
}

async fn handle_list_targets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<TargetsResponse> {
    respond(
        "list_targets",
        state.service.list_targets_for_alerter(&user_id).await,
    )
}

async fn handle_list_channels(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<ChannelsResponse> {
    respond(
        "list_channels",
        state.service.list_channels_for_alerter(&user_id).await,
    )
}

async fn handle_subscribe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubscribeRequest>,
) -> Json<BaseResponse<ChannelTarget>> {
    let result = state
        .service
        .subscribe(&req.user_id, &req.guild_id, &req.channel_id, &req.key)
        .await;
    respond(
        "subscribe",
        result.map(|()| ChannelTarget {
            guild_id: req.guild_id,
            channel_id: req.channel_id,
        }),
    )
}

async fn handle_unsubscribe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UnsubscribeRequest>,
) -> Json<BaseResponse<Unsubscribed>> {
    respond(
        "unsubscribe",
        state
            .service
            .unsubscribe(&req.user_id, &req.guild_id, &req.channel_id)
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct AlertersQuery {
    #[serde(default)]
    pub channel_id: Option<String>,
}

async fn handle_list_alerters(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    Query(q): Query<AlertersQuery>,
) -> Json<AlertersResponse> {
    respond(
        "list_alerters",
        state
            .service
            .list_alerters_for_target(&guild_id, q.channel_id.as_deref())
            .await,
    )
}

async fn handle_health() -> &'static str {
    "ok"
}
