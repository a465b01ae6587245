// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use herald_core::{Headline, HeraldError, ServiceStatus};
use herald_plugin::PluginSummary;
use herald_storage::HeadlineFilter;
use herald_storage::queries::headlines;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::feed::render_feed;
use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`HeraldError`] mapped to an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<HeraldError> for ApiError {
    fn from(error: HeraldError) -> Self {
        let status = match &error {
            HeraldError::PluginNotFound { .. } => StatusCode::NOT_FOUND,
            HeraldError::PluginNotEnabled { .. } | HeraldError::FetchInProgress { .. } => {
                StatusCode::CONFLICT
            }
            HeraldError::PluginExecution { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %error, "request failed");
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /api/status
pub async fn get_status(State(state): State<GatewayState>) -> Json<ServiceStatus> {
    Json((state.status)())
}

#[derive(Debug, Serialize)]
pub struct PluginListResponse {
    pub plugins: Vec<PluginSummary>,
}

/// GET /api/plugins
pub async fn get_plugins(
    State(state): State<GatewayState>,
) -> Result<Json<PluginListResponse>, ApiError> {
    let plugins = state.runtime.summaries().await?;
    Ok(Json(PluginListResponse { plugins }))
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub plugin_id: String,
    pub status: String,
}

/// POST /api/plugins/{id}/reload
pub async fn post_reload_plugin(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ReloadResponse>, ApiError> {
    state.runtime.reload_plugin(&id).await?;
    Ok(Json(ReloadResponse {
        plugin_id: id,
        status: "reloaded".to_string(),
    }))
}

/// Query string of GET /api/headlines.
#[derive(Debug, Default, Deserialize)]
pub struct HeadlineQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Only headlines at or above the importance threshold.
    #[serde(default)]
    pub important: bool,
    pub plugin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HeadlineListResponse {
    pub headlines: Vec<Headline>,
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

/// GET /api/headlines?limit&offset&important&plugin
///
/// Most recent first, archived headlines excluded. `limit` is capped at
/// `feed.max_page_size`.
pub async fn get_headlines(
    State(state): State<GatewayState>,
    Query(query): Query<HeadlineQuery>,
) -> Result<Json<HeadlineListResponse>, ApiError> {
    let config = state.runtime.config();
    let limit = query
        .limit
        .unwrap_or(config.feed.default_page_size)
        .clamp(1, config.feed.max_page_size.max(1));
    let offset = query.offset.unwrap_or(0);

    let min_importance = query.important.then(|| match &query.plugin {
        Some(plugin_id) => config.importance_for(plugin_id).threshold,
        None => config.importance.threshold,
    });
    let filter = HeadlineFilter {
        plugin_id: query.plugin.clone(),
        min_importance,
        include_archived: false,
        limit,
        offset,
    };

    let db = state.runtime.database();
    let items = headlines::list_headlines(db, &filter).await?;
    let total = headlines::count_headlines(db, query.plugin.as_deref()).await?;
    Ok(Json(HeadlineListResponse {
        headlines: items,
        limit,
        offset,
        total,
    }))
}

/// GET /feed.xml
pub async fn get_feed(State(state): State<GatewayState>) -> Result<Response, ApiError> {
    let config = state.runtime.config();
    let filter = HeadlineFilter {
        plugin_id: None,
        min_importance: config
            .feed
            .important_only
            .then_some(config.importance.threshold),
        include_archived: false,
        limit: config.feed.max_items,
        offset: 0,
    };
    let items = headlines::list_headlines(state.runtime.database(), &filter).await?;
    let body = render_feed(&config.feed, &items, Utc::now())?;
    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        body,
    )
        .into_response())
}
