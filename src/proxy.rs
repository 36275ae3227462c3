use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::error;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::error::Result;

const UPSTREAM_URL: &str = "https://api.gowinston.ai/v2/plagiarism";
/// Upstream checks can take minutes on long texts
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(180);

/// State for the plagiarism proxy: the upstream endpoint plus the secret key
/// that must never reach a browser.
#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    upstream_url: String,
    api_key: Option<String>,
}

impl ProxyState {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api_key = config
            .winston_api_key
            .clone()
            .or_else(|| std::env::var("WINSTON_API_KEY").ok());
        Ok(ProxyState {
            client: reqwest::Client::builder()
                .timeout(UPSTREAM_TIMEOUT)
                .build()?,
            upstream_url: UPSTREAM_URL.to_string(),
            api_key,
        })
    }

    #[doc(hidden)]
    pub fn with_upstream(upstream_url: String, api_key: Option<String>) -> Self {
        ProxyState {
            client: reqwest::Client::new(),
            upstream_url,
            api_key,
        }
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/plagiarism", post(check_plagiarism))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CheckRequest {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "excludedUrls")]
    excluded_urls: Vec<String>,
}

async fn check_plagiarism(
    State(state): State<Arc<ProxyState>>,
    Json(request): Json<CheckRequest>,
) -> (StatusCode, Json<Value>) {
    if request.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Text is required" })),
        );
    }

    let Some(api_key) = state.api_key.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Winston API key is not configured" })),
        );
    };

    let excluded: Vec<&str> = request
        .excluded_urls
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .collect();

    let response = state
        .client
        .post(&state.upstream_url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&json!({ "text": request.text, "excludedUrls": excluded }))
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            error!("Plagiarism check error: {e}");
            return if e.is_connect() {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "message": "Service unavailable" })),
                )
            } else if e.is_timeout() {
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    Json(json!({ "message": "Request timeout" })),
                )
            } else {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": e.to_string() })),
                )
            };
        }
    };

    let status = response.status();
    let body: Value = response.json().await.unwrap_or_default();

    if status.is_success() {
        return (StatusCode::OK, Json(body));
    }

    // Pass the upstream failure through with its own status and message
    error!("Upstream plagiarism failure ({status}): {body}");
    let message = body["message"].as_str().unwrap_or("Internal server error");
    let code = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(json!({ "message": message })))
}
