use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::error::{ChefError, Result};
use crate::providers::{ImageGenerator, ImageOptions};

/// Poll every 500ms as per provider docs
const POLLING_INTERVAL: Duration = Duration::from_millis(500);
/// Maximum 1 minute of polling (120 * 500ms)
const MAX_POLLING_ATTEMPTS: u32 = 120;

const NEGATIVE_PROMPT: &str =
    "blurry, low-quality, cartoon, unrealistic, watermark, text, signature";

/// Task states the polling endpoint reports. Anything the provider adds
/// later lands in `Unknown` and is treated as a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxStatus {
    TaskNotFound,
    Pending,
    RequestModerated,
    ContentModerated,
    Ready,
    Error,
    Unknown,
}

impl FluxStatus {
    fn from_label(label: &str) -> Self {
        match label {
            "Task not found" => FluxStatus::TaskNotFound,
            "Pending" => FluxStatus::Pending,
            "Request Moderated" => FluxStatus::RequestModerated,
            "Content Moderated" => FluxStatus::ContentModerated,
            "Ready" => FluxStatus::Ready,
            "Error" => FluxStatus::Error,
            _ => FluxStatus::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PollResult {
    #[serde(default)]
    sample: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    result: Option<PollResult>,
}

/// Client for the asynchronous submit-then-poll image provider.
pub struct FluxClient {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_attempts: u32,
}

impl FluxClient {
    /// Create a new client from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api_key =
            AppConfig::resolve_key(&config.flux_api_key, "FLUX_API_KEY", "Flux API key")?;

        Ok(FluxClient {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout))
                .build()?,
            api_key,
            base_url: "https://api.bfl.ml/v1".to_string(),
            poll_interval: POLLING_INTERVAL,
            max_attempts: MAX_POLLING_ATTEMPTS,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        FluxClient {
            client: Client::new(),
            api_key,
            base_url,
            poll_interval: POLLING_INTERVAL,
            max_attempts: MAX_POLLING_ATTEMPTS,
        }
    }

    /// Override the polling cadence; tests shrink the interval so the
    /// attempt ceiling is reachable without real waiting.
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_attempts = max_attempts;
        self
    }

    /// Submit a prompt and poll until the image is ready.
    pub async fn generate_image(&self, prompt: &str) -> Result<String> {
        debug!("Submitting image generation: {prompt}");

        let response = self
            .client
            .post(format!("{}/flux-pro-1.1", self.base_url))
            .header("X-Key", &self.api_key)
            .header("accept", "application/json")
            .json(&json!({
                "prompt": prompt,
                "negative_prompt": NEGATIVE_PROMPT,
                "width": 1024,
                "height": 1024
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let payload: Value = response.json().await.unwrap_or_default();
            return Err(map_http_error(status, &payload));
        }

        let payload: Value = response.json().await?;
        let task_id = payload["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChefError::Api("No task ID received from Flux API".to_string()))?;

        debug!("Task created with id {task_id}");
        self.poll_result(&task_id).await
    }

    async fn poll_result(&self, task_id: &str) -> Result<String> {
        let mut attempts = 0;

        while attempts < self.max_attempts {
            debug!(
                "Checking result for task {task_id}, attempt {}/{}",
                attempts + 1,
                self.max_attempts
            );

            let response = self
                .client
                .get(format!("{}/get_result", self.base_url))
                .query(&[("id", task_id)])
                .header("X-Key", &self.api_key)
                .header("accept", "application/json")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let payload: Value = response.json().await.unwrap_or_default();
                return Err(map_http_error(status, &payload));
            }

            let poll: PollResponse = response.json().await?;
            match FluxStatus::from_label(&poll.status) {
                FluxStatus::Ready => {
                    return poll
                        .result
                        .and_then(|r| r.sample)
                        .ok_or_else(|| {
                            ChefError::Api("No image URL in completed response".to_string())
                        });
                }
                FluxStatus::Error => {
                    let message = poll
                        .result
                        .and_then(|r| r.error)
                        .unwrap_or_else(|| "Image generation failed".to_string());
                    error!("Task {task_id} failed: {message}");
                    return Err(ChefError::Api(message));
                }
                FluxStatus::RequestModerated | FluxStatus::ContentModerated => {
                    return Err(ChefError::Api(
                        "Content was flagged by moderation system".to_string(),
                    ));
                }
                FluxStatus::TaskNotFound => {
                    return Err(ChefError::Api(
                        "Image generation task not found".to_string(),
                    ));
                }
                FluxStatus::Pending => {
                    sleep(self.poll_interval).await;
                    attempts += 1;
                }
                FluxStatus::Unknown => {
                    return Err(ChefError::Api(
                        "Unexpected status from image service".to_string(),
                    ));
                }
            }
        }

        warn!("Task {task_id} still pending after {} attempts", self.max_attempts);
        Err(ChefError::Timeout(
            "Timeout: Image generation took too long".to_string(),
        ))
    }
}

#[async_trait]
impl ImageGenerator for FluxClient {
    fn provider_name(&self) -> &str {
        "flux"
    }

    fn cost_per_image(&self) -> i64 {
        crate::pricing::RECIPE_IMAGE_COST_FLUX
    }

    async fn generate(&self, prompt: &str, _options: &ImageOptions) -> Result<String> {
        self.generate_image(prompt).await
    }
}

fn map_http_error(status: StatusCode, payload: &Value) -> ChefError {
    match status {
        StatusCode::UNAUTHORIZED => {
            ChefError::Unauthorized("Invalid Flux API key".to_string())
        }
        StatusCode::TOO_MANY_REQUESTS => ChefError::RateLimited(
            "You have reached the maximum number of active tasks (24). Please wait for some tasks to complete."
                .to_string(),
        ),
        StatusCode::PAYMENT_REQUIRED => ChefError::InsufficientCredits(
            "Insufficient credits. Please add credits to your Flux account.".to_string(),
        ),
        _ => {
            let message = payload["message"].as_str().unwrap_or("request failed");
            ChefError::Api(format!("Flux API error: {message}"))
        }
    }
}
