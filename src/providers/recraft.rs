use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::config::AppConfig;
use crate::error::{ChefError, Result};
use crate::providers::{ImageGenerator, ImageOptions};

/// Operations per rolling minute the provider tolerates
const RATE_LIMIT: u32 = 100;
const RATE_WINDOW: Duration = Duration::from_secs(60);
/// Pause between consecutive operations
const OPERATION_SPACING: Duration = Duration::from_millis(600);

const DEFAULT_STYLE: &str = "realistic_image";
const DEFAULT_RESOLUTION: &str = "1024x1024";

struct GateState {
    window_started: Instant,
    count: u32,
}

/// FIFO admission gate bounding operations to `limit` per rolling window,
/// with a fixed pause between operations. One gate per client instance; the
/// fair mutex is the queue.
pub struct RateGate {
    limit: u32,
    window: Duration,
    spacing: Duration,
    state: Mutex<GateState>,
}

impl RateGate {
    pub fn new(limit: u32) -> Self {
        Self::with_timing(limit, RATE_WINDOW, OPERATION_SPACING)
    }

    /// Gate with explicit window and spacing; tests shrink these to run on a
    /// paused clock.
    pub fn with_timing(limit: u32, window: Duration, spacing: Duration) -> Self {
        RateGate {
            limit,
            window,
            spacing,
            state: Mutex::new(GateState {
                window_started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Run `op` once the gate admits it. Operations are fully serialized:
    /// the next caller is not admitted until `op` resolves and the spacing
    /// pause has elapsed.
    pub async fn run<F, T>(&self, op: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if now.duration_since(state.window_started) >= self.window {
            state.window_started = now;
            state.count = 0;
        }

        if state.count >= self.limit {
            let elapsed = Instant::now().duration_since(state.window_started);
            let wait = self.window.saturating_sub(elapsed);
            warn!("Rate limit reached, pausing {wait:?} until the next window");
            sleep(wait).await;
            state.window_started = Instant::now();
            state.count = 0;
        }

        state.count += 1;
        let result = op.await;
        sleep(self.spacing).await;
        result
    }
}

/// Client for the synchronous-style image provider. All operations funnel
/// through one [`RateGate`].
pub struct RecraftClient {
    client: Client,
    api_key: String,
    base_url: String,
    gate: RateGate,
}

impl RecraftClient {
    /// Create a new client from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api_key = AppConfig::resolve_key(
            &config.recraft_api_key,
            "RECRAFT_API_KEY",
            "Recraft API key",
        )?;

        Ok(RecraftClient {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout))
                .build()?,
            api_key,
            base_url: "https://external.api.recraft.ai".to_string(),
            gate: RateGate::new(RATE_LIMIT),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        RecraftClient {
            client: Client::new(),
            api_key,
            base_url,
            gate: RateGate::new(RATE_LIMIT),
        }
    }

    #[doc(hidden)]
    pub fn with_gate(mut self, gate: RateGate) -> Self {
        self.gate = gate;
        self
    }

    /// Generate one image and return its hosted URL.
    pub async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<String> {
        let mut body = serde_json::json!({
            "prompt": prompt,
            "resolution": options.resolution.as_deref().unwrap_or(DEFAULT_RESOLUTION),
            "num_images": options.num_images.unwrap_or(1),
        });
        match &options.custom_style_id {
            Some(style_id) => body["style_id"] = Value::from(style_id.as_str()),
            None => {
                body["style"] = Value::from(options.style.as_deref().unwrap_or(DEFAULT_STYLE))
            }
        }

        self.gate
            .run(async {
                let response = self
                    .client
                    .post(format!("{}/v1/images/generations", self.base_url))
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let payload: Value = response.json().await.unwrap_or_default();
                    return Err(map_generation_error(status, &payload));
                }

                let payload: Value = response.json().await?;
                debug!("{:?}", payload);
                payload["data"][0]["url"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ChefError::Api("No image URL in response".to_string()))
            })
            .await
    }

    /// Register a custom style from reference images; returns the provider's
    /// style id. `images` are (file name, PNG/JPEG bytes) pairs.
    pub async fn create_style(
        &self,
        base_style: &str,
        images: Vec<(String, Vec<u8>)>,
    ) -> Result<String> {
        if images.is_empty() {
            return Err(ChefError::Validation(
                "At least one reference image is required.".to_string(),
            ));
        }

        let mut form = Form::new().text("style", base_style.to_string());
        for (index, (name, bytes)) in images.into_iter().enumerate() {
            let part = Part::bytes(bytes)
                .file_name(name)
                .mime_str("image/png")
                .map_err(|e| ChefError::Api(format!("Invalid image part: {e}")))?;
            form = form.part(format!("file{}", index + 1), part);
        }

        self.gate
            .run(async {
                let response = self
                    .client
                    .post(format!("{}/v1/styles", self.base_url))
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .multipart(form)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let payload: Value = response.json().await.unwrap_or_default();
                    return Err(map_style_error(status, &payload));
                }

                let payload: Value = response.json().await?;
                payload["id"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ChefError::Api("No style ID in response".to_string()))
            })
            .await
    }
}

#[async_trait]
impl ImageGenerator for RecraftClient {
    fn provider_name(&self) -> &str {
        "recraft"
    }

    fn cost_per_image(&self) -> i64 {
        crate::pricing::RECIPE_IMAGE_COST_RECRAFT
    }

    async fn generate(&self, prompt: &str, options: &ImageOptions) -> Result<String> {
        self.generate_image(prompt, options).await
    }
}

fn upstream_message(payload: &Value) -> String {
    payload["message"]
        .as_str()
        .unwrap_or("request failed")
        .to_string()
}

fn map_generation_error(status: StatusCode, payload: &Value) -> ChefError {
    let message = upstream_message(payload);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ChefError::RateLimited(
            "Service is busy. Please try again in a few moments.".to_string(),
        ),
        StatusCode::UNAUTHORIZED => ChefError::Unauthorized(
            "Image generation service is temporarily unavailable.".to_string(),
        ),
        _ if message.contains("not_enough_credits") => ChefError::InsufficientCredits(
            "The image generation service needs more credits. Please try again later.".to_string(),
        ),
        _ => ChefError::Api(format!("Image generation failed: {message}")),
    }
}

fn map_style_error(status: StatusCode, payload: &Value) -> ChefError {
    let message = upstream_message(payload);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ChefError::RateLimited(
            "Service is busy. Please try again in a few moments.".to_string(),
        ),
        StatusCode::UNAUTHORIZED => ChefError::Unauthorized(
            "Style creation service is temporarily unavailable.".to_string(),
        ),
        _ => ChefError::Api(format!("Style creation failed: {message}")),
    }
}
