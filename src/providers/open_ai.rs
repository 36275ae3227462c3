use std::time::Duration;

use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::error::{ChefError, Result};
use crate::parser::missing_sections;
use crate::providers::prompt::{
    feed_list_prompt, recipe_prompt, FEED_LIST_SYSTEM_PROMPT, RECIPE_SYSTEM_PROMPT,
};

/// Client for the chat-completions text API.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api_key =
            AppConfig::resolve_key(&config.openai_api_key, "OPENAI_API_KEY", "OpenAI API key")?;

        Ok(OpenAiClient {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout))
                .build()?,
            api_key,
            base_url: "https://api.openai.com".to_string(),
            model: config.openai_model.clone(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        OpenAiClient {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// One chat-completion round trip. Absence of content in the response is
    /// a hard failure.
    pub async fn chat(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": temperature,
        });
        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let payload: Value = response.json().await.unwrap_or_default();
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("request failed")
                .to_string();
            return Err(map_status(status, message));
        }

        let response_body: Value = response.json().await?;
        debug!("{:?}", response_body);
        let content = response_body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ChefError::Api("Invalid response from OpenAI".to_string()))?
            .to_string();

        Ok(content)
    }

    /// Generate the seven-section recipe text for `recipe_name`.
    ///
    /// Fails with the exact missing marker names if the model drops any
    /// section; parsing downstream never fails.
    pub async fn generate_recipe(&self, recipe_name: &str) -> Result<String> {
        if recipe_name.trim().is_empty() {
            return Err(ChefError::Validation(
                "Recipe name is required.".to_string(),
            ));
        }

        let content = self
            .chat(
                RECIPE_SYSTEM_PROMPT,
                &recipe_prompt(recipe_name),
                0.7,
                Some(2000),
            )
            .await?;

        let missing = missing_sections(&content);
        if !missing.is_empty() {
            return Err(ChefError::MissingSections(missing));
        }

        Ok(content)
    }

    /// Turn raw feed analytics data into `count` recipe names, one per line.
    pub async fn generate_recipe_list(&self, feed_data: &str, count: u64) -> Result<Vec<String>> {
        if feed_data.trim().is_empty() {
            return Err(ChefError::Validation(
                "Feed data is required.".to_string(),
            ));
        }

        let content = self
            .chat(
                FEED_LIST_SYSTEM_PROMPT,
                &feed_list_prompt(feed_data, count),
                0.8,
                None,
            )
            .await?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// One rewriter chunk round trip; used by the content rewriter with its
    /// own prompt assembly.
    pub async fn rewrite_chunk(&self, system: &str, prompt: &str) -> Result<String> {
        let content = self.chat(system, prompt, 0.7, None).await?;
        Ok(content.trim().to_string())
    }
}

fn map_status(status: StatusCode, message: String) -> ChefError {
    match status {
        StatusCode::UNAUTHORIZED => ChefError::Unauthorized(format!("OpenAI API error: {message}")),
        StatusCode::TOO_MANY_REQUESTS => {
            ChefError::RateLimited(format!("OpenAI API error: {message}"))
        }
        StatusCode::PAYMENT_REQUIRED => {
            ChefError::InsufficientCredits(format!("OpenAI API error: {message}"))
        }
        _ => ChefError::Api(format!("OpenAI API error: {message}")),
    }
}
