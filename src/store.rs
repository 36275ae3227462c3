use std::time::Duration;

use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ChefError, Result};
use crate::model::{Style, Template};

/// Thin client for the managed data platform: the token ledger and the
/// styles/templates tables. Auth, realtime and everything else the platform
/// does stays on the platform; this only shapes requests.
///
/// Token mutations are single conditional server-side operations; there is
/// no read-then-write window on the balance.
pub struct Backend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Backend {
    /// Create a new backend client from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let base_url = config
            .supabase_url
            .clone()
            .ok_or(ChefError::NotConfigured("Supabase URL"))?;
        let api_key = AppConfig::resolve_key(
            &config.supabase_anon_key,
            "SUPABASE_ANON_KEY",
            "Supabase anon key",
        )?;

        Ok(Backend {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout))
                .build()?,
            base_url,
            api_key,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        Backend {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let payload: Value = response.json().await.unwrap_or_default();
        let message = payload["message"]
            .as_str()
            .unwrap_or("request failed")
            .to_string();
        Err(match status {
            StatusCode::UNAUTHORIZED => ChefError::Unauthorized(message),
            _ => ChefError::Api(message),
        })
    }

    /// Current token balance of the authenticated user
    pub async fn token_balance(&self) -> Result<i64> {
        let response = self.get("/rest/v1/users?select=tokens").send().await?;
        let rows: Vec<Value> = Self::expect_success(response).await?.json().await?;
        rows.first()
            .and_then(|row| row["tokens"].as_i64())
            .ok_or_else(|| ChefError::Api("No token balance row".to_string()))
    }

    /// Debit `amount` tokens if and only if the balance covers it; returns
    /// whether the debit happened. Single conditional operation, no
    /// read-then-write window.
    pub async fn try_debit_tokens(&self, amount: i64) -> Result<bool> {
        let response = self
            .post("/rest/v1/rpc/deduct_user_tokens")
            .json(&json!({ "amount": amount }))
            .send()
            .await?;
        let value: Value = Self::expect_success(response).await?.json().await?;
        debug!("deduct_user_tokens({amount}) -> {value}");
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Credit `amount` tokens after a completed purchase
    pub async fn add_tokens(&self, amount: i64) -> Result<()> {
        let response = self
            .post("/rest/v1/rpc/add_tokens")
            .json(&json!({ "amount": amount }))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Persist a newly registered style
    pub async fn insert_style(&self, style: &Style) -> Result<()> {
        let response = self
            .post("/rest/v1/styles")
            .header("Prefer", "return=minimal")
            .json(style)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    pub async fn list_styles(&self) -> Result<Vec<Style>> {
        let response = self.get("/rest/v1/styles?select=*").send().await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    /// Insert or update a template row
    pub async fn save_template(&self, template: &Template) -> Result<()> {
        let response = self
            .post("/rest/v1/templates")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(template)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        let response = self
            .get("/rest/v1/templates?select=*&order=created_at.desc")
            .send()
            .await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    pub async fn delete_template(&self, id: Uuid) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/rest/v1/templates?id=eq.{id}", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Activate one template and clear the flag on every other row in a
    /// single server-side operation. At most one row is active at a time.
    pub async fn set_active_template(&self, id: Uuid) -> Result<()> {
        let response = self
            .post("/rest/v1/rpc/set_active_template")
            .json(&json!({ "template_id": id }))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// The currently active template, if any
    pub async fn active_template(&self) -> Result<Option<Template>> {
        let response = self
            .get("/rest/v1/templates?select=*&is_active=eq.true")
            .send()
            .await?;
        let mut rows: Vec<Template> = Self::expect_success(response).await?.json().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }
}
