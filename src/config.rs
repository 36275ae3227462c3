use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
///
/// Every secret is optional here; each client constructor resolves its own
/// key from this struct or the matching environment variable and fails with
/// a "not configured" error before attempting any network call.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Base URL of the plagiarism proxy (the Winston key never leaves it)
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// OpenAI API key for recipe text generation and rewriting
    pub openai_api_key: Option<String>,
    /// OpenAI model identifier
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Recraft API key (synchronous image provider)
    pub recraft_api_key: Option<String>,
    /// Flux/BFL API key (submit-then-poll image provider)
    pub flux_api_key: Option<String>,
    /// Winston API key, used only by the proxy binary
    pub winston_api_key: Option<String>,
    /// PayPal client id for the purchase button
    pub paypal_client_id: Option<String>,
    /// Supabase project URL (token ledger, styles, templates)
    pub supabase_url: Option<String>,
    /// Supabase anon key
    pub supabase_anon_key: Option<String>,
    /// Request timeout in seconds for provider calls
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Where the rolling recipe history file lives
    #[serde(default = "default_history_path")]
    pub history_path: String,
    /// Directory scanned for .ttf/.otf files used by template composition
    pub fonts_dir: Option<String>,
}

fn default_api_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_openai_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_history_path() -> String {
    "recipe_history.json".to_string()
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with CHEFSCRIPT__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: CHEFSCRIPT__OPENAI_API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            // Optional config file (can be missing)
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("CHEFSCRIPT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Resolve a secret from the config value or a fallback environment
    /// variable, in that order.
    pub(crate) fn resolve_key(
        configured: &Option<String>,
        env_var: &str,
        label: &'static str,
    ) -> crate::error::Result<String> {
        configured
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .ok_or(crate::error::ChefError::NotConfigured(label))
    }
}
