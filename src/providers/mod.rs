mod flux;
mod open_ai;
mod prompt;
mod recraft;

pub use flux::{FluxClient, FluxStatus};
pub use open_ai::OpenAiClient;
pub use prompt::{
    feed_list_prompt, recipe_prompt, FEED_LIST_SYSTEM_PROMPT, RECIPE_SYSTEM_PROMPT,
    REWRITE_SYSTEM_PROMPT,
};
pub use recraft::{RateGate, RecraftClient};

use async_trait::async_trait;

use crate::error::Result;

/// Options forwarded to image generation requests. Providers ignore the
/// fields they have no equivalent for.
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    /// Built-in provider style name; defaults to `realistic_image`
    pub style: Option<String>,
    /// Provider id of a custom style; takes precedence over `style`
    pub custom_style_id: Option<String>,
    /// Resolution string such as `1024x1024`
    pub resolution: Option<String>,
    pub num_images: Option<u32>,
}

/// Unified trait for image providers: a prompt in, a hosted image URL out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Provider name (e.g. "recraft", "flux")
    fn provider_name(&self) -> &str;

    /// Tokens charged per generated recipe image
    fn cost_per_image(&self) -> i64;

    async fn generate(&self, prompt: &str, options: &ImageOptions) -> Result<String>;
}
