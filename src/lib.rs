pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod parser;
pub mod pipelines;
pub mod plagiarism;
pub mod pricing;
pub mod providers;
pub mod proxy;
pub mod rewriter;
pub mod store;
pub mod template;

pub use config::AppConfig;
pub use error::{ChefError, Result};

use model::RecipeParts;

/// Generate and parse the text content for one recipe name.
///
/// Convenience wrapper over [`providers::OpenAiClient`] and
/// [`parser::parse_recipe_text`] for callers that only need the text side.
pub async fn generate_recipe_text(config: &AppConfig, name: &str) -> Result<RecipeParts> {
    let client = providers::OpenAiClient::new(config)?;
    let text = client.generate_recipe(name).await?;
    Ok(parser::parse_recipe_text(&text))
}
