use log::info;

use crate::error::{ChefError, Result};
use crate::pricing::feed_extraction_cost;
use crate::providers::OpenAiClient;
use crate::store::Backend;

/// Turn exported feed analytics data into recipe ideas.
///
/// Costs `ceil(count / 25)` tokens, verified before the generation call and
/// debited only after a non-empty list came back.
pub async fn extract_recipe_ideas(
    openai: &OpenAiClient,
    store: &Backend,
    feed_data: &str,
    count: u64,
) -> Result<Vec<String>> {
    if count == 0 {
        return Err(ChefError::Validation(
            "Recipe count must be at least 1.".to_string(),
        ));
    }

    let required = feed_extraction_cost(count);
    let balance = store
        .token_balance()
        .await
        .map_err(|_| ChefError::Api("Failed to check token balance".to_string()))?;
    if balance < required {
        return Err(ChefError::InsufficientTokens(format!(
            "This operation requires {required} tokens."
        )));
    }

    let names = openai.generate_recipe_list(feed_data, count).await?;
    if names.is_empty() {
        return Err(ChefError::Api(
            "Failed to generate recipe list".to_string(),
        ));
    }

    let debited = store.try_debit_tokens(required).await.unwrap_or(false);
    if !debited {
        return Err(ChefError::Api("Failed to deduct tokens".to_string()));
    }

    info!("Extracted {} recipe ideas for {required} tokens", names.len());
    Ok(names)
}
