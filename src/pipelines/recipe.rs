use log::{info, warn};
use serde_json::from_value;

use crate::error::{ChefError, Result};
use crate::model::{Recipe, RecipeStatus};
use crate::parser::parse_recipe_text;
use crate::providers::{ImageGenerator, ImageOptions, OpenAiClient};
use crate::store::Backend;
use crate::template::{to_data_url, Composer, Scene};

/// Batch driver for the generation pipeline: text, parse, image, debit, in
/// that order, one recipe at a time.
pub struct RecipeBatch<'a> {
    text: &'a OpenAiClient,
    images: &'a dyn ImageGenerator,
    store: &'a Backend,
    options: ImageOptions,
}

impl<'a> RecipeBatch<'a> {
    pub fn new(
        text: &'a OpenAiClient,
        images: &'a dyn ImageGenerator,
        store: &'a Backend,
    ) -> Self {
        RecipeBatch {
            text,
            images,
            store,
            options: ImageOptions::default(),
        }
    }

    pub fn with_image_options(mut self, options: ImageOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the pipeline for every submitted name.
    ///
    /// The whole batch's cost is verified against the balance before anything
    /// starts; each recipe is then driven to completion (or error)
    /// independently, so one failure never aborts the rest.
    pub async fn run(&self, names: &[String]) -> Result<Vec<Recipe>> {
        let valid: Vec<&str> = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if valid.is_empty() {
            return Err(ChefError::Validation(
                "Please enter at least one recipe name.".to_string(),
            ));
        }

        let required = self.images.cost_per_image() * valid.len() as i64;
        let balance = self
            .store
            .token_balance()
            .await
            .map_err(|_| ChefError::Api("Failed to check token balance".to_string()))?;
        if balance < required {
            return Err(ChefError::InsufficientTokens(format!(
                "You need {required} tokens to generate {} recipes.",
                valid.len()
            )));
        }

        info!(
            "Generating {} recipes via {}",
            valid.len(),
            self.images.provider_name()
        );

        let mut recipes = Vec::with_capacity(valid.len());
        for name in valid {
            let mut recipe = Recipe::new(name);
            match self.generate_one(&mut recipe).await {
                Ok(()) => {
                    recipe.status = RecipeStatus::Completed;
                    info!("Generated recipe '{}'", recipe.name);
                }
                Err(e) => {
                    warn!("Recipe '{}' failed: {e}", recipe.name);
                    recipe.fail(e.to_string());
                }
            }
            recipes.push(recipe);
        }
        Ok(recipes)
    }

    /// Text must parse before the image request starts; the image must exist
    /// before the debit; the debit happens only for a concrete success.
    async fn generate_one(&self, recipe: &mut Recipe) -> Result<()> {
        let text = self.text.generate_recipe(&recipe.name).await?;
        let parts = parse_recipe_text(&text);
        let prompt = parts.image_prompt.clone();
        recipe.generated_text = Some(text);
        recipe.parsed = Some(parts);

        let image_url = self.images.generate(&prompt, &self.options).await?;
        recipe.image_url = Some(image_url);

        let debited = self
            .store
            .try_debit_tokens(self.images.cost_per_image())
            .await
            .unwrap_or(false);
        if !debited {
            return Err(ChefError::Api("Failed to deduct tokens".to_string()));
        }
        Ok(())
    }
}

/// Composite the active template over a completed recipe's image, replacing
/// the placeholder text with the recipe title. Returns the exported image as
/// a data URL and records the applied template on the recipe.
pub async fn apply_active_template(
    store: &Backend,
    composer: &Composer,
    recipe: &mut Recipe,
) -> Result<String> {
    let image_url = recipe
        .image_url
        .clone()
        .ok_or_else(|| ChefError::Validation("Recipe has no generated image.".to_string()))?;

    let template = store
        .active_template()
        .await?
        .ok_or_else(|| ChefError::Api("No active template found".to_string()))?;
    let scene: Scene = from_value(template.canvas_data.clone())?;

    let title = recipe
        .parsed
        .as_ref()
        .map(|parts| parts.title.clone())
        .unwrap_or_else(|| recipe.name.clone());

    let jpeg = composer
        .compose_jpeg(&scene, &image_url, Some(&title))
        .await?;
    recipe.template_id = Some(template.id);
    Ok(to_data_url(&jpeg))
}
