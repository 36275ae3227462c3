use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use log::warn;

use crate::error::Result;
use crate::model::Recipe;

/// Recipes older than this are pruned on load
const EXPIRATION_HOURS: i64 = 12;

/// Rolling local history of generated recipes, persisted as one JSON array.
pub struct RecipeHistory {
    path: PathBuf,
}

impl RecipeHistory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        RecipeHistory {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the history, dropping entries past the age cutoff. The pruned
    /// list is written back so expired entries do not linger on disk.
    pub async fn load(&self) -> Result<Vec<Recipe>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let recipes: Vec<Recipe> = match serde_json::from_str(&raw) {
            Ok(recipes) => recipes,
            Err(e) => {
                warn!("Discarding unreadable history file: {e}");
                return Ok(Vec::new());
            }
        };

        let cutoff = Utc::now() - Duration::hours(EXPIRATION_HOURS);
        let valid: Vec<Recipe> = recipes
            .into_iter()
            .filter(|recipe| recipe.created_at > cutoff)
            .collect();

        self.save(&valid).await?;
        Ok(valid)
    }

    /// Persist the full recipe list
    pub async fn save(&self, recipes: &[Recipe]) -> Result<()> {
        let json = serde_json::to_string(recipes)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Prepend newly generated recipes to the stored history
    pub async fn record(&self, new_recipes: &[Recipe]) -> Result<()> {
        let mut recipes = self.load().await?;
        let mut combined: Vec<Recipe> = new_recipes.to_vec();
        combined.append(&mut recipes);
        self.save(&combined).await
    }

    /// Remove the history file entirely
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
