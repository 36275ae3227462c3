use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a recipe in a generation batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    Pending,
    Completed,
    Error,
}

/// One generated recipe, as held in session state and the rolling history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub status: RecipeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<RecipeParts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Recipe {
            id: Uuid::new_v4(),
            name: name.into(),
            status: RecipeStatus::Pending,
            image_url: None,
            generated_text: None,
            parsed: None,
            template_id: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RecipeStatus::Error;
        self.error = Some(message.into());
    }
}

/// The seven labeled sections extracted from generated recipe text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeParts {
    pub title: String,
    pub description: String,
    pub ingredients: String,
    pub instructions: String,
    /// Image prompt describing the finished dish from above
    pub image_prompt: String,
    /// Image prompt describing a close-up shot
    pub macro_prompt: String,
    pub hashtags: String,
}

impl RecipeParts {
    /// Plain-text export without section markers, ready for download
    pub fn downloadable_text(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}\n\n{}",
            self.title, self.description, self.ingredients, self.instructions, self.hashtags
        )
    }
}

/// A reusable visual style registered with the image provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub id: Uuid,
    pub name: String,
    pub base_style: String,
    /// Provider-assigned identifier passed back on generation requests
    pub custom_style_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A stored canvas template; `scene` is the serialized layer document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub canvas_data: serde_json::Value,
    pub is_active: bool,
}

/// Normalized plagiarism check outcome. Scores are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismResult {
    pub score: f64,
    pub matches: Vec<PlagiarismMatch>,
    pub stats: PlagiarismStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismMatch {
    pub text: String,
    pub source: String,
    pub similarity: f64,
    pub identical_words: u64,
    pub similar_words: u64,
    pub total_words: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismStats {
    pub credits_used: u64,
    pub credits_remaining: u64,
    pub word_count: u64,
    pub plagiarized_words: u64,
}

/// A purchasable token bundle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenPackage {
    pub tokens: i64,
    pub price_usd: u32,
    pub description: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_recipe_is_pending() {
        let recipe = Recipe::new("Greek Salad");
        assert_eq!(recipe.status, RecipeStatus::Pending);
        assert!(recipe.image_url.is_none());
        assert!(recipe.error.is_none());
    }

    #[test]
    fn test_fail_sets_status_and_message() {
        let mut recipe = Recipe::new("Greek Salad");
        recipe.fail("Flux API error: boom");
        assert_eq!(recipe.status, RecipeStatus::Error);
        assert_eq!(recipe.error.as_deref(), Some("Flux API error: boom"));
    }

    #[test]
    fn test_downloadable_text_skips_prompts() {
        let parts = RecipeParts {
            title: "Greek Salad".into(),
            description: "Fresh and tangy.".into(),
            ingredients: "- tomatoes\n- feta".into(),
            instructions: "1. Chop\n2. Toss".into(),
            image_prompt: "overhead shot".into(),
            macro_prompt: "close-up".into(),
            hashtags: "#salad #greek".into(),
        };
        let text = parts.downloadable_text();
        assert!(text.starts_with("Greek Salad\n\n"));
        assert!(text.ends_with("#salad #greek"));
        assert!(!text.contains("overhead shot"));
        assert!(!text.contains("close-up"));
    }

    #[test]
    fn test_recipe_roundtrips_through_json() {
        let recipe = Recipe::new("Pad Thai");
        let json = serde_json::to_string(&recipe).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, recipe.id);
        assert_eq!(back.name, "Pad Thai");
        assert_eq!(back.status, RecipeStatus::Pending);
    }
}
