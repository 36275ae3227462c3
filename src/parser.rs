use log::warn;
use regex::Regex;

use crate::model::RecipeParts;

/// Section markers the generator must emit, in document order.
pub const REQUIRED_SECTIONS: [&str; 7] = [
    "TITLE",
    "DESCRIPTION",
    "INGREDIENTS",
    "INSTRUCTIONS",
    "TOP_VIEW_PROMPT",
    "MACRO_PROMPT",
    "HASHTAGS",
];

/// Names of the required sections absent from `text`.
///
/// Used by generation-level validation; an empty result means the text is
/// safe to hand to [`parse_recipe_text`].
pub fn missing_sections(text: &str) -> Vec<String> {
    REQUIRED_SECTIONS
        .iter()
        .filter(|section| !text.contains(&format!("[{section}]")))
        .map(|section| section.to_string())
        .collect()
}

/// Parse generated recipe text into its seven sections.
///
/// Extraction tries the exact `[MARKER]` form first, then a looser
/// label-and-newline form, then falls back to a fixed default per field, so
/// parsing never fails even on sloppy model output. Callers that need strict
/// output validate with [`missing_sections`] before parsing.
pub fn parse_recipe_text(text: &str) -> RecipeParts {
    let normalized = text.replace("\r\n", "\n");
    let normalized = normalized.trim();

    let title = extract_any(normalized, &["TITLE", "Recipe Title"])
        .unwrap_or_else(|| "Untitled Recipe".to_string());
    let description = extract_any(normalized, &["DESCRIPTION", "Description"])
        .unwrap_or_else(|| "No description available.".to_string());
    let ingredients = extract_any(normalized, &["INGREDIENTS", "Ingredients List"])
        .unwrap_or_else(|| "No ingredients listed.".to_string());
    let instructions = extract_any(normalized, &["INSTRUCTIONS", "Steps", "Method"])
        .unwrap_or_else(|| "No instructions available.".to_string());
    let image_prompt = extract_any(normalized, &["TOP_VIEW_PROMPT", "Image Description"])
        .unwrap_or_else(|| "A beautifully plated dish from above".to_string());
    let macro_prompt = extract_any(normalized, &["MACRO_PROMPT", "Close-up Description"])
        .unwrap_or_else(|| "A detailed close-up of the dish".to_string());
    let hashtags = extract_any(normalized, &["HASHTAGS", "Tags"])
        .unwrap_or_else(|| "#food #recipe #cooking".to_string());

    RecipeParts {
        title,
        description,
        ingredients,
        instructions,
        image_prompt,
        macro_prompt,
        hashtags,
    }
}

fn extract_any(text: &str, markers: &[&str]) -> Option<String> {
    markers.iter().find_map(|marker| extract_section(text, marker))
}

fn extract_section(text: &str, marker: &str) -> Option<String> {
    let escaped = regex::escape(marker);

    // Exact bracketed marker: content runs until the next marker or the end
    let exact = format!(r"(?s)\[{escaped}\]\n(.*?)(?:\n\[|\z)");
    if let Some(content) = first_capture(&exact, text) {
        return Some(content);
    }

    // Loose form: a bare label line, content runs until the next label line
    let loose = format!(r"(?s){escaped}:?\s*\n(.*?)(?:\n[A-Z][A-Za-z ]+:?\n|\z)");
    first_capture(&loose, text)
}

fn first_capture(pattern: &str, text: &str) -> Option<String> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Section pattern failed to compile: {e}");
            return None;
        }
    };
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|content| !content.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TEXT: &str = "[TITLE]\nGreek Salad\n\n[DESCRIPTION]\nA crisp, briny classic.\n\n[INGREDIENTS]\n- 4 tomatoes\n- 200g feta\n\n[INSTRUCTIONS]\n1. Chop vegetables.\n2. Toss with oil.\n\n[TOP_VIEW_PROMPT]\nOverhead shot of a rustic bowl of Greek salad.\n\n[MACRO_PROMPT]\nClose-up of feta crumbles over tomato wedges.\n\n[HASHTAGS]\n#greeksalad #feta #mediterranean";

    #[test]
    fn test_parses_all_sections_verbatim() {
        let parts = parse_recipe_text(FULL_TEXT);
        assert_eq!(parts.title, "Greek Salad");
        assert_eq!(parts.description, "A crisp, briny classic.");
        assert_eq!(parts.ingredients, "- 4 tomatoes\n- 200g feta");
        assert_eq!(parts.instructions, "1. Chop vegetables.\n2. Toss with oil.");
        assert_eq!(
            parts.image_prompt,
            "Overhead shot of a rustic bowl of Greek salad."
        );
        assert_eq!(
            parts.macro_prompt,
            "Close-up of feta crumbles over tomato wedges."
        );
        assert_eq!(parts.hashtags, "#greeksalad #feta #mediterranean");
    }

    #[test]
    fn test_crlf_is_normalized() {
        let text = FULL_TEXT.replace('\n', "\r\n");
        let parts = parse_recipe_text(&text);
        assert_eq!(parts.title, "Greek Salad");
        assert_eq!(parts.ingredients, "- 4 tomatoes\n- 200g feta");
    }

    #[test]
    fn test_loose_labels_are_accepted() {
        let text = "Recipe Title:\nPad Thai\n\nDescription:\nStreet-food noodles.\n";
        let parts = parse_recipe_text(text);
        assert_eq!(parts.title, "Pad Thai");
        assert_eq!(parts.description, "Street-food noodles.");
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let parts = parse_recipe_text("[TITLE]\nMystery Dish");
        assert_eq!(parts.title, "Mystery Dish");
        assert_eq!(parts.description, "No description available.");
        assert_eq!(parts.ingredients, "No ingredients listed.");
        assert_eq!(parts.instructions, "No instructions available.");
        assert_eq!(parts.image_prompt, "A beautifully plated dish from above");
        assert_eq!(parts.macro_prompt, "A detailed close-up of the dish");
        assert_eq!(parts.hashtags, "#food #recipe #cooking");
    }

    #[test]
    fn test_missing_sections_reports_exact_names() {
        let text = "[TITLE]\nX\n\n[DESCRIPTION]\nY\n\n[INGREDIENTS]\nZ\n\n[INSTRUCTIONS]\nW\n\n[HASHTAGS]\n#x";
        assert_eq!(
            missing_sections(text),
            vec!["TOP_VIEW_PROMPT".to_string(), "MACRO_PROMPT".to_string()]
        );
        assert!(missing_sections(FULL_TEXT).is_empty());
    }
}
