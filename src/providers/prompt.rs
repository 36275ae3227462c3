/// System prompt for recipe generation. The generator is held to the exact
/// bracketed-marker format the section parser expects.
pub const RECIPE_SYSTEM_PROMPT: &str = "You are a professional recipe writer and food photographer. Always maintain the exact format with all section markers ([TITLE], [DESCRIPTION], etc.) and include all required sections.";

/// System prompt for feed-based recipe idea extraction.
pub const FEED_LIST_SYSTEM_PROMPT: &str = "You are a professional recipe developer who specializes in creating trending recipe content for social media.";

/// System prompt for the HTML rewriter.
pub const REWRITE_SYSTEM_PROMPT: &str = "You are a professional content writer and SEO expert who specializes in creating unique, engaging content with appropriate backlinks when requested.";

/// User prompt demanding the seven labeled sections for `recipe_name`.
pub fn recipe_prompt(recipe_name: &str) -> String {
    format!(
        r#"
Create a detailed recipe for "{recipe_name}" following this EXACT format with all sections:

[TITLE]
{recipe_name}

[DESCRIPTION]
Write 2-3 compelling sentences about the dish.

[INGREDIENTS]
List all ingredients with exact measurements.

[INSTRUCTIONS]
Provide clear step-by-step cooking instructions.

[TOP_VIEW_PROMPT]
Write a detailed prompt for AI image generation describing how the finished dish should look from above.

[MACRO_PROMPT]
Write a detailed prompt for AI image generation describing a close-up shot of the dish.

[HASHTAGS]
List 5-7 relevant hashtags.

IMPORTANT:
- Include ALL sections with their exact markers
- Keep the [TITLE] exactly as provided
- Make descriptions engaging but concise
- Use metric measurements
- Include cooking times and temperatures
- Focus on visual details in image prompts
- Make hashtags relevant and trending
- Maintain the exact format with section markers"#
    )
}

/// User prompt turning feed analytics data into `count` recipe names,
/// one per line.
pub fn feed_list_prompt(feed_data: &str, count: u64) -> String {
    format!(
        r#"
Analyze the following FeedSpy data and generate {count} unique recipe ideas that would appeal to the same audience. Format the output as a simple list of recipe names, one per line.

FeedSpy Data:
{feed_data}

Rules:
- Generate exactly {count} recipes
- Each recipe should be unique
- Keep names concise but descriptive
- Focus on trending and popular recipes
- Consider seasonal ingredients
- One recipe per line
- No numbers or bullet points
"#
    )
}
