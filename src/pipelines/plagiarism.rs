use crate::error::{ChefError, Result};
use crate::model::PlagiarismResult;
use crate::plagiarism::WinstonClient;
use crate::providers::OpenAiClient;
use crate::rewriter::{extract_paragraph_text, rewrite_content, BacklinkOptions, PlagiarizedSection};
use crate::store::Backend;

/// Result of a check-then-rewrite run
#[derive(Debug)]
pub struct CheckOutcome {
    pub result: PlagiarismResult,
    /// Present when a rewrite was performed
    pub rewritten_html: Option<String>,
}

/// Check the paragraph content of an HTML article for plagiarism.
pub async fn check_html(
    winston: &WinstonClient,
    store: &Backend,
    html: &str,
    excluded_urls: &[String],
) -> Result<PlagiarismResult> {
    let text = extract_paragraph_text(html);
    if text.is_empty() {
        return Err(ChefError::Validation(
            "No paragraph content found in the HTML".to_string(),
        ));
    }
    winston.check_plagiarism(store, &text, excluded_urls).await
}

/// Check, then rewrite flagged passages and/or inject backlinks.
///
/// The rewrite runs when the check surfaced matches or when backlink
/// insertion was requested; a clean article with no backlink config comes
/// back untouched.
pub async fn check_and_rewrite(
    winston: &WinstonClient,
    store: &Backend,
    openai: &OpenAiClient,
    html: &str,
    excluded_urls: &[String],
    backlinks: Option<BacklinkOptions>,
) -> Result<CheckOutcome> {
    let result = check_html(winston, store, html, excluded_urls).await?;

    let rewritten_html = if result.matches.is_empty() && backlinks.is_none() {
        None
    } else {
        let sections: Vec<PlagiarizedSection> = result
            .matches
            .iter()
            .map(|m| PlagiarizedSection {
                text: m.text.clone(),
                source: m.source.clone(),
            })
            .collect();
        Some(rewrite_content(openai, html, &sections, backlinks.as_ref()).await?)
    };

    Ok(CheckOutcome {
        result,
        rewritten_html,
    })
}
