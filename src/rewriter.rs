use futures::future::try_join_all;
use log::debug;
use scraper::{Html, Selector};

use crate::error::Result;
use crate::providers::{OpenAiClient, REWRITE_SYSTEM_PROMPT};

/// Maximum characters per chunk sent to the text model
const MAX_CHUNK_LENGTH: usize = 12_000;

/// A passage known to be plagiarized, with its source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlagiarizedSection {
    pub text: String,
    pub source: String,
}

/// Backlink-insertion configuration
#[derive(Debug, Clone)]
pub struct BacklinkOptions {
    pub website_domain: String,
    /// Target density: one link per this many words
    pub words_per_link: u32,
    pub max_links: u32,
}

/// Split an HTML article into chunks on paragraph boundaries.
///
/// Paragraphs are packed greedily into the current chunk until adding the
/// next one would exceed the size limit; a paragraph is never split across
/// two chunks, so concatenating the chunks reproduces the paragraph sequence.
pub fn split_html_chunks(html: &str) -> Vec<String> {
    split_with_limit(html, MAX_CHUNK_LENGTH)
}

fn split_with_limit(html: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let paragraphs = Selector::parse("p").expect("static selector");

    let mut chunks = Vec::new();
    let mut current = String::new();

    for p in document.select(&paragraphs) {
        let p_html = p.html();
        if current.len() + p_html.len() > limit && !current.is_empty() {
            chunks.push(current);
            current = p_html;
        } else {
            current.push_str(&p_html);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Inner HTML of every paragraph, blank-line separated; this is what gets
/// submitted for plagiarism checking.
pub fn extract_paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let paragraphs = Selector::parse("p").expect("static selector");
    document
        .select(&paragraphs)
        .map(|p| p.inner_html())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Character and word counts over paragraph text content, used for the token
/// cost preview before a check is submitted.
pub fn paragraph_stats(html: &str) -> (usize, u64) {
    let document = Html::parse_document(html);
    let paragraphs = Selector::parse("p").expect("static selector");
    let text = document
        .select(&paragraphs)
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n\n");
    let words = crate::pricing::word_count(&text);
    (text.len(), words)
}

/// Rewrite plagiarized passages and/or inject backlinks across an HTML
/// article, chunk by chunk.
///
/// Chunks are requested concurrently and reassembled in original order; a
/// single chunk failure fails the whole rewrite.
pub async fn rewrite_content(
    client: &OpenAiClient,
    html: &str,
    plagiarized: &[PlagiarizedSection],
    backlinks: Option<&BacklinkOptions>,
) -> Result<String> {
    let chunks = split_html_chunks(html);
    let total = chunks.len();
    debug!("Rewriting {total} chunks");

    let rewritten = try_join_all(chunks.iter().enumerate().map(|(index, chunk)| {
        let prompt = chunk_prompt(chunk, plagiarized, backlinks, index, total);
        async move { client.rewrite_chunk(REWRITE_SYSTEM_PROMPT, &prompt).await }
    }))
    .await?;

    Ok(rewritten.join("\n"))
}

fn chunk_prompt(
    chunk: &str,
    plagiarized: &[PlagiarizedSection],
    backlinks: Option<&BacklinkOptions>,
    index: usize,
    total: usize,
) -> String {
    // Only sections verbatim-present in this chunk are called out
    let relevant: Vec<&PlagiarizedSection> = plagiarized
        .iter()
        .filter(|section| chunk.contains(&section.text))
        .collect();

    let instructions = match backlinks {
        Some(options) => {
            let rewrite_step = if plagiarized.is_empty() {
                ""
            } else {
                "1. Rewrite any plagiarized sections found in this chunk\n2. "
            };
            format!(
                "Instructions:\n{rewrite_step}Add contextually relevant backlinks from {domain}\n- Space links evenly (aim for one link per {words} words in this chunk)\n- Use the sitemap at {domain}/post-sitemap.xml\n- Choose relevant anchor text\n- Do not place links in the first paragraph of the article\n- Only link to topically related content",
                domain = options.website_domain,
                words = options.words_per_link,
            )
        }
        None => "Rewrite any plagiarized sections while maintaining style and structure."
            .to_string(),
    };

    let matches_block = if relevant.is_empty() {
        String::new()
    } else {
        let listed = relevant
            .iter()
            .enumerate()
            .map(|(i, section)| {
                format!(
                    "\n[Match {}]\n{}\nSource: {}\n",
                    i + 1,
                    section.text,
                    section.source
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("\nPlagiarized sections in this chunk:\n{listed}\n")
    };

    let rewrite_rule = if relevant.is_empty() {
        ""
    } else {
        "- Rewrite the plagiarized sections\n"
    };
    let backlink_rules = if backlinks.is_some() {
        "\n- Add contextually relevant backlinks\n- Use natural anchor text\n- Ensure links fit the context"
    } else {
        ""
    };

    format!(
        "\nProcess this chunk ({current}/{total}) of an HTML article. {instructions}\n\nContent chunk:\n{chunk}\n\n{matches_block}\n\nRules:\n{rewrite_rule}- Preserve all HTML tags and structure\n- Maintain the original writing style and tone\n- Ensure content is unique and original{backlink_rules}\n\nReturn Format:\nReturn only the processed HTML content, maintaining all original tags and structure.",
        current = index + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(paragraphs: &[&str]) -> String {
        paragraphs
            .iter()
            .map(|text| format!("<p>{text}</p>"))
            .collect()
    }

    #[test]
    fn test_paragraphs_never_split_across_chunks() {
        let html = article(&["a".repeat(40).as_str(), "b".repeat(40).as_str(), "c".repeat(40).as_str()]);
        let chunks = split_with_limit(&html, 50);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.starts_with("<p>"));
            assert!(chunk.ends_with("</p>"));
        }
    }

    #[test]
    fn test_chunks_concatenate_to_original_sequence() {
        let html = article(&["first", "second", "third", "fourth"]);
        let chunks = split_with_limit(&html, 30);
        let joined = chunks.concat();
        assert_eq!(
            joined,
            "<p>first</p><p>second</p><p>third</p><p>fourth</p>"
        );
    }

    #[test]
    fn test_greedy_packing_fills_chunks() {
        let html = article(&["aaaa", "bbbb", "cccc"]);
        // Each <p> is 11 chars; two fit under 25, the third overflows
        let chunks = split_with_limit(&html, 25);
        assert_eq!(chunks, vec!["<p>aaaa</p><p>bbbb</p>", "<p>cccc</p>"]);
    }

    #[test]
    fn test_oversized_paragraph_gets_own_chunk() {
        let big = "x".repeat(100);
        let html = article(&["small", big.as_str(), "tail"]);
        let chunks = split_with_limit(&html, 50);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].contains(&big));
    }

    #[test]
    fn test_no_paragraphs_yields_no_chunks() {
        assert!(split_with_limit("<div>no paragraphs here</div>", 100).is_empty());
    }

    #[test]
    fn test_extract_paragraph_text_joins_inner_html() {
        let html = "<p>Hello <b>world</b></p><p>Second</p>";
        assert_eq!(
            extract_paragraph_text(html),
            "Hello <b>world</b>\n\nSecond"
        );
    }

    #[test]
    fn test_paragraph_stats_counts_words() {
        let (chars, words) = paragraph_stats("<p>one two three</p><p>four</p>");
        assert_eq!(words, 4);
        assert!(chars >= "one two three\n\nfour".len());
    }

    #[test]
    fn test_chunk_prompt_mentions_only_relevant_sections() {
        let sections = vec![
            PlagiarizedSection {
                text: "present passage".into(),
                source: "https://a.example".into(),
            },
            PlagiarizedSection {
                text: "absent passage".into(),
                source: "https://b.example".into(),
            },
        ];
        let prompt = chunk_prompt("<p>a present passage here</p>", &sections, None, 0, 1);
        assert!(prompt.contains("present passage"));
        assert!(prompt.contains("https://a.example"));
        assert!(!prompt.contains("absent passage"));
        assert!(prompt.contains("- Rewrite the plagiarized sections"));
    }

    #[test]
    fn test_chunk_prompt_backlink_instructions() {
        let options = BacklinkOptions {
            website_domain: "https://myblog.example".into(),
            words_per_link: 150,
            max_links: 5,
        };
        let prompt = chunk_prompt("<p>content</p>", &[], Some(&options), 1, 3);
        assert!(prompt.contains("chunk (2/3)"));
        assert!(prompt.contains("https://myblog.example/post-sitemap.xml"));
        assert!(prompt.contains("one link per 150 words"));
        assert!(prompt.contains("Do not place links in the first paragraph"));
        // No known plagiarism: the numbered rewrite step is omitted
        assert!(!prompt.contains("1. Rewrite"));
    }
}
