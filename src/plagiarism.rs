use std::time::Duration;

use log::warn;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::error::{ChefError, Result};
use crate::model::{PlagiarismMatch, PlagiarismResult, PlagiarismStats};
use crate::pricing::{plagiarism_cost, word_count};
use crate::store::Backend;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Checks on long texts can take minutes upstream
const CHECK_TIMEOUT: Duration = Duration::from_secs(180);

/// Upstream response shape, scores in 0-100
#[derive(Debug, Deserialize)]
struct RawReport {
    score: f64,
    #[serde(default)]
    sources: Vec<RawSource>,
    #[serde(default)]
    credits_used: u64,
    #[serde(default)]
    credits_remaining: u64,
    #[serde(default, rename = "textWordCounts")]
    text_word_counts: u64,
    #[serde(default, rename = "totalPlagiarismWords")]
    total_plagiarism_words: u64,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    url: String,
    score: f64,
    #[serde(default, rename = "plagiarismFound")]
    plagiarism_found: Vec<RawSequence>,
    #[serde(default, rename = "identicalWordCounts")]
    identical_word_counts: u64,
    #[serde(default, rename = "similarWordCounts")]
    similar_word_counts: u64,
    #[serde(default, rename = "totalNumberOfWords")]
    total_number_of_words: u64,
}

#[derive(Debug, Deserialize)]
struct RawSequence {
    #[serde(default)]
    sequence: String,
}

/// Client for the similarity-detection service, reached only through the
/// local proxy so the upstream key stays server-side.
pub struct WinstonClient {
    client: Client,
    api_url: String,
    retry_delay: Duration,
}

impl WinstonClient {
    /// Create a new client from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(WinstonClient {
            client: Client::builder().timeout(CHECK_TIMEOUT).build()?,
            api_url: config.api_url.clone(),
            retry_delay: RETRY_DELAY,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_url: String) -> Self {
        WinstonClient {
            client: Client::new(),
            api_url,
            retry_delay: RETRY_DELAY,
        }
    }

    #[doc(hidden)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Check `text` for plagiarism.
    ///
    /// The token cost is computed and verified against the balance before any
    /// network call; the debit happens only after a successful check, through
    /// the store's conditional operation. A failed debit is reported as an
    /// error even though the check itself succeeded.
    pub async fn check_plagiarism(
        &self,
        store: &Backend,
        text: &str,
        excluded_urls: &[String],
    ) -> Result<PlagiarismResult> {
        if text.trim().is_empty() {
            return Err(ChefError::Validation(
                "Text is required for plagiarism check.".to_string(),
            ));
        }

        let words = word_count(text);
        let required = plagiarism_cost(words);

        let balance = store
            .token_balance()
            .await
            .map_err(|_| ChefError::Api("Failed to check token balance".to_string()))?;
        if balance < required {
            return Err(ChefError::InsufficientTokens(format!(
                "This check requires {required} tokens based on word count ({words} words)."
            )));
        }

        let mut retries = 0;
        loop {
            match self.post_check(text, excluded_urls).await {
                Ok(report) => {
                    let debited = store
                        .try_debit_tokens(required)
                        .await
                        .unwrap_or(false);
                    if !debited {
                        return Err(ChefError::Api("Failed to deduct tokens".to_string()));
                    }
                    return Ok(normalize(report));
                }
                Err(err) => {
                    match &err {
                        // Terminal: never retried
                        ChefError::Unauthorized(_)
                        | ChefError::InsufficientCredits(_)
                        | ChefError::Timeout(_)
                        | ChefError::Validation(_) => return Err(err),
                        _ => {}
                    }
                    if retries + 1 >= MAX_RETRIES {
                        return Err(err);
                    }
                    retries += 1;
                    warn!("Plagiarism check failed (attempt {retries}/{MAX_RETRIES}): {err}");
                    sleep(self.retry_delay * retries).await;
                }
            }
        }
    }

    async fn post_check(&self, text: &str, excluded_urls: &[String]) -> Result<RawReport> {
        let excluded: Vec<&str> = excluded_urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .collect();

        let response = self
            .client
            .post(format!("{}/api/plagiarism", self.api_url))
            .json(&json!({ "text": text, "excludedUrls": excluded }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChefError::Timeout(
                        "The plagiarism check is taking longer than expected. Please try with a smaller text or try again later."
                            .to_string(),
                    )
                } else {
                    ChefError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let payload: Value = response.json().await.unwrap_or_default();
            let message = payload["message"]
                .as_str()
                .unwrap_or("request failed")
                .to_string();
            return Err(match status {
                StatusCode::UNAUTHORIZED => ChefError::Unauthorized(message),
                StatusCode::PAYMENT_REQUIRED => ChefError::InsufficientCredits(message),
                StatusCode::GATEWAY_TIMEOUT => ChefError::Timeout(
                    "The plagiarism check is taking longer than expected. Please try with a smaller text or try again later."
                        .to_string(),
                ),
                StatusCode::TOO_MANY_REQUESTS => ChefError::RateLimited(message),
                _ => ChefError::Api(message),
            });
        }

        Ok(response.json().await?)
    }
}

/// Collapse the provider's 0-100 report into the internal 0-1 shape
fn normalize(report: RawReport) -> PlagiarismResult {
    PlagiarismResult {
        score: report.score / 100.0,
        matches: report
            .sources
            .into_iter()
            .map(|source| PlagiarismMatch {
                text: source
                    .plagiarism_found
                    .iter()
                    .map(|found| found.sequence.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                source: source.url,
                similarity: source.score / 100.0,
                identical_words: source.identical_word_counts,
                similar_words: source.similar_word_counts,
                total_words: source.total_number_of_words,
            })
            .collect(),
        stats: PlagiarismStats {
            credits_used: report.credits_used,
            credits_remaining: report.credits_remaining,
            word_count: report.text_word_counts,
            plagiarized_words: report.total_plagiarism_words,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn balance_mock(server: &mut Server, tokens: i64) -> mockito::Mock {
        server
            .mock("GET", "/rest/v1/users?select=tokens")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"[{{"tokens": {tokens}}}]"#))
            .create()
    }

    fn debit_mock(server: &mut Server, outcome: bool) -> mockito::Mock {
        server
            .mock("POST", "/rest/v1/rpc/deduct_user_tokens")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(outcome.to_string())
            .create()
    }

    const REPORT: &str = r#"{
        "score": 25,
        "sources": [{
            "url": "https://example.com/post",
            "score": 80,
            "plagiarismFound": [{"sequence": "lipton meatloaf"}, {"sequence": "family favorite"}],
            "identicalWordCounts": 12,
            "similarWordCounts": 4,
            "totalNumberOfWords": 60
        }],
        "credits_used": 4,
        "credits_remaining": 96,
        "textWordCounts": 1000,
        "totalPlagiarismWords": 16
    }"#;

    #[tokio::test]
    async fn test_insufficient_balance_blocks_before_network() {
        let mut server = Server::new_async().await;
        let _balance = balance_mock(&mut server, 3);
        let check = server
            .mock("POST", "/api/plagiarism")
            .expect(0)
            .create();

        let store = Backend::with_base_url(server.url(), "key".to_string());
        let text = vec!["word"; 1000].join(" ");
        let err = WinstonClient::with_base_url(server.url())
            .check_plagiarism(&store, &text, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ChefError::InsufficientTokens(_)));
        assert!(err
            .to_string()
            .contains("requires 4 tokens based on word count (1000 words)"));
        check.assert();
    }

    #[tokio::test]
    async fn test_success_normalizes_and_debits() {
        let mut server = Server::new_async().await;
        let _balance = balance_mock(&mut server, 50);
        let debit = debit_mock(&mut server, true);
        let _check = server
            .mock("POST", "/api/plagiarism")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(REPORT)
            .create();

        let store = Backend::with_base_url(server.url(), "key".to_string());
        let result = WinstonClient::with_base_url(server.url())
            .check_plagiarism(&store, "some text to check", &["".to_string()])
            .await
            .unwrap();

        assert!((result.score - 0.25).abs() < 1e-9);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].text, "lipton meatloaf family favorite");
        assert!((result.matches[0].similarity - 0.8).abs() < 1e-9);
        assert_eq!(result.matches[0].identical_words, 12);
        assert_eq!(result.stats.word_count, 1000);
        assert_eq!(result.stats.plagiarized_words, 16);
        debit.assert();
    }

    #[tokio::test]
    async fn test_failed_debit_is_reported() {
        let mut server = Server::new_async().await;
        let _balance = balance_mock(&mut server, 50);
        let _debit = debit_mock(&mut server, false);
        let _check = server
            .mock("POST", "/api/plagiarism")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(REPORT)
            .create();

        let store = Backend::with_base_url(server.url(), "key".to_string());
        let err = WinstonClient::with_base_url(server.url())
            .check_plagiarism(&store, "some text", &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to deduct tokens");
    }

    #[tokio::test]
    async fn test_generic_failures_retry_up_to_limit() {
        let mut server = Server::new_async().await;
        let _balance = balance_mock(&mut server, 50);
        let flaky = server
            .mock("POST", "/api/plagiarism")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "upstream hiccup"}"#)
            .expect(3)
            .create();

        let store = Backend::with_base_url(server.url(), "key".to_string());
        let err = WinstonClient::with_base_url(server.url())
            .with_retry_delay(Duration::from_millis(1))
            .check_plagiarism(&store, "some text", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upstream hiccup"));
        flaky.assert();
    }

    #[tokio::test]
    async fn test_authorization_failure_is_not_retried() {
        let mut server = Server::new_async().await;
        let _balance = balance_mock(&mut server, 50);
        let check = server
            .mock("POST", "/api/plagiarism")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "invalid key"}"#)
            .expect(1)
            .create();

        let store = Backend::with_base_url(server.url(), "key".to_string());
        let err = WinstonClient::with_base_url(server.url())
            .with_retry_delay(Duration::from_millis(1))
            .check_plagiarism(&store, "some text", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChefError::Unauthorized(_)));
        check.assert();
    }

    #[tokio::test]
    async fn test_gateway_timeout_maps_to_smaller_text_hint() {
        let mut server = Server::new_async().await;
        let _balance = balance_mock(&mut server, 50);
        let _check = server
            .mock("POST", "/api/plagiarism")
            .with_status(504)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "Request timeout"}"#)
            .create();

        let store = Backend::with_base_url(server.url(), "key".to_string());
        let err = WinstonClient::with_base_url(server.url())
            .check_plagiarism(&store, "some text", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChefError::Timeout(_)));
        assert!(err.to_string().contains("smaller text"));
    }
}
