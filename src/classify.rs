//! AI-authorship classification collaborator.
//!
//! A classifier takes submitted text and returns a provider-defined verdict,
//! which flows into the report verbatim — this crate does not interpret it.
//! Use [`create_classifier`] to build the configured provider; `"disabled"`
//! yields no classifier at all, in which case the report simply carries no
//! detection result.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::AiConfig;

/// An external judge of whether text was machine-generated.
#[async_trait]
pub trait AuthorshipClassifier: Send + Sync {
    /// Returns the classifier name used in logs and the services listing.
    fn name(&self) -> &str;

    /// Classify the text and return the provider's verdict unmodified.
    async fn classify(&self, text: &str) -> Result<Value>;
}

/// Classifier backed by the GPTZero prediction API.
///
/// Posts `{"document": <text>}` with an `x-api-key` header and passes the
/// response JSON through untouched.
pub struct GptZeroClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
}

impl GptZeroClassifier {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    /// Create the classifier with the key taken from `GPTZERO_API_KEY`.
    pub fn from_env(config: &AiConfig) -> Result<Self> {
        let api_key = std::env::var("GPTZERO_API_KEY")
            .map_err(|_| anyhow::anyhow!("GPTZERO_API_KEY environment variable not set"))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl AuthorshipClassifier for GptZeroClassifier {
    fn name(&self) -> &str {
        "gptzero"
    }

    async fn classify(&self, text: &str) -> Result<Value> {
        let body = serde_json::json!({ "document": text });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Classifier API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Classifier API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Classification failed after retries")))
    }
}

/// Create the configured classifier, or `None` when detection is disabled.
///
/// # Errors
///
/// Returns an error for unknown provider names or when the configured
/// provider's credential is missing from the environment.
pub fn create_classifier(config: &AiConfig) -> Result<Option<Box<dyn AuthorshipClassifier>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "gptzero" => Ok(Some(Box::new(GptZeroClassifier::from_env(config)?))),
        other => bail!("Unknown ai provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_provider_yields_no_classifier() {
        let config = AiConfig::default();
        assert!(create_classifier(&config).unwrap().is_none());
    }

    #[test]
    fn unknown_provider_is_error() {
        let config = AiConfig {
            provider: "oracle".to_string(),
            ..AiConfig::default()
        };
        assert!(create_classifier(&config).is_err());
    }
}
