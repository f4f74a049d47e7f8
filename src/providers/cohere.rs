use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::QaError;
use crate::providers::traits::AnswerProvider;

const GENERATE_URL: &str = "https://api.cohere.ai/v1/generate";
const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;
const MAX_ATTEMPTS: usize = 3;
const RETRY_DELAY_MS: u64 = 500;

/// Cohere `generate` client. Fixed sampling parameters, single completion.
#[derive(Clone)]
pub struct CohereProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl CohereProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: Client::new(),
        }
    }

    /// Send the request, retrying connect/timeout failures with a short
    /// backoff. HTTP-level errors are not retried.
    async fn send_with_retry(&self, body: &Value) -> Result<reqwest::Response, QaError> {
        let mut attempt = 1;
        loop {
            let result = self
                .client
                .post(GENERATE_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                    log::warn!(
                        "Cohere request attempt {}/{} failed: {}",
                        attempt,
                        MAX_ATTEMPTS,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64))
                        .await;
                    attempt += 1;
                }
                Err(e) => return Err(QaError::Generation(format!("Request failed: {}", e))),
            }
        }
    }
}

#[async_trait]
impl AnswerProvider for CohereProvider {
    async fn generate(&self, prompt: &str) -> Result<String, QaError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "k": 0,
            "stop_sequences": [],
            "return_likelihoods": "NONE"
        });

        let response = self.send_with_retry(&body).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(QaError::Generation(format!(
                "API request failed: Status {}, Body: {}",
                status, error_text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| QaError::Generation(format!("Invalid response body: {}", e)))?;

        response_json
            .get("generations")
            .and_then(|generations| generations.get(0))
            .and_then(|generation| generation.get("text"))
            .and_then(|text| text.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                let debug_json = serde_json::to_string_pretty(&response_json).unwrap_or_default();
                QaError::Generation(format!("Invalid response format: {}", debug_json))
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
