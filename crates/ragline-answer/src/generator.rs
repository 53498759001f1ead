use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use ragline_core::error::Error;
use ragline_core::traits::AnswerModel;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Non-streaming client for Ollama's `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string() })
    }
}

impl AnswerModel for OllamaGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest { model: &self.model, prompt, stream: false };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| Error::Operation(format!("Failed to send request to {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Operation(format!("HTTP {}: {}", status, body)).into());
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| Error::Operation(format!("Failed to parse generate response: {}", e)))?;
        debug!(model = %self.model, chars = parsed.response.len(), "generated answer");
        Ok(parsed.response.trim().to_string())
    }
}
