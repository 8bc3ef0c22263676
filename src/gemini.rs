//! Gemini client configuration.
//!
//! Gemini exposes an OpenAI-compatible surface for chat, vision and
//! embeddings, so the clients here are plain `async-openai` clients pointed
//! at Google's endpoint and authenticated with `GOOGLE_API_KEY`.

use crate::config::GeminiSettings;
use crate::error::{FinragError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Environment variable holding the Google AI Studio key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Client type shared by the OCR, embedding and agent components.
pub type GeminiClient = Client<OpenAIConfig>;

/// Read the API key, failing if it is missing or empty.
pub fn require_api_key() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        Ok(_) => Err(FinragError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            API_KEY_ENV, API_KEY_ENV
        ))),
        Err(_) => Err(FinragError::Config(format!(
            "{} environment variable not set.",
            API_KEY_ENV
        ))),
    }
}

/// Create a Gemini client from settings.
///
/// The key is read from the environment at construction time; a missing key
/// surfaces as a `Config` error rather than a failed request later on.
pub fn create_client(settings: &GeminiSettings) -> Result<GeminiClient> {
    let api_key = require_api_key()?;
    create_client_with_key(settings, &api_key)
}

/// Create a Gemini client with an explicit key.
pub fn create_client_with_key(settings: &GeminiSettings, api_key: &str) -> Result<GeminiClient> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_seconds))
        .build()?;

    let config = OpenAIConfig::new()
        .with_api_base(settings.api_base.trim_end_matches('/'))
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_with_explicit_key() {
        let settings = GeminiSettings::default();
        assert!(create_client_with_key(&settings, "test-key").is_ok());
    }
}
