use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::{SpeechRequest, SynthesisError, SynthesisGateway};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Voices offered on the settings page.
pub const VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Scheme and host, without the `/v1` path.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
}

pub struct OpenAiGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiConfig) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SynthesisError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: speech_endpoint(&config.base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SynthesisGateway for OpenAiGateway {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError> {
        log::debug!(
            "POST {} (model: {}, voice: {}, {} chars)",
            self.endpoint,
            request.model,
            request.voice,
            request.text.chars().count()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&request.api_key)
            .json(&SpeechBody {
                model: &request.model,
                input: &request.text,
                voice: &request.voice,
            })
            .send()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = status_error(status, body);
            log::error!("Speech request failed: {error}");
            return Err(error);
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;
        log::info!("Received {} bytes of audio", audio.len());
        Ok(audio.to_vec())
    }
}

fn speech_endpoint(base_url: &str) -> String {
    format!("{}/v1/audio/speech", base_url.trim_end_matches('/'))
}

fn status_error(status: u16, body: String) -> SynthesisError {
    match status {
        401 | 403 => SynthesisError::Auth { status, body },
        _ => SynthesisError::Service { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_ignores_trailing_slash() {
        assert_eq!(
            speech_endpoint("https://api.openai.com/"),
            "https://api.openai.com/v1/audio/speech"
        );
        assert_eq!(
            speech_endpoint("http://localhost:8080"),
            "http://localhost:8080/v1/audio/speech"
        );
    }

    #[test]
    fn auth_statuses_are_distinguished() {
        assert!(matches!(
            status_error(401, "bad key".into()),
            SynthesisError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            status_error(429, "slow down".into()),
            SynthesisError::Service { status: 429, .. }
        ));
    }

    #[test]
    fn error_message_carries_status_and_body() {
        let error = status_error(500, r#"{"error":"boom"}"#.into());
        assert_eq!(
            error.to_string(),
            r#"HTTP error! status: 500, message: {"error":"boom"}"#
        );
    }

    #[test]
    fn request_body_uses_service_field_names() {
        let body = serde_json::to_value(SpeechBody {
            model: "tts-1",
            input: "hi",
            voice: "nova",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"model": "tts-1", "input": "hi", "voice": "nova"})
        );
    }

    #[test]
    fn builds_with_default_config() {
        let gateway = OpenAiGateway::new(OpenAiConfig::default()).unwrap();
        assert_eq!(gateway.endpoint(), "https://api.openai.com/v1/audio/speech");
    }
}
