//! # Voice Platform API Client
//!
//! Fetches call recordings from the voice platform so the survey report can play them
//! back. The platform wants an access key on every request; the key lives only in the
//! server configuration and is never handed to the browser.

use crate::config::VoiceConfig;
use crate::error::{AppError, AppResult};
use reqwest::{Client, Url};
use tracing::debug;

/// Authenticated client for the voice platform's recordings API.
#[derive(Debug, Clone)]
pub struct VoiceApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl VoiceApiClient {
    pub fn new(config: &VoiceConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid voice API base URL '{}': {}", config.api_base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(format!(
                "Voice API base URL '{}' cannot carry a path",
                config.api_base_url
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("phone-survey/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// `{base}/calls/{call_id}/legs/{leg_id}/recordings/{recording_id}.wav`, with
    /// every segment percent-encoded.
    pub fn recording_url(&self, call_id: &str, leg_id: &str, recording_id: &str) -> Url {
        let mut url = self.base_url.clone();
        let file = format!("{}.wav", recording_id);

        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["calls", call_id, "legs", leg_id, "recordings", file.as_str()]);
        }

        url
    }

    /// Start fetching a recording. The response is returned whatever its status,
    /// so callers can forward upstream errors as they are.
    pub async fn fetch_recording(
        &self,
        call_id: &str,
        leg_id: &str,
        recording_id: &str,
    ) -> AppResult<reqwest::Response> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ConfigError("Voice API key is not configured".to_string())
        })?;

        let url = self.recording_url(call_id, leg_id, recording_id);
        debug!(url = %url, "Fetching recording");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("AccessKey {}", api_key))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Voice API request failed: {}", e)))?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str, key: Option<&str>) -> VoiceApiClient {
        VoiceApiClient::new(&VoiceConfig {
            api_base_url: base.to_string(),
            api_key: key.map(str::to_string),
        })
        .unwrap()
    }

    #[test]
    fn test_recording_url() {
        let api = client("https://voice.messagebird.com", Some("key"));
        assert_eq!(
            api.recording_url("c1", "l1", "r1").as_str(),
            "https://voice.messagebird.com/calls/c1/legs/l1/recordings/r1.wav"
        );

        // Base path and trailing slash are kept
        let api = client("http://localhost:9000/v1/", Some("key"));
        assert_eq!(
            api.recording_url("c1", "l1", "r1").as_str(),
            "http://localhost:9000/v1/calls/c1/legs/l1/recordings/r1.wav"
        );
    }

    #[test]
    fn test_recording_url_encodes_segments() {
        let api = client("https://voice.example.com", None);
        let url = api.recording_url("../admin", "a b", "r?x");
        assert_eq!(
            url.as_str(),
            "https://voice.example.com/calls/..%2Fadmin/legs/a%20b/recordings/r%3Fx.wav"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let result = VoiceApiClient::new(&VoiceConfig {
            api_base_url: "not a url".to_string(),
            api_key: None,
        });
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_fetch_without_key_fails() {
        let api = client("https://voice.example.com", None);
        let result = api.fetch_recording("c", "l", "r").await;
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
