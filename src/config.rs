//! # Configuration Management
//!
//! This module handles loading the survey service configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! The configuration is read once at startup and never changes afterwards. Everything
//! that depends on it (question bank, participant store, voice API client) is built
//! from it in `main` and shared read-only with the request handlers.
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Option<T>**: Settings that may legitimately be absent (like the API key in development)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Special environment variables (HOST, PORT, MESSAGEBIRD_API_KEY)
//! 2. Environment variables (APP_SERVER__PORT, APP_SURVEY__QUESTIONS_PATH, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, survey, voice platform)
/// keeps each concern small and makes the TOML file read naturally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub survey: SurveyConfig,
    pub voice: VoiceConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Survey configuration settings.
///
/// ## Fields:
/// - `title`: Title put on every call flow returned to the voice platform
/// - `questions_path`: JSON file holding the ordered list of question texts
/// - `database_path`: SQLite database file holding participants and responses
/// - `create_schema`: Create the participants/responses tables at startup if they are missing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    pub title: String,
    pub questions_path: String,
    pub database_path: String,
    pub create_schema: bool,
}

/// Voice platform API settings used to proxy recordings.
///
/// ## Fields:
/// - `api_base_url`: Base URL of the voice API (recordings live under `/calls/...`)
/// - `api_key`: Access key sent as `Authorization: AccessKey <key>`. Never exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8080,
            },
            survey: SurveyConfig {
                title: "Survey Call Step".to_string(),
                questions_path: "questions.json".to_string(),
                database_path: "survey.sqlite".to_string(),
                create_schema: true,
            },
            voice: VoiceConfig {
                api_base_url: "https://voice.messagebird.com".to_string(),
                api_key: None,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST, PORT and MESSAGEBIRD_API_KEY
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_SURVEY__QUESTIONS_PATH=/etc/survey/questions.json`: Override question file
    /// - `APP_VOICE__API_KEY=live_xxx`: Set the voice API key
    /// - `MESSAGEBIRD_API_KEY=live_xxx`: Same, using the platform's conventional name
    ///
    /// Nested keys use a double underscore because field names contain single ones.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Deployment platforms set these without our prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(api_key) = env::var("MESSAGEBIRD_API_KEY") {
            settings = settings.set_override("voice.api_key", api_key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Question file and database paths are set
    /// - The voice API base URL is an absolute http(s) URL
    ///
    /// A missing API key is allowed: the webhook works without it, only the
    /// recording pass-through endpoint refuses to run.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.survey.questions_path.trim().is_empty() {
            return Err(anyhow::anyhow!("Survey questions path must be set"));
        }

        if self.survey.database_path.trim().is_empty() {
            return Err(anyhow::anyhow!("Survey database path must be set"));
        }

        let base_url = reqwest::Url::parse(&self.voice.api_base_url)
            .map_err(|e| anyhow::anyhow!("Invalid voice API base URL '{}': {}", self.voice.api_base_url, e))?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(anyhow::anyhow!("Voice API base URL must use http or https"));
        }

        Ok(())
    }

    /// Configuration as JSON with secrets masked, safe to return from diagnostics endpoints.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "server": {
                "host": self.server.host,
                "port": self.server.port
            },
            "survey": {
                "title": self.survey.title,
                "questions_path": self.survey.questions_path,
                "database_path": self.survey.database_path,
                "create_schema": self.survey.create_schema
            },
            "voice": {
                "api_base_url": self.voice.api_base_url,
                "api_key": self.voice.api_key.as_ref().map(|_| "********")
            }
        })
    }
}

/// Tests for the configuration module.
#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.survey.questions_path, "questions.json");
        assert!(config.voice.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.survey.database_path = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.voice.api_base_url = "ftp://voice.example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let mut config = AppConfig::default();
        config.voice.api_key = Some("live_secret".to_string());

        let redacted = config.redacted().to_string();
        assert!(!redacted.contains("live_secret"));
        assert!(redacted.contains("********"));
    }
}
