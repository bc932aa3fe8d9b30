//! Text completion: single-shot prompt → text over HTTP.
//!
//! Providers:
//!   gemini     POST {base}/v1beta/models/{model}:generateContent  (x-goog-api-key)
//!   anthropic  POST {base}/v1/messages                            (x-api-key)
//!   openai     POST {base}/chat/completions                       (Bearer)
//!
//! `EchoCompleter` returns the prompt unchanged; it backs offline runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CompletionError;

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// `provider/model`, for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, CompletionError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" | "openai-compatible" => Ok(Provider::OpenAi),
            _ => Err(CompletionError::UnknownProvider(name.to_string())),
        }
    }

    /// Environment variable that conventionally holds the key.
    pub fn key_env(&self) -> &'static str {
        match self {
            Provider::Gemini => "GOOGLE_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }
}

/// Completion settings as loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Calls a hosted model over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCompleter {
    client: reqwest::Client,
    provider: Provider,
    model: String,
    api_key: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
}

impl HttpCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let provider = Provider::parse(&config.provider)?;
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CompletionError::MissingCredential {
                provider: config.provider.clone(),
                hint: provider.key_env().to_string(),
            })?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            provider,
            model: config.model.clone(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request(&self, prompt: &str) -> reqwest::RequestBuilder {
        match self.provider {
            Provider::Gemini => self
                .client
                .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model))
                .header("x-goog-api-key", &self.api_key)
                .json(&json!({
                    "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                    "generationConfig": {
                        "temperature": self.temperature,
                        "maxOutputTokens": self.max_tokens,
                    },
                })),
            Provider::Anthropic => self
                .client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&json!({
                    "model": self.model,
                    "max_tokens": self.max_tokens,
                    "temperature": self.temperature,
                    "messages": [{ "role": "user", "content": prompt }],
                })),
            Provider::OpenAi => self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "temperature": self.temperature,
                    "max_tokens": self.max_tokens,
                    "messages": [{ "role": "user", "content": prompt }],
                })),
        }
    }
}

#[async_trait]
impl TextCompleter for HttpCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        tracing::info!(
            "[Completion] Calling {} (prompt: {} chars)",
            self.describe(),
            prompt.len()
        );

        let response = self.request(prompt).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| CompletionError::Decode(format!("invalid JSON: {}", e)))?;
        let text = extract_text(self.provider, &json)?;
        tracing::debug!("[Completion] {} returned {} chars", self.describe(), text.len());
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("{:?}/{}", self.provider, self.model).to_lowercase()
    }
}

/// Pull the generated text out of a provider's response body.
fn extract_text(provider: Provider, json: &Value) -> Result<String, CompletionError> {
    let joined = |parts: Option<&Vec<Value>>, kind: Option<&str>| -> Option<String> {
        let texts: Vec<&str> = parts?
            .iter()
            .filter(|p| kind.is_none() || p.get("type").and_then(Value::as_str) == kind)
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        (!texts.is_empty()).then(|| texts.join(""))
    };

    let text = match provider {
        Provider::Gemini => joined(
            json.pointer("/candidates/0/content/parts").and_then(Value::as_array),
            None,
        ),
        Provider::Anthropic => joined(json.get("content").and_then(Value::as_array), Some("text")),
        Provider::OpenAi => json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    text.ok_or_else(|| CompletionError::Decode(format!("no text in {:?} response", provider)))
}

/// Returns the prompt verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoCompleter;

#[async_trait]
impl TextCompleter for EchoCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        Ok(prompt.to_string())
    }

    fn describe(&self) -> String {
        "echo".to_string()
    }
}
