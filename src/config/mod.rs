// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for MindFlow

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `auth.jwt_secret`
pub const ENV_JWT_SECRET: &str = "MINDFLOW_JWT_SECRET";
/// Environment variable overriding `gateway.api_key`
pub const ENV_GATEWAY_API_KEY: &str = "MINDFLOW_GATEWAY_API_KEY";

const DEV_JWT_SECRET: &str = "mindflow-dev-secret";

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub web: WebConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token signing and password hashing
    #[serde(default)]
    pub auth: AuthConfig,

    /// External AI gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// System prompts sent with each analysis type
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Local client state
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Origins allowed to call the API with credentials
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Tokens never expire unless this is set
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_gateway_model")]
    pub model: String,
    /// Without a key every facial analysis uses the local heuristic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_facial_prompt")]
    pub facial: String,
    #[serde(default = "default_journal_prompt")]
    pub journal: String,
    #[serde(default = "default_chat_prompt")]
    pub chat: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

// Default value functions
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 3001 }
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:8080".to_string(),
    ]
}
fn default_db_path() -> String { "mindflow.db".to_string() }
fn default_jwt_secret() -> String { DEV_JWT_SECRET.to_string() }
fn default_bcrypt_cost() -> u32 { bcrypt::DEFAULT_COST }
fn default_gateway_url() -> String {
    "https://ai.gateway.lovable.dev/v1/chat/completions".to_string()
}
fn default_gateway_model() -> String { "google/gemini-2.5-flash".to_string() }
fn default_timeout() -> u64 { 60 }
fn default_max_tokens() -> u32 { 500 }
fn default_state_path() -> String { "mindflow_state.json".to_string() }

fn default_facial_prompt() -> String {
    "You are an empathetic AI wellness assistant specializing in emotional analysis. \
     Analyze the facial expression in the image and determine the person's likely emotional state. \
     Respond with ONLY a JSON object in this exact format: \
     {\"mood\": \"happy\" | \"calm\" | \"tired\" | \"anxious\" | \"neutral\" | \"sad\" | \"energetic\", \
     \"confidence\": 0-100, \
     \"insight\": \"A brief, supportive observation about their emotional state\", \
     \"suggestion\": \"A helpful wellness tip based on their mood\"} \
     Be compassionate and encouraging in your insights.".to_string()
}

fn default_journal_prompt() -> String {
    "You are an empathetic AI wellness assistant. Analyze the user's journal entry and provide \
     emotional insights. Respond with ONLY a JSON object in this exact format: \
     {\"mood\": \"happy\" | \"calm\" | \"tired\" | \"anxious\" | \"neutral\" | \"sad\" | \"energetic\", \
     \"sentiment\": \"positive\" | \"neutral\" | \"negative\", \
     \"emotions\": [\"array of detected emotions\"], \
     \"insight\": \"A thoughtful observation about their feelings\", \
     \"affirmation\": \"A personalized positive affirmation\", \
     \"suggestion\": \"A wellness activity recommendation\"}".to_string()
}

fn default_chat_prompt() -> String {
    "You are MindPal, a warm and supportive AI wellness companion. You help users with \
     emotional support and validation, mindfulness and breathing exercises, cognitive \
     reframing of negative thoughts, stress management techniques, sleep hygiene tips, \
     and general wellness advice. Be empathetic, encouraging, and practical. Keep responses \
     concise but meaningful. Use gentle language and occasional emojis to feel warm and \
     approachable.".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            bcrypt_cost: default_bcrypt_cost(),
            token_ttl_secs: None,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            model: default_gateway_model(),
            api_key: None,
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            facial: default_facial_prompt(),
            journal: default_journal_prompt(),
            chat: default_chat_prompt(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

impl GatewayConfig {
    /// The gateway is only called when a non-empty key is present
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> crate::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| crate::MindflowError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay secrets from the environment; `lookup` is injectable for tests
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(ENV_JWT_SECRET).filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = secret;
        }
        if let Some(key) = lookup(ENV_GATEWAY_API_KEY).filter(|s| !s.is_empty()) {
            self.gateway.api_key = Some(key);
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(crate::MindflowError::Config("auth.jwt_secret must not be empty".to_string()));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(crate::MindflowError::Config(format!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            )));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(crate::MindflowError::Config("gateway.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}
