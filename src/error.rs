// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for MindFlow

use serde::Serialize;
use thiserror::Error;

/// Result type alias for MindFlow operations
pub type Result<T> = std::result::Result<T, MindflowError>;

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// MindFlow error types
#[derive(Error, Debug)]
pub enum MindflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,

    #[error("AI credits exhausted. Please add funds.")]
    CreditsExhausted,

    #[error("AI gateway not available: {0}")]
    GatewayUnavailable(String),

    #[error("AI analysis failed: {0}")]
    Analysis(String),
}

impl MindflowError {
    /// Shorthand for a validation failure on one field
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// True for upstream quota conditions, which never fall back to the heuristic
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::RateLimited | Self::CreditsExhausted)
    }
}
