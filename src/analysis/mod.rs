// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Mood analysis of faces, journal entries and chat messages

pub mod heuristic;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

use crate::error::FieldError;
use crate::mood::Mood;
use crate::{MindflowError, Result};

/// What the caller wants analysed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Facial,
    Journal,
    Chat,
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisType::Facial => "facial",
            AnalysisType::Journal => "journal",
            AnalysisType::Chat => "chat",
        };
        f.write_str(s)
    }
}

/// A validated analysis request
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub kind: AnalysisType,
    /// Base64 frame without any `data:` prefix (facial only)
    pub image_base64: Option<String>,
    /// Journal text or chat message
    pub user_input: Option<String>,
}

impl AnalysisRequest {
    pub fn facial(image_base64: impl Into<String>) -> Self {
        let raw: String = image_base64.into();
        Self {
            kind: AnalysisType::Facial,
            image_base64: Some(strip_data_url(&raw).to_string()),
            user_input: None,
        }
    }

    pub fn text(kind: AnalysisType, input: impl Into<String>) -> Self {
        Self {
            kind,
            image_base64: None,
            user_input: Some(input.into()),
        }
    }

    /// Build from loosely-typed request fields, checking the right input is present
    pub fn from_parts(
        kind: Option<&str>,
        image_base64: Option<String>,
        user_input: Option<String>,
    ) -> Result<Self> {
        let kind = match kind.map(str::trim) {
            Some("facial") => AnalysisType::Facial,
            Some("journal") => AnalysisType::Journal,
            Some("chat") => AnalysisType::Chat,
            Some(_) => {
                return Err(MindflowError::invalid(
                    "analysisType",
                    "analysisType must be one of: facial, journal, chat",
                ))
            }
            None => return Err(MindflowError::invalid("analysisType", "analysisType should not be empty")),
        };

        match kind {
            AnalysisType::Facial => match image_base64.filter(|s| !s.trim().is_empty()) {
                Some(image) => Ok(Self::facial(image)),
                None => Err(MindflowError::invalid(
                    "imageBase64",
                    "imageBase64 is required for facial analysis",
                )),
            },
            _ => match user_input.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
                Some(text) => Ok(Self::text(kind, text)),
                None => Err(MindflowError::Validation(vec![FieldError::new(
                    "userInput",
                    format!("userInput is required for {} analysis", kind),
                )])),
            },
        }
    }

    /// Raw bytes of the frame
    pub fn decode_image(&self) -> Result<Vec<u8>> {
        let encoded = self
            .image_base64
            .as_deref()
            .ok_or_else(|| MindflowError::invalid("imageBase64", "imageBase64 is required for facial analysis"))?;
        general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| MindflowError::invalid("imageBase64", format!("imageBase64 is not valid base64: {}", e)))
    }
}

/// Drop a `data:image/...;base64,` prefix if the client sent a data URL
pub fn strip_data_url(raw: &str) -> &str {
    match raw.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    }
}

/// Where a facial reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    Gateway,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialReading {
    pub mood: Mood,
    /// 0-100
    pub confidence: f64,
    pub insight: String,
    pub suggestion: String,
    pub source: ReadingSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalReading {
    pub mood: Mood,
    pub sentiment: Sentiment,
    pub emotions: Vec<String>,
    pub insight: String,
    pub affirmation: String,
    pub suggestion: String,
}

/// Result of one analysis; the JSON shape depends on the analysis type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Analysis {
    Facial(FacialReading),
    Journal(JournalReading),
    /// Free text, for chat or when no JSON could be found in the reply
    Reply { response: String },
    /// JSON object that did not match the expected shape, passed through as-is
    Raw(Map<String, Value>),
}

impl Analysis {
    /// Mood carried by the result, if any
    pub fn mood(&self) -> Option<Mood> {
        match self {
            Analysis::Facial(r) => Some(r.mood),
            Analysis::Journal(r) => Some(r.mood),
            Analysis::Reply { .. } | Analysis::Raw(_) => None,
        }
    }

    /// Short text worth keeping as a mood entry note
    pub fn insight(&self) -> Option<&str> {
        match self {
            Analysis::Facial(r) => Some(r.insight.as_str()),
            Analysis::Journal(r) => Some(r.insight.as_str()),
            _ => None,
        }
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string()
}

fn mood_field(obj: &Map<String, Value>) -> Option<Mood> {
    obj.get("mood")?.as_str()?.parse().ok()
}

impl FacialReading {
    /// Read a gateway JSON object; `None` when the mood is missing or unknown
    pub fn from_json(obj: &Map<String, Value>) -> Option<Self> {
        let mood = mood_field(obj)?;
        let confidence = match obj.get("confidence") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim_end_matches('%').trim().parse().unwrap_or_default(),
            _ => 0.0,
        };
        Some(Self {
            mood,
            confidence: confidence.clamp(0.0, 100.0),
            insight: str_field(obj, "insight"),
            suggestion: str_field(obj, "suggestion"),
            source: ReadingSource::Gateway,
        })
    }
}

impl JournalReading {
    pub fn from_json(obj: &Map<String, Value>) -> Option<Self> {
        let mood = mood_field(obj)?;
        let sentiment = match str_field(obj, "sentiment").to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        };
        let emotions = obj
            .get("emotions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            mood,
            sentiment,
            emotions,
            insight: str_field(obj, "insight"),
            affirmation: str_field(obj, "affirmation"),
            suggestion: str_field(obj, "suggestion"),
        })
    }
}

/// Take everything from the first `{` to the last `}` and parse it as an object.
/// Models often wrap their JSON in prose or markdown fences.
pub fn extract_json(content: &str) -> Option<Map<String, Value>> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&content[start..=end]) {
        Ok(Value::Object(obj)) => Some(obj),
        Ok(_) => None,
        Err(e) => {
            warn!("Reply looked like JSON but did not parse: {}", e);
            None
        }
    }
}

/// Interpret a model reply for the given analysis type
pub fn parse_reply(kind: AnalysisType, content: &str) -> Analysis {
    let reply = || Analysis::Reply { response: content.trim().to_string() };

    match kind {
        AnalysisType::Chat => match extract_json(content) {
            Some(obj) => Analysis::Raw(obj),
            None => reply(),
        },
        AnalysisType::Facial => match extract_json(content) {
            Some(obj) => FacialReading::from_json(&obj).map(Analysis::Facial).unwrap_or(Analysis::Raw(obj)),
            None => reply(),
        },
        AnalysisType::Journal => match extract_json(content) {
            Some(obj) => JournalReading::from_json(&obj).map(Analysis::Journal).unwrap_or(Analysis::Raw(obj)),
            None => reply(),
        },
    }
}

/// Something that can turn an analysis request into a result
#[async_trait]
pub trait MoodSource: Send + Sync {
    /// Name of this source
    fn name(&self) -> &'static str;

    /// Analysis types this source handles
    fn can_handle(&self, kind: AnalysisType) -> bool;

    /// Run the analysis
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis>;

    /// Priority (higher = tried first)
    fn priority(&self) -> u8 {
        50
    }
}

/// Ordered chain of mood sources.
///
/// Sources are tried from highest priority down. A failure moves on to the
/// next source, except for validation errors and upstream quota errors, which
/// are returned straight away.
pub struct Analyzer {
    sources: Vec<Box<dyn MoodSource>>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Register a new source
    pub fn register(&mut self, source: Box<dyn MoodSource>) {
        self.sources.push(source);
        self.sources.sort_by_key(|s| std::cmp::Reverse(s.priority()));
    }

    /// Get source names in the order they are tried
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis> {
        let mut last_error = None;

        for source in self.sources.iter().filter(|s| s.can_handle(request.kind)) {
            match source.analyze(request).await {
                Ok(analysis) => return Ok(analysis),
                Err(e) if e.is_quota() || matches!(e, MindflowError::Validation(_)) => return Err(e),
                Err(e) => {
                    warn!("{} analysis via {} failed: {}, trying next source", request.kind, source.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            MindflowError::GatewayUnavailable(format!("no analyzer available for {} analysis", request.kind))
        }))
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
