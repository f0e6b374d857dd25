// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The closed set of mood labels shared by entries, events and analysis

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user's self-reported or estimated emotional state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Calm,
    Tired,
    Anxious,
    Neutral,
    Sad,
    Energetic,
}

impl Mood {
    /// Every label, in the order reports list them
    pub const ALL: [Mood; 7] = [
        Mood::Happy,
        Mood::Calm,
        Mood::Tired,
        Mood::Anxious,
        Mood::Neutral,
        Mood::Sad,
        Mood::Energetic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Calm => "calm",
            Mood::Tired => "tired",
            Mood::Anxious => "anxious",
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
            Mood::Energetic => "energetic",
        }
    }

    /// Display tag attached to calendar events predicted to carry this mood
    pub fn event_tag(self) -> &'static str {
        match self {
            Mood::Happy => "Energizing Activity",
            Mood::Calm => "Peaceful Time",
            Mood::Neutral => "Neutral & Productive",
            Mood::Tired => "Low Energy Task",
            Mood::Anxious => "Energy Dip Likely",
            Mood::Sad => "Need Support",
            Mood::Energetic => "High Energy",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Mood::Happy => "😊",
            Mood::Calm => "😌",
            Mood::Tired => "😴",
            Mood::Anxious => "😰",
            Mood::Neutral => "😐",
            Mood::Sad => "😢",
            Mood::Energetic => "⚡",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the seven labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMood(pub String);

impl fmt::Display for UnknownMood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mood '{}'", self.0)
    }
}

impl std::error::Error for UnknownMood {}

impl FromStr for Mood {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| UnknownMood(s.to_string()))
    }
}

/// Comma-separated list of valid labels, for validation messages
pub fn allowed_labels() -> String {
    Mood::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
}
