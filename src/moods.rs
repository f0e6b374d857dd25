// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Mood entries: creation, listing and the weekly report

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::{Database, MoodEntry};
use crate::error::FieldError;
use crate::mood::{allowed_labels, Mood};
use crate::{MindflowError, Result};

pub const DEFAULT_STATS_DAYS: u32 = 7;
const MAX_STATS_DAYS: u32 = 365;

/// Stored timestamps are fixed-width four-digit-year RFC 3339 text
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMoodRequest {
    pub mood: Option<String>,
    pub note: Option<String>,
    /// ISO 8601; defaults to now
    pub timestamp: Option<String>,
}

/// Per-mood count in a report window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodCount {
    pub mood: Mood,
    pub count: usize,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodStats {
    pub days: u32,
    pub total: usize,
    /// Only moods that occurred, most frequent first
    pub distribution: Vec<MoodCount>,
    pub dominant: Option<Mood>,
    /// Consecutive days with at least one entry, ending today or yesterday
    pub current_streak: u32,
    pub recorded_today: bool,
}

/// Accept full RFC 3339, a naive date-time (read as UTC) or a bare date
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl CreateMoodRequest {
    fn validate(self) -> Result<(Mood, Option<String>, Option<DateTime<Utc>>)> {
        let mut errors = Vec::new();

        let mood = match self.mood.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(FieldError::new("mood", "mood should not be empty"));
                None
            }
            Some(raw) => match raw.parse::<Mood>() {
                Ok(mood) => Some(mood),
                Err(_) => {
                    errors.push(FieldError::new(
                        "mood",
                        format!("mood must be one of the following values: {}", allowed_labels()),
                    ));
                    None
                }
            },
        };

        let timestamp = match self.timestamp.as_deref() {
            None => None,
            Some(raw) => match parse_timestamp(raw) {
                Some(ts) if (MIN_YEAR..=MAX_YEAR).contains(&ts.year()) => Some(ts),
                Some(_) => {
                    errors.push(FieldError::new(
                        "timestamp",
                        format!("timestamp year must be between {} and {}", MIN_YEAR, MAX_YEAR),
                    ));
                    None
                }
                None => {
                    errors.push(FieldError::new("timestamp", "timestamp must be a valid ISO 8601 date string"));
                    None
                }
            },
        };

        let note = self.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        match mood {
            Some(mood) if errors.is_empty() => Ok((mood, note, timestamp)),
            _ => Err(MindflowError::Validation(errors)),
        }
    }
}

/// Validate and store an entry for `user_id`
pub fn create(db: &Database, request: CreateMoodRequest, user_id: &str) -> Result<MoodEntry> {
    let (mood, note, timestamp) = request.validate()?;
    db.insert_mood(user_id, mood, note.as_deref(), timestamp.unwrap_or_else(Utc::now))
}

/// Every entry the user owns, newest first
pub fn find_all(db: &Database, user_id: &str) -> Result<Vec<MoodEntry>> {
    db.moods_for_user(user_id)
}

/// Length of the run of consecutive days ending today or yesterday.
/// `days` must be distinct and sorted most recent first.
pub fn current_streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let Some(&latest) = days.first() else {
        return 0;
    };
    if latest != today && Some(latest) != today.pred_opt() {
        return 0;
    }

    let mut streak = 1;
    for pair in days.windows(2) {
        if pair[0].pred_opt() == Some(pair[1]) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Mood report over the last `days` days (clamped to 1..=365).
/// Entries dated after `now` are left out.
pub fn stats(db: &Database, user_id: &str, days: Option<u32>, now: DateTime<Utc>) -> Result<MoodStats> {
    let days = days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS);
    let entries = db.moods_between(user_id, now - Duration::days(i64::from(days)), now)?;

    let mut counts: HashMap<Mood, usize> = HashMap::new();
    for entry in &entries {
        *counts.entry(entry.mood).or_insert(0) += 1;
    }

    let mut distribution: Vec<MoodCount> = Mood::ALL
        .iter()
        .filter_map(|&mood| {
            counts.get(&mood).map(|&count| MoodCount {
                mood,
                count,
                emoji: mood.emoji().to_string(),
            })
        })
        .collect();
    // Stable sort keeps the canonical label order among ties
    distribution.sort_by(|a, b| b.count.cmp(&a.count));

    let mood_days = db.mood_days(user_id, now)?;
    let today = now.date_naive();

    Ok(MoodStats {
        days,
        total: entries.len(),
        dominant: distribution.first().map(|c| c.mood),
        distribution,
        current_streak: current_streak(&mood_days, today),
        recorded_today: mood_days.contains(&today),
    })
}
