// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Persisted client state: daily scan gate, streak and wellness reminders

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{MindflowError, Result};

/// A daily reminder at a fixed `HH:MM`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub time: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reminder {
    fn seeded(id: &str, title: &str, time: &str, is_active: bool, message: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            time: time.to_string(),
            is_active,
            message: Some(message.to_string()),
        }
    }
}

pub fn default_reminders() -> Vec<Reminder> {
    vec![
        Reminder::seeded("1", "Morning Check-in", "09:00", true, "How are you feeling today?"),
        Reminder::seeded("2", "Mindful Break", "12:00", true, "Take a moment to breathe deeply"),
        Reminder::seeded("3", "Afternoon Stretch", "15:00", false, "Stand up and stretch!"),
        Reminder::seeded("4", "Evening Reflection", "20:00", true, "Reflect on your day"),
    ]
}

/// Normalise a clock time to zero-padded `HH:MM`
pub fn normalize_time(raw: &str) -> Result<String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| MindflowError::invalid("time", "time must be in HH:MM format"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    #[serde(default)]
    pub last_scan: Option<NaiveDate>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default = "default_reminders")]
    pub reminders: Vec<Reminder>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            last_scan: None,
            streak: 0,
            reminders: default_reminders(),
        }
    }
}

impl ClientState {
    /// Load from a JSON file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// True until a scan has been recorded for `today`
    pub fn needs_scan(&self, today: NaiveDate) -> bool {
        self.last_scan != Some(today)
    }

    /// Record today's scan and return the updated streak
    pub fn mark_scanned(&mut self, today: NaiveDate) -> u32 {
        self.streak = match self.last_scan {
            Some(last) if last == today => self.streak.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.streak + 1,
            _ => 1,
        };
        self.last_scan = Some(today);
        self.streak
    }

    fn next_reminder_id(&self) -> String {
        let highest = self
            .reminders
            .iter()
            .filter_map(|r| r.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (highest + 1).to_string()
    }

    /// Add an active reminder; `time` must be `HH:MM`
    pub fn add_reminder(&mut self, title: &str, time: &str, message: Option<String>) -> Result<&Reminder> {
        let mut errors = Vec::new();
        let title = title.trim();
        if title.is_empty() {
            errors.push(crate::error::FieldError::new("title", "title should not be empty"));
        }
        let time = match normalize_time(time) {
            Ok(time) => Some(time),
            Err(MindflowError::Validation(mut fields)) => {
                errors.append(&mut fields);
                None
            }
            Err(e) => return Err(e),
        };
        let Some(time) = time.filter(|_| errors.is_empty()) else {
            return Err(MindflowError::Validation(errors));
        };

        let reminder = Reminder {
            id: self.next_reminder_id(),
            title: title.to_string(),
            time,
            is_active: true,
            message: message.filter(|m| !m.trim().is_empty()),
        };
        self.reminders.push(reminder);
        let index = self.reminders.len() - 1;
        Ok(&self.reminders[index])
    }

    /// Flip a reminder on or off; returns the new state
    pub fn toggle_reminder(&mut self, id: &str) -> Result<bool> {
        let reminder = self
            .reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MindflowError::NotFound(format!("Reminder {} not found", id)))?;
        reminder.is_active = !reminder.is_active;
        Ok(reminder.is_active)
    }

    pub fn remove_reminder(&mut self, id: &str) -> Result<Reminder> {
        let index = self
            .reminders
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| MindflowError::NotFound(format!("Reminder {} not found", id)))?;
        Ok(self.reminders.remove(index))
    }

    /// Active reminders scheduled for exactly `now` (`HH:MM`)
    pub fn due_reminders(&self, now: &str) -> Result<Vec<&Reminder>> {
        let now = normalize_time(now)?;
        Ok(self
            .reminders
            .iter()
            .filter(|r| r.is_active && r.time == now)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_defaults() {
        let state = ClientState::default();
        assert_eq!(state.reminders.len(), 4);
        assert!(!state.reminders[2].is_active);
        assert_eq!(state.reminders[3].time, "20:00");
        assert!(state.needs_scan(date("2024-05-10")));
    }

    #[test]
    fn test_load_missing_and_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = ClientState::load(&path).unwrap();
        assert_eq!(state, ClientState::default());

        state.mark_scanned(date("2024-05-10"));
        state.save(&path).unwrap();

        let loaded = ClientState::load(&path).unwrap();
        assert_eq!(loaded.last_scan, Some(date("2024-05-10")));
        assert_eq!(loaded.streak, 1);
    }

    #[test]
    fn test_partial_file_gets_default_reminders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"lastScan": "2024-05-09"}"#).unwrap();

        let state = ClientState::load(&path).unwrap();
        assert_eq!(state.reminders.len(), 4);
        assert!(state.needs_scan(date("2024-05-10")));
        assert!(!state.needs_scan(date("2024-05-09")));
    }

    #[test]
    fn test_scan_streak() {
        let mut state = ClientState::default();
        assert_eq!(state.mark_scanned(date("2024-05-08")), 1);
        assert_eq!(state.mark_scanned(date("2024-05-09")), 2);
        assert_eq!(state.mark_scanned(date("2024-05-09")), 2);
        assert_eq!(state.mark_scanned(date("2024-05-10")), 3);
        assert_eq!(state.mark_scanned(date("2024-05-13")), 1);
        assert!(!state.needs_scan(date("2024-05-13")));
    }

    #[test]
    fn test_reminder_lifecycle() {
        let mut state = ClientState::default();
        let added = state.add_reminder("Hydrate", "7:30", None).unwrap().clone();
        assert_eq!(added.id, "5");
        assert_eq!(added.time, "07:30");
        assert!(added.is_active);

        assert!(!state.toggle_reminder("5").unwrap());
        assert!(state.due_reminders("07:30").unwrap().is_empty());
        assert!(state.toggle_reminder("5").unwrap());
        assert_eq!(state.due_reminders("07:30").unwrap().len(), 1);

        let removed = state.remove_reminder("5").unwrap();
        assert_eq!(removed.title, "Hydrate");
        assert!(matches!(state.remove_reminder("5"), Err(MindflowError::NotFound(_))));
    }

    #[test]
    fn test_due_skips_inactive_defaults() {
        let state = ClientState::default();
        assert_eq!(state.due_reminders("09:00").unwrap()[0].title, "Morning Check-in");
        assert!(state.due_reminders("15:00").unwrap().is_empty());
        assert!(state.due_reminders("25:00").is_err());
    }

    #[test]
    fn test_add_reminder_validation() {
        let mut state = ClientState::default();
        match state.add_reminder(" ", "noon", None).unwrap_err() {
            MindflowError::Validation(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "title");
                assert_eq!(fields[1].field, "time");
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert_eq!(state.reminders.len(), 4);
    }
}
