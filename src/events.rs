// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Calendar events annotated with a predicted mood

use serde::Deserialize;

use crate::db::{CalendarEvent, Database};
use crate::error::FieldError;
use crate::mood::{allowed_labels, Mood};
use crate::{MindflowError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub time: Option<String>,
    pub predicted_mood: Option<String>,
    /// Derived from the predicted mood when absent
    pub tag: Option<String>,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub time: Option<String>,
    pub predicted_mood: Option<String>,
    pub tag: Option<String>,
}

fn required_text(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) -> Option<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.push(FieldError::new(field, format!("{} should not be empty", field)));
            None
        }
    }
}

/// Like `required_text`, but only checked when the field was sent
fn optional_text(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) -> Option<String> {
    value.and_then(|v| required_text(field, Some(v), errors))
}

fn mood_value(raw: &str, errors: &mut Vec<FieldError>) -> Option<Mood> {
    match raw.parse() {
        Ok(mood) => Some(mood),
        Err(_) => {
            errors.push(FieldError::new(
                "predictedMood",
                format!("predictedMood must be one of the following values: {}", allowed_labels()),
            ));
            None
        }
    }
}

fn non_blank(tag: Option<String>) -> Option<String> {
    tag.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Validate and store an event for `user_id`
pub fn create(db: &Database, request: CreateEventRequest, user_id: &str) -> Result<CalendarEvent> {
    let mut errors = Vec::new();
    let title = required_text("title", request.title.as_deref(), &mut errors);
    let time = required_text("time", request.time.as_deref(), &mut errors);
    let mood = required_text("predictedMood", request.predicted_mood.as_deref(), &mut errors)
        .and_then(|raw| mood_value(&raw, &mut errors));

    let (Some(title), Some(time), Some(mood), true) = (title, time, mood, errors.is_empty()) else {
        return Err(MindflowError::Validation(errors));
    };

    let tag = non_blank(request.tag).unwrap_or_else(|| mood.event_tag().to_string());
    db.insert_event(user_id, &title, &time, mood, &tag)
}

/// Every event the user owns, in the order they were added
pub fn find_all(db: &Database, user_id: &str) -> Result<Vec<CalendarEvent>> {
    db.events_for_user(user_id)
}

/// Apply a partial update to an owned event.
///
/// Changing the predicted mood without sending a tag re-derives the tag.
pub fn update(db: &Database, id: &str, request: UpdateEventRequest, user_id: &str) -> Result<CalendarEvent> {
    let mut errors = Vec::new();
    let title = optional_text("title", request.title.as_deref(), &mut errors);
    let time = optional_text("time", request.time.as_deref(), &mut errors);
    let mood = optional_text("predictedMood", request.predicted_mood.as_deref(), &mut errors)
        .and_then(|raw| mood_value(&raw, &mut errors));
    if !errors.is_empty() {
        return Err(MindflowError::Validation(errors));
    }

    let mut event = db
        .find_event(id, user_id)?
        .ok_or_else(|| MindflowError::NotFound(format!("Event {} not found", id)))?;

    if let Some(title) = title {
        event.title = title;
    }
    if let Some(time) = time {
        event.time = time;
    }
    let mood_changed = mood.is_some_and(|m| m != event.predicted_mood);
    if let Some(mood) = mood {
        event.predicted_mood = mood;
    }
    match non_blank(request.tag) {
        Some(tag) => event.tag = tag,
        None if mood_changed => event.tag = event.predicted_mood.event_tag().to_string(),
        None => {}
    }

    if !db.update_event(&event)? {
        return Err(MindflowError::NotFound(format!("Event {} not found", id)));
    }
    Ok(event)
}

/// Remove an owned event
pub fn delete(db: &Database, id: &str, user_id: &str) -> Result<()> {
    if db.delete_event(id, user_id)? {
        Ok(())
    } else {
        Err(MindflowError::NotFound(format!("Event {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, String, String) {
        let db = Database::in_memory().unwrap();
        let alice = db.insert_user("alice@example.com", "hash", "Alice").unwrap();
        let bob = db.insert_user("bob@example.com", "hash", "Bob").unwrap();
        (db, alice.id, bob.id)
    }

    fn request(title: &str, time: &str, mood: &str) -> CreateEventRequest {
        CreateEventRequest {
            title: Some(title.to_string()),
            time: Some(time.to_string()),
            predicted_mood: Some(mood.to_string()),
            tag: None,
        }
    }

    #[test]
    fn test_create_derives_tag() {
        let (db, alice, _) = setup();
        let event = create(&db, request("Exam", "14:00", "anxious"), &alice).unwrap();
        assert_eq!(event.tag, "Energy Dip Likely");
        assert_eq!(event.predicted_mood, Mood::Anxious);
    }

    #[test]
    fn test_create_keeps_supplied_tag() {
        let (db, alice, _) = setup();
        let mut req = request("Yoga", "07:00", "calm");
        req.tag = Some("Morning ritual".to_string());
        let event = create(&db, req, &alice).unwrap();
        assert_eq!(event.tag, "Morning ritual");
    }

    #[test]
    fn test_create_validation() {
        let (db, alice, _) = setup();
        match create(&db, request(" ", "", "bored"), &alice).unwrap_err() {
            MindflowError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["title", "time", "predictedMood"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert!(find_all(&db, &alice).unwrap().is_empty());
    }

    #[test]
    fn test_events_scoped_to_owner() {
        let (db, alice, bob) = setup();
        create(&db, request("Dinner", "19:00", "happy"), &alice).unwrap();
        assert_eq!(find_all(&db, &alice).unwrap().len(), 1);
        assert!(find_all(&db, &bob).unwrap().is_empty());
    }

    #[test]
    fn test_update_rederives_tag_on_mood_change() {
        let (db, alice, _) = setup();
        let event = create(&db, request("Review", "10:00", "neutral"), &alice).unwrap();

        let updated = update(
            &db,
            &event.id,
            UpdateEventRequest {
                predicted_mood: Some("tired".to_string()),
                ..Default::default()
            },
            &alice,
        )
        .unwrap();
        assert_eq!(updated.predicted_mood, Mood::Tired);
        assert_eq!(updated.tag, "Low Energy Task");
        assert_eq!(updated.title, "Review");

        let renamed = update(
            &db,
            &event.id,
            UpdateEventRequest {
                title: Some("Code review".to_string()),
                ..Default::default()
            },
            &alice,
        )
        .unwrap();
        assert_eq!(renamed.tag, "Low Energy Task");
        assert_eq!(find_all(&db, &alice).unwrap()[0].title, "Code review");
    }

    #[test]
    fn test_update_and_delete_by_other_user_not_found() {
        let (db, alice, bob) = setup();
        let event = create(&db, request("Dinner", "19:00", "happy"), &alice).unwrap();

        let err = update(&db, &event.id, UpdateEventRequest::default(), &bob).unwrap_err();
        assert!(matches!(err, MindflowError::NotFound(_)));
        assert!(matches!(delete(&db, &event.id, &bob), Err(MindflowError::NotFound(_))));

        delete(&db, &event.id, &alice).unwrap();
        assert!(matches!(delete(&db, &event.id, &alice), Err(MindflowError::NotFound(_))));
    }

    #[test]
    fn test_update_rejects_blank_title() {
        let (db, alice, _) = setup();
        let event = create(&db, request("Dinner", "19:00", "happy"), &alice).unwrap();
        let err = update(
            &db,
            &event.id,
            UpdateEventRequest {
                title: Some("".to_string()),
                ..Default::default()
            },
            &alice,
        )
        .unwrap_err();
        assert!(matches!(err, MindflowError::Validation(_)));
    }
}
