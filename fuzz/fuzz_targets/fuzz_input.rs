// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use mindflow::analysis::{extract_json, parse_reply, AnalysisType};
use mindflow::client_state::normalize_time;
use mindflow::mood::Mood;
use mindflow::moods::parse_timestamp;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    reply: &'a str,
    label: &'a str,
    timestamp: &'a str,
    time: &'a str,
    journal: bool,
}

fuzz_target!(|input: Input<'_>| {
    // Untrusted gateway content must never panic the parser
    let _ = extract_json(input.reply);
    let kind = if input.journal { AnalysisType::Journal } else { AnalysisType::Facial };
    if let Some(mood) = parse_reply(kind, input.reply).mood() {
        assert_eq!(mood.as_str().parse::<Mood>().ok(), Some(mood));
    }

    let _ = input.label.parse::<Mood>();
    let _ = parse_timestamp(input.timestamp);
    if let Ok(normalized) = normalize_time(input.time) {
        assert_eq!(normalize_time(&normalized).ok(), Some(normalized.clone()));
    }
});
