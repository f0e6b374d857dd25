// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! MindFlow: mood tracking and wellness backend
//!
//! Accounts, mood entries and mood-tagged calendar events over a bearer-token
//! HTTP API, plus facial, journal and chat analysis through an LLM gateway
//! with an offline brightness heuristic for camera frames.

pub mod analysis;
pub mod auth;
pub mod client_state;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod gateway;
pub mod mood;
pub mod moods;
pub mod web;

pub use config::AppConfig;
pub use error::{MindflowError, Result};
