// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP API for MindFlow

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::analysis::heuristic::HeuristicAnalyzer;
use crate::analysis::{Analysis, AnalysisRequest, Analyzer};
use crate::auth::{AuthResponse, AuthService, LoginRequest, RegisterRequest};
use crate::config::AppConfig;
use crate::db::{CalendarEvent, Database, MoodEntry, PublicUser};
use crate::events::{self, CreateEventRequest, UpdateEventRequest};
use crate::gateway::GatewayClient;
use crate::moods::{self, CreateMoodRequest, MoodStats};
use crate::{MindflowError, Result};

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub auth: AuthService,
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database) -> Self {
        let analyzer = build_analyzer(&config);
        Self::with_analyzer(config, db, analyzer)
    }

    pub fn with_analyzer(config: AppConfig, db: Database, analyzer: Analyzer) -> Self {
        let auth = AuthService::new(db.clone(), &config.auth);
        Self { db, config, auth, analyzer }
    }
}

/// Gateway first when it has a key, heuristic as the facial fallback
pub fn build_analyzer(config: &AppConfig) -> Analyzer {
    let mut analyzer = Analyzer::new();
    analyzer.register(Box::new(HeuristicAnalyzer::new()));
    match GatewayClient::new(&config.gateway, &config.prompts) {
        Ok(client) => analyzer.register(Box::new(client)),
        Err(e) => warn!("{}; facial analysis will use the brightness heuristic", e),
    }
    analyzer
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.web.cors_origins);

    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        // Moods
        .route("/moods", post(create_mood).get(list_moods))
        .route("/moods/stats", get(mood_stats))
        // Events
        .route("/events", post(create_event).get(list_events))
        .route("/events/:id", put(update_event).delete(delete_event))
        // Analysis
        .route("/analyze", post(analyze))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

// === Errors ===

impl IntoResponse for MindflowError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            MindflowError::Validation(fields) => {
                let body = json!({ "error": "Validation failed", "fields": fields });
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            MindflowError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            MindflowError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            MindflowError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            MindflowError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            MindflowError::CreditsExhausted => (StatusCode::PAYMENT_REQUIRED, self.to_string()),
            MindflowError::Image(e) => (StatusCode::BAD_REQUEST, format!("Could not decode image: {}", e)),
            MindflowError::GatewayUnavailable(_) | MindflowError::Analysis(_) | MindflowError::Api(_) => {
                error!("Analysis failed: {}", self);
                (StatusCode::BAD_GATEWAY, "AI analysis failed".to_string())
            }
            MindflowError::Config(_)
            | MindflowError::FileSystem(_)
            | MindflowError::Database(_)
            | MindflowError::Json(_)
            | MindflowError::Hashing(_)
            | MindflowError::Token(_)
            | MindflowError::Task(_) => {
                error!("Internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Unwrap a JSON body, turning extractor rejections into a 400 with our error shape
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| MindflowError::invalid("body", rejection.body_text()))
}

// === Authentication ===

/// The caller identified by a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = MindflowError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| MindflowError::Unauthorized("Missing bearer token".to_string()))?;

        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MindflowError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = state.auth.verify_token(token)?;
        Ok(AuthUser { id: claims.sub, email: claims.email })
    }
}

// === Handlers ===

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let response = state.auth.register(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    Ok(Json(state.auth.authenticate(json_body(payload)?).await?))
}

async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<PublicUser>> {
    Ok(Json(state.auth.current_user(&user.id)?))
}

async fn create_mood(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: std::result::Result<Json<CreateMoodRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MoodEntry>)> {
    let entry = moods::create(&state.db, json_body(payload)?, &user.id)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_moods(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Vec<MoodEntry>>> {
    Ok(Json(moods::find_all(&state.db, &user.id)?))
}

#[derive(Deserialize)]
struct StatsQuery {
    days: Option<u32>,
}

async fn mood_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    query: std::result::Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<MoodStats>> {
    let Query(query) = query.map_err(|_| MindflowError::invalid("days", "days must be a positive integer"))?;
    Ok(Json(moods::stats(&state.db, &user.id, query.days, Utc::now())?))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: std::result::Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalendarEvent>)> {
    let event = events::create(&state.db, json_body(payload)?, &user.id)?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn list_events(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Vec<CalendarEvent>>> {
    Ok(Json(events::find_all(&state.db, &user.id)?))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateEventRequest>, JsonRejection>,
) -> Result<Json<CalendarEvent>> {
    Ok(Json(events::update(&state.db, &id, json_body(payload)?, &user.id)?))
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    events::delete(&state.db, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    analysis_type: Option<String>,
    image_base64: Option<String>,
    user_input: Option<String>,
    /// Store a mood entry from the result
    #[serde(default)]
    record: bool,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    #[serde(flatten)]
    analysis: Analysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<MoodEntry>,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: std::result::Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>> {
    let body = json_body(payload)?;
    let request = AnalysisRequest::from_parts(body.analysis_type.as_deref(), body.image_base64, body.user_input)?;
    let analysis = state.analyzer.analyze(&request).await?;

    let entry = match (body.record, analysis.mood()) {
        (true, Some(mood)) => Some(state.db.insert_mood(&user.id, mood, analysis.insight(), Utc::now())?),
        _ => None,
    };

    Ok(Json(AnalyzeResponse { analysis, entry }))
}

/// Start the API server with config and database
pub async fn start_server(config: AppConfig, db: Database) -> Result<()> {
    let addr = format!("{}:{}", config.web.host, config.web.port);
    let state = Arc::new(AppState::new(config, db));
    info!("Analysis sources: {}", state.analyzer.source_names().join(", "));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("MindFlow API listening on http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| MindflowError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
