//! REST API endpoints with authentication and validation

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hirehiker_core::{
    Analysis, BugTicket, DashboardRow, Database, DimensionScores, Difficulty, Error as CoreError,
    Message, Problem, ProjectFile, Session, SessionFilter, SessionStatus, StatusCounts,
};
use hirehiker_github::{build_file_tree, fetch_project_files, FileSystemTree, GitHubClient, RepoRef};
use hirehiker_openai::{Analyzer, Assistant};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Maximum candidate message length
const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Maximum candidate name length
const MAX_NAME_LENGTH: usize = 200;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "bad_gateway" => StatusCode::BAD_GATEWAY,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl ApiError {
    fn new(code: &str, msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: code.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self::new("unauthorized", "Invalid or missing API key")
    }

    fn not_found(entity: &str) -> Self {
        Self::new("not_found", format!("{} not found", entity))
    }

    fn bad_request(msg: impl Into<String>) -> Self {
        Self::new("bad_request", msg)
    }

    fn validation(msg: impl Into<String>) -> Self {
        Self::new("validation_error", msg)
    }

    fn conflict(msg: impl Into<String>) -> Self {
        Self::new("conflict", msg)
    }

    fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::new("bad_gateway", msg)
    }

    fn unavailable(msg: impl Into<String>) -> Self {
        Self::new("service_unavailable", msg)
    }

    fn internal() -> Self {
        Self::new("internal_error", "Internal server error")
    }
}

/// Parse a path id, rejecting malformed ones with a JSON error
fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("Invalid UUID format"))
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProblemNotFound(_) => ApiError::not_found("Problem"),
            CoreError::SessionNotFound(_) => ApiError::not_found("Session"),
            CoreError::AnalysisNotFound(_) => ApiError::not_found("Analysis"),
            CoreError::InvalidStateTransition(from, to) => {
                ApiError::conflict(format!("Cannot move session from {} to {}", from, to))
            }
            CoreError::Validation(msg) => ApiError::validation(msg),
            CoreError::Parse(msg) => ApiError::bad_request(msg),
            other => {
                error!("Request failed: {}", other);
                ApiError::internal()
            }
        }
    }
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub api_key: Option<SecretString>,
    pub assistant: Option<Assistant>,
    pub analyzer: Option<Analyzer>,
    pub github: Option<GitHubClient>,
}

impl AppState {
    /// Create new app state with optional API key authentication
    pub fn new(db: Database, api_key: Option<String>) -> Self {
        Self {
            db,
            api_key: api_key.map(SecretString::new),
            assistant: None,
            analyzer: None,
            github: None,
        }
    }

    pub fn with_assistant(mut self, assistant: Assistant) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_github(mut self, github: GitHubClient) -> Self {
        self.github = Some(github);
        self
    }
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // If no API key configured, allow all requests
    let Some(ref expected_key) = state.api_key else {
        return Ok(next.run(request).await);
    };

    let headers = request.headers();
    let provided_key = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s));

    match provided_key {
        Some(key) if key == expected_key.expose_secret() => Ok(next.run(request).await),
        _ => Err(ApiError::unauthorized()),
    }
}

/// Create the API router
pub fn create_api_router(state: Arc<AppState>) -> Router {
    // Routes that require authentication
    let protected_routes = Router::new()
        .route("/api/problems", get(list_problems).post(create_problem))
        .route("/api/problems/import", post(import_problem))
        .route(
            "/api/problems/:id",
            get(get_problem).put(update_problem).delete(delete_problem),
        )
        .route("/api/problems/:id/files", get(get_problem_files))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/start", post(start_session))
        .route("/api/sessions/:id/complete", post(complete_session))
        .route(
            "/api/sessions/:id/messages",
            get(get_messages).post(send_message),
        )
        .route(
            "/api/sessions/:id/analysis",
            get(get_analysis).post(generate_analysis),
        )
        .route("/api/dashboard", get(dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Public routes (no auth required)
    let public_routes = Router::new().route("/api/health", get(health_check));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
}

/// Create the full router with request tracing and CORS
pub fn create_router(state: Arc<AppState>) -> Router {
    create_api_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ==================== Handlers ====================

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_problems(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProblemSummary>>, ApiError> {
    let problems = state.db.list_problems().await?;
    Ok(Json(problems.iter().map(ProblemSummary::from).collect()))
}

async fn get_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProblemResponse>, ApiError> {
    let id = parse_id(&id)?;
    let problem = state.db.require_problem(id).await?;
    Ok(Json(problem.into()))
}

async fn create_problem(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProblemRequest>,
) -> Result<(StatusCode, Json<ProblemResponse>), ApiError> {
    let problem = req.into_problem();
    problem.validate()?;
    state.db.insert_problem(&problem).await?;

    info!("Created problem {} ({})", problem.id, problem.title);
    Ok((StatusCode::CREATED, Json(problem.into())))
}

async fn update_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProblemRequest>,
) -> Result<Json<ProblemResponse>, ApiError> {
    let id = parse_id(&id)?;
    let mut problem = state.db.require_problem(id).await?;
    problem.title = req.title;
    problem.description = req.description;
    problem.difficulty = req.difficulty;
    problem.project_files = req.project_files;
    problem.api_spec = req.api_spec;
    problem.bug_tickets = req.bug_tickets;
    problem.touch();
    problem.validate()?;

    if !state.db.update_problem(&problem).await? {
        return Err(ApiError::not_found("Problem"));
    }
    Ok(Json(problem.into()))
}

async fn delete_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.db.delete_problem(id).await? {
        info!("Deleted problem {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Problem"))
    }
}

async fn get_problem_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FileSystemTree>, ApiError> {
    let id = parse_id(&id)?;
    let problem = state.db.require_problem(id).await?;
    let tree = build_file_tree(&problem.project_files)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    Ok(Json(tree))
}

async fn import_problem(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImportProblemRequest>,
) -> Result<(StatusCode, Json<ProblemResponse>), ApiError> {
    let github = state
        .github
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("GitHub import is not configured"))?;
    let repo = RepoRef::parse(&req.repo).map_err(|e| ApiError::validation(e.to_string()))?;

    let files = fetch_project_files(github, &repo).await.map_err(|e| {
        error!("Failed to import {}: {:#}", repo, e);
        ApiError::bad_gateway("Failed to download repository")
    })?;

    let title = req.title.unwrap_or_else(|| repo.repo.clone());
    let description = req
        .description
        .unwrap_or_else(|| format!("Imported from {}", repo));
    let mut problem = Problem::new(title, description, req.difficulty.unwrap_or(Difficulty::Medium))
        .with_files((*files).clone())
        .with_bug_tickets(req.bug_tickets)
        .with_source_repo(repo.to_string());
    problem.api_spec = req.api_spec;
    problem.validate()?;
    state.db.insert_problem(&problem).await?;

    info!(
        "Imported problem {} from {} ({} files)",
        problem.id,
        repo,
        problem.project_files.len()
    );
    Ok((StatusCode::CREATED, Json(problem.into())))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(SessionStatus::from_str)
        .transpose()?;
    let filter = SessionFilter {
        problem_id: query.problem_id,
        status,
        limit: query.limit,
    };

    let sessions = state.db.list_sessions(&filter).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    req.validate()?;
    // 404 rather than a foreign key failure
    state.db.require_problem(req.problem_id).await?;

    let mut session = Session::new(req.problem_id, req.candidate_name.trim());
    if let Some(email) = req.candidate_email.filter(|e| !e.trim().is_empty()) {
        session = session.with_email(email.trim());
    }
    state.db.insert_session(&session).await?;

    info!("Created session {} for {}", session.id, session.candidate_name);
    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let id = parse_id(&id)?;
    let session = state.db.require_session(id).await?;
    let problem = state.db.require_problem(session.problem_id).await?;
    let message_count = state.db.count_messages(id).await?;
    let has_analysis = state.db.get_analysis(id).await?.is_some();

    Ok(Json(SessionDetailResponse {
        session: session.into(),
        problem: ProblemSummary::from(&problem),
        message_count,
        has_analysis,
    }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.db.delete_session(id).await? {
        info!("Deleted session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Session"))
    }
}

async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let session = state.db.transition_session(id, SessionStatus::Active).await?;
    info!("Session {} started", id);
    Ok(Json(session.into()))
}

async fn complete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let session = state
        .db
        .transition_session(id, SessionStatus::Completed)
        .await?;
    info!("Session {} completed", id);
    Ok(Json(session.into()))
}

async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let id = parse_id(&id)?;
    state.db.require_session(id).await?;
    let messages = state.db.get_messages(id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Message cannot be empty"));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::validation(format!(
            "Message exceeds maximum length of {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }

    let session = state.db.require_session(id).await?;
    if !session.accepts_messages() {
        return Err(ApiError::conflict(format!(
            "Session is {}, messages are only accepted while active",
            session.status.as_str()
        )));
    }
    let assistant = state
        .assistant
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Assistant is not configured"))?;
    let problem = state.db.require_problem(session.problem_id).await?;

    let mut user_message = Message::user(id, content);
    user_message.id = state.db.insert_message(&user_message).await?;

    let history = state.db.get_messages(id).await?;
    let reply = assistant.reply(&problem, &history).await.map_err(|e| {
        error!("Assistant failed for session {}: {:#}", id, e);
        ApiError::bad_gateway("Failed to generate response")
    })?;

    let mut assistant_message = Message::assistant(id, reply.content);
    assistant_message.id = state.db.insert_message(&assistant_message).await?;

    Ok(Json(SendMessageResponse {
        user_message: user_message.into(),
        assistant_message: assistant_message.into(),
        tool_calls_made: reply.tool_calls_made,
    }))
}

async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.db.require_session(id).await?;
    let analysis = state
        .db
        .get_analysis(id)
        .await?
        .ok_or_else(|| CoreError::AnalysisNotFound(id.to_string()))?;
    Ok(Json(analysis.into()))
}

async fn generate_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<AnalysisResponse>), ApiError> {
    let id = parse_id(&id)?;
    let session = state.db.require_session(id).await?;
    if session.status != SessionStatus::Completed {
        return Err(ApiError::conflict("Only completed sessions can be analyzed"));
    }
    let analyzer = state
        .analyzer
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Analyzer is not configured"))?;

    let messages = state.db.get_messages(id).await?;
    if !messages.iter().any(Message::is_from_candidate) {
        return Err(ApiError::validation("Session has no candidate questions"));
    }
    let problem = state.db.require_problem(session.problem_id).await?;

    let analysis = analyzer
        .analyze(&problem, &session, &messages)
        .await
        .map_err(|e| {
            error!("Analysis failed for session {}: {:#}", id, e);
            ApiError::bad_gateway("Failed to generate response")
        })?;
    state.db.upsert_analysis(&analysis).await?;

    Ok((StatusCode::CREATED, Json(analysis.into())))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let counts = state.db.count_sessions_by_status().await?;
    let rows = state.db.dashboard_rows().await?;
    if rows.len() as i64 != counts.total() {
        warn!(
            "Dashboard rows ({}) differ from session count ({})",
            rows.len(),
            counts.total()
        );
    }

    Ok(Json(DashboardResponse {
        counts: counts.into(),
        sessions: rows.into_iter().map(Into::into).collect(),
    }))
}

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
pub struct ProblemRequest {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub project_files: Vec<ProjectFile>,
    #[serde(default)]
    pub api_spec: Option<String>,
    #[serde(default)]
    pub bug_tickets: Vec<BugTicket>,
}

impl ProblemRequest {
    fn into_problem(self) -> Problem {
        let mut problem = Problem::new(self.title, self.description, self.difficulty)
            .with_files(self.project_files)
            .with_bug_tickets(self.bug_tickets);
        problem.api_spec = self.api_spec;
        problem
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportProblemRequest {
    /// `owner/repo[@ref]`
    pub repo: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub api_spec: Option<String>,
    #[serde(default)]
    pub bug_tickets: Vec<BugTicket>,
}

#[derive(Debug, Serialize)]
pub struct ProblemSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub file_count: usize,
    pub ticket_count: usize,
    pub source_repo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Problem> for ProblemSummary {
    fn from(problem: &Problem) -> Self {
        Self {
            id: problem.id.to_string(),
            title: problem.title.clone(),
            description: problem.description.clone(),
            difficulty: problem.difficulty,
            file_count: problem.project_files.len(),
            ticket_count: problem.bug_tickets.len(),
            source_repo: problem.source_repo.clone(),
            created_at: problem.created_at.to_rfc3339(),
            updated_at: problem.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProblemResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub project_files: Vec<ProjectFile>,
    pub api_spec: Option<String>,
    pub bug_tickets: Vec<BugTicket>,
    pub source_repo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Problem> for ProblemResponse {
    fn from(problem: Problem) -> Self {
        Self {
            id: problem.id.to_string(),
            title: problem.title,
            description: problem.description,
            difficulty: problem.difficulty,
            project_files: problem.project_files,
            api_spec: problem.api_spec,
            bug_tickets: problem.bug_tickets,
            source_repo: problem.source_repo,
            created_at: problem.created_at.to_rfc3339(),
            updated_at: problem.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub problem_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub problem_id: Uuid,
    pub candidate_name: String,
    #[serde(default)]
    pub candidate_email: Option<String>,
}

impl CreateSessionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let name = self.candidate_name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("Candidate name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ApiError::validation(format!(
                "Candidate name exceeds maximum length of {} characters",
                MAX_NAME_LENGTH
            )));
        }
        if let Some(email) = self.candidate_email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                return Err(ApiError::validation("Invalid candidate email"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub problem_id: String,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub status: SessionStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_secs: Option<i64>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id.to_string(),
            problem_id: session.problem_id.to_string(),
            duration_secs: session.duration().map(|d| d.num_seconds()),
            candidate_name: session.candidate_name,
            candidate_email: session.candidate_email,
            status: session.status,
            created_at: session.created_at.to_rfc3339(),
            started_at: session.started_at.map(|t| t.to_rfc3339()),
            completed_at: session.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub problem: ProblemSummary,
    pub message_count: i64,
    pub has_analysis: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            role: msg.role.as_str().to_string(),
            content: msg.content,
            created_at: msg.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub user_message: MessageResponse,
    pub assistant_message: MessageResponse,
    pub tool_calls_made: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub id: String,
    pub session_id: String,
    pub quality_score: f64,
    pub grade: String,
    pub dimension_scores: DimensionScores,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
    pub created_at: String,
}

impl From<Analysis> for AnalysisResponse {
    fn from(analysis: Analysis) -> Self {
        Self {
            id: analysis.id.to_string(),
            session_id: analysis.session_id.to_string(),
            grade: analysis.grade().to_string(),
            quality_score: analysis.quality_score,
            dimension_scores: analysis.dimension_scores,
            strengths: analysis.strengths,
            improvements: analysis.improvements,
            summary: analysis.summary,
            created_at: analysis.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusCountsResponse {
    pub pending: i64,
    pub active: i64,
    pub completed: i64,
    pub total: i64,
}

impl From<StatusCounts> for StatusCountsResponse {
    fn from(counts: StatusCounts) -> Self {
        Self {
            pending: counts.pending,
            active: counts.active,
            completed: counts.completed,
            total: counts.total(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardEntry {
    pub session_id: String,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub problem_id: String,
    pub problem_title: String,
    pub status: SessionStatus,
    pub message_count: i64,
    pub quality_score: Option<f64>,
    pub grade: Option<String>,
    pub created_at: String,
    pub duration_secs: Option<i64>,
}

impl From<DashboardRow> for DashboardEntry {
    fn from(row: DashboardRow) -> Self {
        Self {
            session_id: row.session.id.to_string(),
            duration_secs: row.session.duration().map(|d| d.num_seconds()),
            candidate_name: row.session.candidate_name,
            candidate_email: row.session.candidate_email,
            problem_id: row.session.problem_id.to_string(),
            problem_title: row.problem_title,
            status: row.session.status,
            message_count: row.message_count,
            grade: row
                .quality_score
                .map(|s| hirehiker_core::analysis::grade_for(s).to_string()),
            quality_score: row.quality_score,
            created_at: row.session.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub counts: StatusCountsResponse,
    pub sessions: Vec<DashboardEntry>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
