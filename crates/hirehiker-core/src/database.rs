//! Database layer for SQLite

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::{
    Analysis, DimensionScores, Difficulty, Error, Message, MessageRole, Problem, Result, Session,
    SessionStatus,
};

/// Database configuration
pub struct DatabaseConfig {
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection acquire timeout
    pub acquire_timeout: Duration,
    /// Idle connection timeout
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Filters for listing sessions
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub problem_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
    pub limit: Option<i64>,
}

/// One line of the recruiter dashboard
#[derive(Debug, Clone)]
pub struct DashboardRow {
    pub session: Session,
    pub problem_title: String,
    pub message_count: i64,
    pub quality_score: Option<f64>,
}

/// Number of sessions in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub active: i64,
    pub completed: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.active + self.completed
    }
}

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default config
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(path, DatabaseConfig::default()).await
    }

    /// Create a new database connection with custom config
    pub async fn with_config(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout=5000")
            .execute(&pool)
            .await?;

        debug!("Opened database at {}", path.display());

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub async fn in_memory() -> Result<Self> {
        // A single connection that never expires; dropping it drops the data
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&pool)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(include_str!("../../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Problem Operations ====================

    /// Insert a new problem
    pub async fn insert_problem(&self, problem: &Problem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO problems (id, title, description, difficulty, project_files, api_spec, bug_tickets, source_repo, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(problem.id.to_string())
        .bind(&problem.title)
        .bind(&problem.description)
        .bind(problem.difficulty.as_str())
        .bind(serde_json::to_string(&problem.project_files)?)
        .bind(&problem.api_spec)
        .bind(serde_json::to_string(&problem.bug_tickets)?)
        .bind(&problem.source_repo)
        .bind(ts(&problem.created_at))
        .bind(ts(&problem.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a problem by ID
    pub async fn get_problem(&self, id: Uuid) -> Result<Option<Problem>> {
        let row = sqlx::query_as::<_, ProblemRow>("SELECT * FROM problems WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Get a problem by ID, failing when it does not exist
    pub async fn require_problem(&self, id: Uuid) -> Result<Problem> {
        self.get_problem(id)
            .await?
            .ok_or_else(|| Error::ProblemNotFound(id.to_string()))
    }

    /// List all problems, newest first
    pub async fn list_problems(&self) -> Result<Vec<Problem>> {
        let rows = sqlx::query_as::<_, ProblemRow>(
            "SELECT * FROM problems ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Update a problem (returns true if a row was changed)
    pub async fn update_problem(&self, problem: &Problem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE problems SET
                title = ?, description = ?, difficulty = ?, project_files = ?,
                api_spec = ?, bug_tickets = ?, source_repo = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&problem.title)
        .bind(&problem.description)
        .bind(problem.difficulty.as_str())
        .bind(serde_json::to_string(&problem.project_files)?)
        .bind(&problem.api_spec)
        .bind(serde_json::to_string(&problem.bug_tickets)?)
        .bind(&problem.source_repo)
        .bind(ts(&problem.updated_at))
        .bind(problem.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a problem together with its sessions, messages and analyses
    pub async fn delete_problem(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM analyses WHERE session_id IN (SELECT id FROM sessions WHERE problem_id = ?)",
        )
        .bind(&id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM messages WHERE session_id IN (SELECT id FROM sessions WHERE problem_id = ?)",
        )
        .bind(&id)
        .execute(&mut *tx)
        .await?;
        let sessions = sqlx::query("DELETE FROM sessions WHERE problem_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM problems WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            "Deleted problem {} ({} sessions)",
            id,
            sessions.rows_affected()
        );
        Ok(result.rows_affected() > 0)
    }

    /// Count problems
    pub async fn count_problems(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM problems")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ==================== Session Operations ====================

    /// Insert a new session
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, problem_id, candidate_name, candidate_email, status, created_at, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.problem_id.to_string())
        .bind(&session.candidate_name)
        .bind(&session.candidate_email)
        .bind(session.status.as_str())
        .bind(ts(&session.created_at))
        .bind(session.started_at.as_ref().map(ts))
        .bind(session.completed_at.as_ref().map(ts))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a session by ID
    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Get a session by ID, failing when it does not exist
    pub async fn require_session(&self, id: Uuid) -> Result<Session> {
        self.get_session(id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// List sessions, newest first
    pub async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let mut query = String::from("SELECT * FROM sessions WHERE 1=1");

        if filter.problem_id.is_some() {
            query.push_str(" AND problem_id = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY created_at DESC, rowid DESC");
        if filter.limit.is_some() {
            query.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query_as::<_, SessionRow>(&query);

        if let Some(problem_id) = filter.problem_id {
            q = q.bind(problem_id.to_string());
        }
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(limit) = filter.limit {
            q = q.bind(limit);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Update a session
    pub async fn update_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions SET
                candidate_name = ?, candidate_email = ?, status = ?, started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&session.candidate_name)
        .bind(&session.candidate_email)
        .bind(session.status.as_str())
        .bind(session.started_at.as_ref().map(ts))
        .bind(session.completed_at.as_ref().map(ts))
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist a status change only if the stored status still equals `expected`
    pub async fn update_session_status(
        &self,
        session: &Session,
        expected: SessionStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET status = ?, started_at = ?, completed_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(session.status.as_str())
        .bind(session.started_at.as_ref().map(ts))
        .bind(session.completed_at.as_ref().map(ts))
        .bind(session.id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Load a session, move it to `target` and store it
    pub async fn transition_session(&self, id: Uuid, target: SessionStatus) -> Result<Session> {
        let mut session = self.require_session(id).await?;
        let expected = session.status;
        session.transition_to(target)?;

        if !self.update_session_status(&session, expected).await? {
            // Lost a race with another request; report against the stored status
            let current = self.require_session(id).await?;
            return Err(Error::InvalidStateTransition(
                current.status.as_str().to_string(),
                target.as_str().to_string(),
            ));
        }

        debug!(
            "Session {} moved {} -> {}",
            id,
            expected.as_str(),
            target.as_str()
        );
        Ok(session)
    }

    /// Delete a session together with its messages and analysis
    pub async fn delete_session(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM analyses WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count sessions per status
    pub async fn count_sessions_by_status(&self) -> Result<StatusCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM sessions GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match SessionStatus::from_str(&status)? {
                SessionStatus::Pending => counts.pending = count,
                SessionStatus::Active => counts.active = count,
                SessionStatus::Completed => counts.completed = count,
            }
        }
        Ok(counts)
    }

    // ==================== Message Operations ====================

    /// Insert a message, returning its ID
    pub async fn insert_message(&self, message: &Message) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (session_id, role, content, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(message.session_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(ts(&message.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get the transcript of a session in insertion order
    pub async fn get_messages(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Count messages in a session
    pub async fn count_messages(&self, session_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // ==================== Analysis Operations ====================

    /// Store the analysis of a session, replacing any previous one
    pub async fn upsert_analysis(&self, analysis: &Analysis) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analyses (id, session_id, quality_score, dimension_scores, strengths, improvements, summary, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                id = excluded.id,
                quality_score = excluded.quality_score,
                dimension_scores = excluded.dimension_scores,
                strengths = excluded.strengths,
                improvements = excluded.improvements,
                summary = excluded.summary,
                created_at = excluded.created_at
            "#,
        )
        .bind(analysis.id.to_string())
        .bind(analysis.session_id.to_string())
        .bind(analysis.quality_score)
        .bind(serde_json::to_string(&analysis.dimension_scores)?)
        .bind(serde_json::to_string(&analysis.strengths)?)
        .bind(serde_json::to_string(&analysis.improvements)?)
        .bind(&analysis.summary)
        .bind(ts(&analysis.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the analysis of a session
    pub async fn get_analysis(&self, session_id: Uuid) -> Result<Option<Analysis>> {
        let row = sqlx::query_as::<_, AnalysisRow>("SELECT * FROM analyses WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Delete the analysis of a session
    pub async fn delete_analysis(&self, session_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Dashboard ====================

    /// Every session with its problem title, message count and score
    pub async fn dashboard_rows(&self) -> Result<Vec<DashboardRow>> {
        let rows = sqlx::query_as::<_, DashboardSqlRow>(
            r#"
            SELECT
                s.id, s.problem_id, s.candidate_name, s.candidate_email, s.status,
                s.created_at, s.started_at, s.completed_at,
                p.title AS problem_title,
                (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.id) AS message_count,
                a.quality_score AS quality_score
            FROM sessions s
            JOIN problems p ON p.id = s.problem_id
            LEFT JOIN analyses a ON a.session_id = s.id
            ORDER BY s.created_at DESC, s.rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

// ==================== Row Types ====================

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[derive(sqlx::FromRow)]
struct ProblemRow {
    id: String,
    title: String,
    description: String,
    difficulty: String,
    project_files: String,
    api_spec: Option<String>,
    bug_tickets: String,
    source_repo: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProblemRow> for Problem {
    type Error = Error;

    fn try_from(row: ProblemRow) -> Result<Self> {
        Ok(Problem {
            id: Uuid::parse_str(&row.id)?,
            title: row.title,
            description: row.description,
            difficulty: Difficulty::from_str(&row.difficulty)?,
            project_files: serde_json::from_str(&row.project_files)?,
            api_spec: row.api_spec,
            bug_tickets: serde_json::from_str(&row.bug_tickets)?,
            source_repo: row.source_repo,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    problem_id: String,
    candidate_name: String,
    candidate_email: Option<String>,
    status: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<SessionRow> for Session {
    type Error = Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Session {
            id: Uuid::parse_str(&row.id)?,
            problem_id: Uuid::parse_str(&row.problem_id)?,
            candidate_name: row.candidate_name,
            candidate_email: row.candidate_email,
            status: SessionStatus::from_str(&row.status)?,
            created_at: parse_ts(&row.created_at)?,
            started_at: row.started_at.as_deref().map(parse_ts).transpose()?,
            completed_at: row.completed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    session_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: row.id,
            session_id: Uuid::parse_str(&row.session_id)?,
            role: MessageRole::from_str(&row.role)?,
            content: row.content,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: String,
    session_id: String,
    quality_score: f64,
    dimension_scores: String,
    strengths: String,
    improvements: String,
    summary: String,
    created_at: String,
}

impl TryFrom<AnalysisRow> for Analysis {
    type Error = Error;

    fn try_from(row: AnalysisRow) -> Result<Self> {
        let dimension_scores: DimensionScores = serde_json::from_str(&row.dimension_scores)?;
        Ok(Analysis {
            id: Uuid::parse_str(&row.id)?,
            session_id: Uuid::parse_str(&row.session_id)?,
            quality_score: row.quality_score,
            dimension_scores,
            strengths: serde_json::from_str(&row.strengths)?,
            improvements: serde_json::from_str(&row.improvements)?,
            summary: row.summary,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DashboardSqlRow {
    id: String,
    problem_id: String,
    candidate_name: String,
    candidate_email: Option<String>,
    status: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    problem_title: String,
    message_count: i64,
    quality_score: Option<f64>,
}

impl TryFrom<DashboardSqlRow> for DashboardRow {
    type Error = Error;

    fn try_from(row: DashboardSqlRow) -> Result<Self> {
        let session = SessionRow {
            id: row.id,
            problem_id: row.problem_id,
            candidate_name: row.candidate_name,
            candidate_email: row.candidate_email,
            status: row.status,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
        .try_into()?;

        Ok(DashboardRow {
            session,
            problem_title: row.problem_title,
            message_count: row.message_count,
            quality_score: row.quality_score,
        })
    }
}
