//! Candidate sessions and their lifecycle

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Session states in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created by a recruiter, candidate has not started yet
    Pending,
    /// Candidate is working on the problem
    Active,
    /// Candidate finished; transcript is frozen
    Completed,
}

impl SessionStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    /// Parse from string representation
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            _ => Err(Error::Parse(format!("Unknown session status: {}", s))),
        }
    }

    /// Check if this state allows transition to another state
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        matches!(
            (self, target),
            (SessionStatus::Pending, SessionStatus::Active)
                | (SessionStatus::Active, SessionStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

/// One candidate's attempt at one problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub problem_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new pending session
    pub fn new(problem_id: Uuid, candidate_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            problem_id,
            candidate_name: candidate_name.into(),
            candidate_email: None,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.candidate_email = Some(email.into());
        self
    }

    /// Transition to a new status, stamping the matching timestamp
    pub fn transition_to(&mut self, target: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidStateTransition(
                self.status.as_str().to_string(),
                target.as_str().to_string(),
            ));
        }

        match target {
            SessionStatus::Active => self.started_at = Some(Utc::now()),
            SessionStatus::Completed => self.completed_at = Some(Utc::now()),
            SessionStatus::Pending => {}
        }
        self.status = target;
        Ok(())
    }

    /// Candidate opens the session
    pub fn start(&mut self) -> Result<()> {
        self.transition_to(SessionStatus::Active)
    }

    /// Candidate submits the session
    pub fn complete(&mut self) -> Result<()> {
        self.transition_to(SessionStatus::Completed)
    }

    /// Whether the candidate may still chat with the assistant
    pub fn accepts_messages(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Time spent between start and completion (or now, while active)
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Utc::now);
        Some(end - started)
    }
}
