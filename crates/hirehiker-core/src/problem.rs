//! Debugging problems presented to candidates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::{Error, Result};

/// Maximum problem title length
pub const MAX_TITLE_LENGTH: usize = 200;

/// Problem difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Parse from string representation
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(Error::Parse(format!("Unknown difficulty: {}", s))),
        }
    }
}

/// Severity of a bug ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSeverity::Low => "low",
            TicketSeverity::Medium => "medium",
            TicketSeverity::High => "high",
            TicketSeverity::Critical => "critical",
        }
    }
}

/// A single text file of the sample project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Path relative to the project root, `/`-separated
    pub path: String,
    pub content: String,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A bug report the candidate is asked to investigate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugTicket {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub severity: TicketSeverity,
}

impl BugTicket {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            severity: TicketSeverity::default(),
        }
    }

    pub fn with_severity(mut self, severity: TicketSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// A debugging exercise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// Files of the sample codebase the candidate debugs
    pub project_files: Vec<ProjectFile>,
    /// API documentation shipped with the project
    pub api_spec: Option<String>,
    pub bug_tickets: Vec<BugTicket>,
    /// GitHub repository the files were imported from (`owner/repo@ref`)
    pub source_repo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    /// Create a new problem without files or tickets
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            difficulty,
            project_files: Vec::new(),
            api_spec: None,
            bug_tickets: Vec::new(),
            source_repo: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_files(mut self, files: Vec<ProjectFile>) -> Self {
        self.project_files = files;
        self
    }

    pub fn with_api_spec(mut self, api_spec: impl Into<String>) -> Self {
        self.api_spec = Some(api_spec.into());
        self
    }

    pub fn with_bug_tickets(mut self, tickets: Vec<BugTicket>) -> Self {
        self.bug_tickets = tickets;
        self
    }

    pub fn with_source_repo(mut self, repo: impl Into<String>) -> Self {
        self.source_repo = Some(repo.into());
        self
    }

    /// Look up a project file by path (leading `./` or `/` ignored)
    pub fn file(&self, path: &str) -> Option<&ProjectFile> {
        let wanted = normalize_path(path);
        self.project_files.iter().find(|f| f.path == wanted)
    }

    /// Look up a bug ticket by ID (case-insensitive)
    pub fn bug_ticket(&self, id: &str) -> Option<&BugTicket> {
        self.bug_tickets
            .iter()
            .find(|t| t.id.eq_ignore_ascii_case(id.trim()))
    }

    /// Refresh the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Check the problem is well-formed before it is stored
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("Title cannot be empty".to_string()));
        }
        if self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err(Error::Validation(format!(
                "Title exceeds maximum length of {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if self.description.trim().is_empty() {
            return Err(Error::Validation("Description cannot be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for file in &self.project_files {
            validate_file_path(&file.path)?;
            if !seen.insert(file.path.as_str()) {
                return Err(Error::Validation(format!(
                    "Duplicate project file: {}",
                    file.path
                )));
            }
        }

        let mut ticket_ids = HashSet::new();
        for ticket in &self.bug_tickets {
            if ticket.id.trim().is_empty() {
                return Err(Error::Validation("Bug ticket ID cannot be empty".to_string()));
            }
            if !ticket_ids.insert(ticket.id.to_lowercase()) {
                return Err(Error::Validation(format!(
                    "Duplicate bug ticket: {}",
                    ticket.id
                )));
            }
        }

        Ok(())
    }
}

/// Strip leading `./` and `/` from a project path
pub fn normalize_path(path: &str) -> &str {
    let mut p = path.trim();
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            return p;
        }
    }
}

fn validate_file_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(Error::Validation("File path cannot be empty".to_string()));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(Error::Validation(format!(
            "File path must be relative with '/' separators: {}",
            path
        )));
    }
    if path.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return Err(Error::Validation(format!("Invalid file path: {}", path)));
    }
    Ok(())
}
