//! HireHiker Core - Core types and database layer
//!
//! This crate provides the fundamental types for candidate evaluation:
//! - Problems with embedded project files, API spec and bug tickets
//! - Session lifecycle (pending -> active -> completed)
//! - Transcript messages
//! - Transcript analyses
//! - Database operations

pub mod analysis;
pub mod database;
#[cfg(test)]
mod database_tests;
pub mod error;
pub mod message;
pub mod problem;
pub mod session;

pub use analysis::{Analysis, DimensionScores};
pub use database::{DashboardRow, Database, DatabaseConfig, SessionFilter, StatusCounts};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use problem::{BugTicket, Difficulty, Problem, ProjectFile, TicketSeverity};
pub use session::{Session, SessionStatus};
