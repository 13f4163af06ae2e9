//! Database tests for problems, sessions, messages and analyses

use crate::{
    Analysis, BugTicket, Database, DimensionScores, Difficulty, Error, Message, MessageRole,
    Problem, ProjectFile, Session, SessionFilter, SessionStatus, TicketSeverity,
};
use tempfile::TempDir;
use uuid::Uuid;

fn sample_problem() -> Problem {
    Problem::new("Broken checkout", "Cart totals ignore discounts", Difficulty::Medium)
        .with_files(vec![
            ProjectFile::new("package.json", r#"{"name":"shop"}"#),
            ProjectFile::new("src/cart.js", "export function total(items) { return 0; }"),
        ])
        .with_api_spec("GET /cart -> { items, total }")
        .with_bug_tickets(vec![BugTicket::new(
            "BUG-1",
            "Discount ignored",
            "Applying SAVE10 does not change the total",
        )
        .with_severity(TicketSeverity::High)])
}

async fn db_with_problem() -> (Database, Problem) {
    let db = Database::in_memory().await.unwrap();
    let problem = sample_problem();
    db.insert_problem(&problem).await.unwrap();
    (db, problem)
}

fn sample_analysis(session_id: Uuid, score: f64) -> Analysis {
    Analysis::new(
        session_id,
        score,
        DimensionScores {
            clarity: 80.0,
            specificity: 70.0,
            context: 60.0,
            problem_solving: 75.0,
        },
        vec!["Asked about the failing path".to_string()],
        vec!["Share stack traces".to_string()],
        "Solid, focused questions",
    )
}

// ==================== Problem Tests ====================

#[tokio::test]
async fn test_problem_round_trip() {
    let (db, problem) = db_with_problem().await;

    let fetched = db.get_problem(problem.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, problem.id);
    assert_eq!(fetched.title, "Broken checkout");
    assert_eq!(fetched.difficulty, Difficulty::Medium);
    assert_eq!(fetched.project_files, problem.project_files);
    assert_eq!(fetched.api_spec.as_deref(), Some("GET /cart -> { items, total }"));
    assert_eq!(fetched.bug_tickets[0].severity, TicketSeverity::High);
    assert_eq!(fetched.source_repo, None);
}

#[tokio::test]
async fn test_get_missing_problem() {
    let db = Database::in_memory().await.unwrap();
    assert!(db.get_problem(Uuid::new_v4()).await.unwrap().is_none());

    let err = db.require_problem(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::ProblemNotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_update_problem() {
    let (db, mut problem) = db_with_problem().await;

    problem.title = "Broken checkout v2".to_string();
    problem.difficulty = Difficulty::Hard;
    problem.project_files.push(ProjectFile::new("README.md", "# Shop"));
    problem.api_spec = None;
    problem.touch();
    assert!(db.update_problem(&problem).await.unwrap());

    let fetched = db.get_problem(problem.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Broken checkout v2");
    assert_eq!(fetched.difficulty, Difficulty::Hard);
    assert_eq!(fetched.project_files.len(), 3);
    assert!(fetched.api_spec.is_none());
    assert!(fetched.updated_at >= fetched.created_at);
}

#[tokio::test]
async fn test_update_missing_problem_reports_no_change() {
    let db = Database::in_memory().await.unwrap();
    assert!(!db.update_problem(&sample_problem()).await.unwrap());
}

#[tokio::test]
async fn test_list_and_count_problems() {
    let db = Database::in_memory().await.unwrap();
    assert!(db.list_problems().await.unwrap().is_empty());

    let first = Problem::new("First", "d", Difficulty::Easy);
    let second = Problem::new("Second", "d", Difficulty::Hard);
    db.insert_problem(&first).await.unwrap();
    db.insert_problem(&second).await.unwrap();

    let problems = db.list_problems().await.unwrap();
    assert_eq!(problems.len(), 2);
    assert_eq!(problems[0].title, "Second");
    assert_eq!(db.count_problems().await.unwrap(), 2);
}

#[tokio::test]
async fn test_delete_problem_cascades() {
    let (db, problem) = db_with_problem().await;

    let mut session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();
    session.start().unwrap();
    db.update_session(&session).await.unwrap();
    db.insert_message(&Message::user(session.id, "Where is total()?"))
        .await
        .unwrap();
    db.upsert_analysis(&sample_analysis(session.id, 72.0))
        .await
        .unwrap();

    assert!(db.delete_problem(problem.id).await.unwrap());

    assert!(db.get_problem(problem.id).await.unwrap().is_none());
    assert!(db.get_session(session.id).await.unwrap().is_none());
    assert_eq!(db.count_messages(session.id).await.unwrap(), 0);
    assert!(db.get_analysis(session.id).await.unwrap().is_none());

    // Second delete finds nothing
    assert!(!db.delete_problem(problem.id).await.unwrap());
}

#[tokio::test]
async fn test_delete_problem_leaves_other_problems_alone() {
    let (db, problem) = db_with_problem().await;
    let other = Problem::new("Other", "d", Difficulty::Easy);
    db.insert_problem(&other).await.unwrap();
    let other_session = Session::new(other.id, "Grace");
    db.insert_session(&other_session).await.unwrap();

    db.delete_problem(problem.id).await.unwrap();

    assert!(db.get_problem(other.id).await.unwrap().is_some());
    assert!(db.get_session(other_session.id).await.unwrap().is_some());
}

// ==================== Session Tests ====================

#[tokio::test]
async fn test_session_round_trip() {
    let (db, problem) = db_with_problem().await;

    let session = Session::new(problem.id, "Ada").with_email("ada@example.com");
    db.insert_session(&session).await.unwrap();

    let fetched = db.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(fetched.problem_id, problem.id);
    assert_eq!(fetched.candidate_name, "Ada");
    assert_eq!(fetched.candidate_email.as_deref(), Some("ada@example.com"));
    assert_eq!(fetched.status, SessionStatus::Pending);
    assert!(fetched.started_at.is_none());
}

#[tokio::test]
async fn test_session_requires_existing_problem() {
    let db = Database::in_memory().await.unwrap();
    let session = Session::new(Uuid::new_v4(), "Ada");
    let err = db.insert_session(&session).await.unwrap_err();
    assert!(matches!(err, Error::Database(_)));
}

#[tokio::test]
async fn test_transition_session_lifecycle() {
    let (db, problem) = db_with_problem().await;
    let session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();

    let active = db
        .transition_session(session.id, SessionStatus::Active)
        .await
        .unwrap();
    assert_eq!(active.status, SessionStatus::Active);
    assert!(active.started_at.is_some());

    let stored = db.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Active);
    assert!(stored.started_at.is_some());

    let completed = db
        .transition_session(session.id, SessionStatus::Completed)
        .await
        .unwrap();
    assert!(completed.completed_at.is_some());

    let stored = db.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_transition_session_rejects_illegal_moves() {
    let (db, problem) = db_with_problem().await;
    let session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();

    let err = db
        .transition_session(session.id, SessionStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition(_, _)));

    let stored = db.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Pending);
}

#[tokio::test]
async fn test_transition_missing_session() {
    let db = Database::in_memory().await.unwrap();
    let err = db
        .transition_session(Uuid::new_v4(), SessionStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
}

#[tokio::test]
async fn test_update_session_status_is_optimistic() {
    let (db, problem) = db_with_problem().await;
    let mut session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();

    session.start().unwrap();
    assert!(db
        .update_session_status(&session, SessionStatus::Pending)
        .await
        .unwrap());

    // Stale expectation: stored status is no longer pending
    assert!(!db
        .update_session_status(&session, SessionStatus::Pending)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_list_sessions_with_filters() {
    let (db, problem) = db_with_problem().await;
    let other = Problem::new("Other", "d", Difficulty::Easy);
    db.insert_problem(&other).await.unwrap();

    let pending = Session::new(problem.id, "Ada");
    let mut active = Session::new(problem.id, "Grace");
    active.start().unwrap();
    let elsewhere = Session::new(other.id, "Linus");
    for s in [&pending, &active, &elsewhere] {
        db.insert_session(s).await.unwrap();
    }

    let all = db.list_sessions(&SessionFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].candidate_name, "Linus");

    let for_problem = db
        .list_sessions(&SessionFilter {
            problem_id: Some(problem.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(for_problem.len(), 2);

    let active_only = db
        .list_sessions(&SessionFilter {
            problem_id: Some(problem.id),
            status: Some(SessionStatus::Active),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(active_only.len(), 1);
    assert_eq!(active_only[0].candidate_name, "Grace");

    let limited = db
        .list_sessions(&SessionFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_delete_session_cascades() {
    let (db, problem) = db_with_problem().await;
    let session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();
    db.insert_message(&Message::user(session.id, "hi"))
        .await
        .unwrap();
    db.upsert_analysis(&sample_analysis(session.id, 50.0))
        .await
        .unwrap();

    assert!(db.delete_session(session.id).await.unwrap());
    assert!(db.get_session(session.id).await.unwrap().is_none());
    assert_eq!(db.count_messages(session.id).await.unwrap(), 0);
    assert!(db.get_analysis(session.id).await.unwrap().is_none());
    assert!(db.get_problem(problem.id).await.unwrap().is_some());
    assert!(!db.delete_session(session.id).await.unwrap());
}

#[tokio::test]
async fn test_count_sessions_by_status() {
    let (db, problem) = db_with_problem().await;

    for name in ["a", "b"] {
        db.insert_session(&Session::new(problem.id, name))
            .await
            .unwrap();
    }
    let mut done = Session::new(problem.id, "c");
    done.start().unwrap();
    done.complete().unwrap();
    db.insert_session(&done).await.unwrap();

    let counts = db.count_sessions_by_status().await.unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.active, 0);
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.total(), 3);
}

// ==================== Message Tests ====================

#[tokio::test]
async fn test_messages_are_ordered() {
    let (db, problem) = db_with_problem().await;
    let session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();

    let id1 = db
        .insert_message(&Message::user(session.id, "first"))
        .await
        .unwrap();
    let id2 = db
        .insert_message(&Message::assistant(session.id, "second"))
        .await
        .unwrap();
    let id3 = db
        .insert_message(&Message::user(session.id, "third"))
        .await
        .unwrap();
    assert!(id1 < id2 && id2 < id3);

    let messages = db.get_messages(session.id).await.unwrap();
    let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[0].id, id1);
    assert_eq!(db.count_messages(session.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_message_requires_existing_session() {
    let db = Database::in_memory().await.unwrap();
    let result = db.insert_message(&Message::user(Uuid::new_v4(), "orphan")).await;
    assert!(result.is_err());
}

// ==================== Analysis Tests ====================

#[tokio::test]
async fn test_analysis_round_trip() {
    let (db, problem) = db_with_problem().await;
    let session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();

    let analysis = sample_analysis(session.id, 72.5);
    db.upsert_analysis(&analysis).await.unwrap();

    let fetched = db.get_analysis(session.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, analysis.id);
    assert_eq!(fetched.quality_score, 72.5);
    assert_eq!(fetched.dimension_scores, analysis.dimension_scores);
    assert_eq!(fetched.strengths, analysis.strengths);
    assert_eq!(fetched.improvements, analysis.improvements);
    assert_eq!(fetched.summary, "Solid, focused questions");
}

#[tokio::test]
async fn test_analysis_is_unique_per_session() {
    let (db, problem) = db_with_problem().await;
    let session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();

    db.upsert_analysis(&sample_analysis(session.id, 40.0))
        .await
        .unwrap();
    let replacement = sample_analysis(session.id, 90.0);
    db.upsert_analysis(&replacement).await.unwrap();

    let fetched = db.get_analysis(session.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, replacement.id);
    assert_eq!(fetched.quality_score, 90.0);

    let rows = db.dashboard_rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quality_score, Some(90.0));
}

#[tokio::test]
async fn test_delete_analysis() {
    let (db, problem) = db_with_problem().await;
    let session = Session::new(problem.id, "Ada");
    db.insert_session(&session).await.unwrap();
    db.upsert_analysis(&sample_analysis(session.id, 40.0))
        .await
        .unwrap();

    assert!(db.delete_analysis(session.id).await.unwrap());
    assert!(!db.delete_analysis(session.id).await.unwrap());
}

// ==================== Dashboard Tests ====================

#[tokio::test]
async fn test_dashboard_rows() {
    let (db, problem) = db_with_problem().await;

    let analysed = Session::new(problem.id, "Ada");
    let fresh = Session::new(problem.id, "Grace");
    db.insert_session(&analysed).await.unwrap();
    db.insert_session(&fresh).await.unwrap();
    db.insert_message(&Message::user(analysed.id, "q1"))
        .await
        .unwrap();
    db.insert_message(&Message::assistant(analysed.id, "a1"))
        .await
        .unwrap();
    db.upsert_analysis(&sample_analysis(analysed.id, 81.0))
        .await
        .unwrap();

    let rows = db.dashboard_rows().await.unwrap();
    assert_eq!(rows.len(), 2);

    let fresh_row = rows.iter().find(|r| r.session.id == fresh.id).unwrap();
    assert_eq!(fresh_row.message_count, 0);
    assert!(fresh_row.quality_score.is_none());
    assert_eq!(fresh_row.problem_title, "Broken checkout");

    let analysed_row = rows.iter().find(|r| r.session.id == analysed.id).unwrap();
    assert_eq!(analysed_row.message_count, 2);
    assert_eq!(analysed_row.quality_score, Some(81.0));
}

// ==================== File-backed Tests ====================

#[tokio::test]
async fn test_file_database_persists() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("hirehiker.db");

    let problem = sample_problem();
    {
        let db = Database::new(&path).await.unwrap();
        db.insert_problem(&problem).await.unwrap();
    }

    let db = Database::new(&path).await.unwrap();
    let fetched = db.get_problem(problem.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, problem.title);
}
