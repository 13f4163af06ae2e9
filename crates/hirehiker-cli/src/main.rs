//! HireHiker CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hirehiker_core::{
    BugTicket, Database, Difficulty, MessageRole, Problem, ProjectFile, SessionFilter,
    SessionStatus,
};
use hirehiker_github::{fetch_project_files, GitHubClient, RepoRef};
use hirehiker_openai::{
    Analyzer, Assistant, AssistantConfig, ChatBackend, OpenAiClient, OpenAiClientConfig,
    DEFAULT_MAX_TOOL_ITERATIONS,
};
use hirehiker_web::{create_router, AppState};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Initialize logging with the specified verbosity level
fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter =
        EnvFilter::from_default_env().add_directive(format!("hirehiker={}", level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2) // Show module path at debug+
        .with_file(verbose >= 3) // Show file:line at trace
        .with_line_number(verbose >= 3);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "hirehiker")]
#[command(about = "Evaluate candidates by the questions they ask while debugging")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database path
    #[arg(
        long,
        env = "HIREHIKER_DB_PATH",
        default_value = "~/.hirehiker/hirehiker.db"
    )]
    db_path: String,

    /// Increase verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output logs as JSON (for machine parsing)
    #[arg(long, global = true)]
    log_json: bool,
}

/// OpenAI connection settings
#[derive(Args, Clone)]
struct OpenAiArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat model
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,
}

impl OpenAiArgs {
    /// Chat backend, or None when no API key is configured
    fn backend(&self) -> Result<Option<Arc<dyn ChatBackend>>> {
        let Some(key) = self.openai_api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let mut config = OpenAiClientConfig::default();
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(base_url) = &self.openai_base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }

        let client = OpenAiClient::with_config(key, config)?;
        Ok(Some(Arc::new(client)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Require this key on every API request
        #[arg(long, env = "HIREHIKER_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Maximum model rounds per assistant reply
        #[arg(long, default_value_t = DEFAULT_MAX_TOOL_ITERATIONS)]
        max_tool_iterations: u32,

        /// GitHub token for repository imports
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,

        #[command(flatten)]
        openai: OpenAiArgs,
    },
    /// Problem management
    Problem {
        #[command(subcommand)]
        action: ProblemAction,
    },
    /// Session management
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Generate (or regenerate) the analysis of a completed session
    Analyze {
        session_id: String,

        #[command(flatten)]
        openai: OpenAiArgs,
    },
    /// Show session counts
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProblemAction {
    /// List problems
    List,
    /// Show a problem
    Show { id: String },
    /// Create a problem from a YAML or JSON file
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a problem with its sessions
    Delete { id: String },
    /// Create a problem from a GitHub repository
    Import {
        /// owner/repo[@ref]
        repo: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, default_value = "medium")]
        difficulty: String,

        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions
    List {
        /// Filter by problem ID
        #[arg(long)]
        problem: Option<String>,

        /// Filter by status (pending, active, completed)
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show a session
    Show { id: String },
    /// Print a session transcript
    Transcript { id: String },
}

/// Problem definition file
#[derive(Debug, Deserialize)]
struct ProblemFile {
    title: String,
    description: String,
    difficulty: Difficulty,
    #[serde(default)]
    project_files: Vec<ProjectFile>,
    #[serde(default)]
    api_spec: Option<String>,
    #[serde(default)]
    bug_tickets: Vec<BugTicket>,
    #[serde(default)]
    source_repo: Option<String>,
}

impl ProblemFile {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid problem JSON in {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid problem YAML in {}", path.display()))?
        };
        Ok(parsed)
    }

    fn into_problem(self) -> Problem {
        let mut problem = Problem::new(self.title, self.description, self.difficulty)
            .with_files(self.project_files)
            .with_bug_tickets(self.bug_tickets);
        problem.api_spec = self.api_spec;
        problem.source_repo = self.source_repo;
        problem
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("Invalid ID: {}", id))
}

fn github_client(token: Option<String>) -> Result<GitHubClient> {
    let client = GitHubClient::new()?;
    Ok(match token.filter(|t| !t.trim().is_empty()) {
        Some(token) => client.with_token(token),
        None => client,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with CLI options
    init_logging(cli.verbose, cli.quiet, cli.log_json)?;

    // Expand home directory
    let db_path = PathBuf::from(shellexpand::tilde(&cli.db_path).to_string());
    let db = Database::new(&db_path).await?;

    match cli.command {
        Commands::Serve {
            port,
            api_key,
            max_tool_iterations,
            github_token,
            openai,
        } => {
            let mut state = AppState::new(db, api_key.clone()).with_github(github_client(github_token)?);

            match openai.backend()? {
                Some(backend) => {
                    let config = AssistantConfig {
                        max_tool_iterations,
                        ..Default::default()
                    };
                    state = state
                        .with_assistant(Assistant::new(backend.clone(), config))
                        .with_analyzer(Analyzer::new(backend));
                }
                None => warn!("OPENAI_API_KEY not set; chat and analysis are disabled"),
            }

            println!("Starting HireHiker on http://localhost:{}", port);
            if api_key.is_some() {
                println!("API key authentication enabled");
            }

            let app = create_router(Arc::new(state));
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
            info!("Listening on {}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }

        Commands::Problem { action } => match action {
            ProblemAction::List => {
                let problems = db.list_problems().await?;
                if problems.is_empty() {
                    println!("No problems found");
                } else {
                    println!("{:<36}  {:<8}  {:>5}  TITLE", "ID", "LEVEL", "FILES");
                    for p in problems {
                        println!(
                            "{:<36}  {:<8}  {:>5}  {}",
                            p.id,
                            p.difficulty.as_str(),
                            p.project_files.len(),
                            p.title
                        );
                    }
                }
            }
            ProblemAction::Show { id } => {
                let p = db.require_problem(parse_id(&id)?).await?;
                println!("ID:          {}", p.id);
                println!("Title:       {}", p.title);
                println!("Difficulty:  {}", p.difficulty.as_str());
                if let Some(repo) = &p.source_repo {
                    println!("Source:      {}", repo);
                }
                println!("Created:     {}", p.created_at.format("%Y-%m-%d %H:%M"));
                println!("\n{}\n", p.description.trim());

                println!("Files ({}):", p.project_files.len());
                for f in &p.project_files {
                    println!("  {} ({} bytes)", f.path, f.content.len());
                }
                if !p.bug_tickets.is_empty() {
                    println!("Bug tickets:");
                    for t in &p.bug_tickets {
                        println!("  {} [{}] {}", t.id, t.severity.as_str(), t.title);
                    }
                }
                if p.api_spec.is_some() {
                    println!("API spec: yes");
                }
            }
            ProblemAction::Create { file } => {
                let problem = ProblemFile::load(&file)?.into_problem();
                problem.validate()?;
                db.insert_problem(&problem).await?;
                println!("Created problem {} ({})", problem.id, problem.title);
            }
            ProblemAction::Delete { id } => {
                let id = parse_id(&id)?;
                if db.delete_problem(id).await? {
                    println!("Deleted problem {}", id);
                } else {
                    anyhow::bail!("Problem not found: {}", id);
                }
            }
            ProblemAction::Import {
                repo,
                title,
                description,
                difficulty,
                github_token,
            } => {
                let repo = RepoRef::parse(&repo)?;
                let difficulty = Difficulty::from_str(&difficulty)?;
                let client = github_client(github_token)?;

                println!("Downloading {}...", repo);
                let files = fetch_project_files(&client, &repo).await?;

                let problem = Problem::new(
                    title.unwrap_or_else(|| repo.repo.clone()),
                    description.unwrap_or_else(|| format!("Imported from {}", repo)),
                    difficulty,
                )
                .with_files((*files).clone())
                .with_source_repo(repo.to_string());
                problem.validate()?;
                db.insert_problem(&problem).await?;

                println!(
                    "Created problem {} with {} files",
                    problem.id,
                    problem.project_files.len()
                );
            }
        },

        Commands::Session { action } => match action {
            SessionAction::List {
                problem,
                status,
                limit,
            } => {
                let filter = SessionFilter {
                    problem_id: problem.as_deref().map(parse_id).transpose()?,
                    status: status.as_deref().map(SessionStatus::from_str).transpose()?,
                    limit,
                };
                let sessions = db.list_sessions(&filter).await?;
                if sessions.is_empty() {
                    println!("No sessions found");
                } else {
                    println!("{:<36}  {:<9}  {:<20}  CREATED", "ID", "STATUS", "CANDIDATE");
                    for s in sessions {
                        println!(
                            "{:<36}  {:<9}  {:<20}  {}",
                            s.id,
                            s.status.as_str(),
                            s.candidate_name,
                            s.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            SessionAction::Show { id } => {
                let id = parse_id(&id)?;
                let s = db.require_session(id).await?;
                let problem = db.require_problem(s.problem_id).await?;
                let message_count = db.count_messages(id).await?;

                println!("ID:         {}", s.id);
                println!("Candidate:  {}", s.candidate_name);
                if let Some(email) = &s.candidate_email {
                    println!("Email:      {}", email);
                }
                println!("Problem:    {} ({})", problem.title, problem.id);
                println!("Status:     {}", s.status.as_str());
                println!("Messages:   {}", message_count);
                if let Some(duration) = s.duration() {
                    println!("Duration:   {}m {}s", duration.num_minutes(), duration.num_seconds() % 60);
                }

                if let Some(analysis) = db.get_analysis(id).await? {
                    println!(
                        "Score:      {:.1} ({})",
                        analysis.quality_score,
                        analysis.grade()
                    );
                    println!("Summary:    {}", analysis.summary);
                }
            }
            SessionAction::Transcript { id } => {
                let id = parse_id(&id)?;
                db.require_session(id).await?;
                let messages = db.get_messages(id).await?;
                if messages.is_empty() {
                    println!("No messages");
                }
                for m in messages {
                    let who = match m.role {
                        MessageRole::User => "Candidate",
                        MessageRole::Assistant => "Assistant",
                    };
                    println!("[{}] {}:", m.created_at.format("%H:%M:%S"), who);
                    println!("{}\n", m.content);
                }
            }
        },

        Commands::Analyze { session_id, openai } => {
            let id = parse_id(&session_id)?;
            let session = db.require_session(id).await?;
            if session.status != SessionStatus::Completed {
                anyhow::bail!(
                    "Session {} is {}; only completed sessions can be analyzed",
                    id,
                    session.status.as_str()
                );
            }
            let backend = openai
                .backend()?
                .context("OPENAI_API_KEY is required for analysis")?;

            let problem = db.require_problem(session.problem_id).await?;
            let messages = db.get_messages(id).await?;
            let analysis = Analyzer::new(backend)
                .analyze(&problem, &session, &messages)
                .await?;
            db.upsert_analysis(&analysis).await?;

            println!(
                "Score: {:.1} ({})",
                analysis.quality_score,
                analysis.grade()
            );
            let d = &analysis.dimension_scores;
            println!(
                "  clarity {:.0}  specificity {:.0}  context {:.0}  problem solving {:.0}",
                d.clarity, d.specificity, d.context, d.problem_solving
            );
            for s in &analysis.strengths {
                println!("  + {}", s);
            }
            for i in &analysis.improvements {
                println!("  - {}", i);
            }
            println!("\n{}", analysis.summary);
        }

        Commands::Status { json } => {
            let counts = db.count_sessions_by_status().await?;
            let problems = db.count_problems().await?;

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "problems": problems,
                        "sessions": counts.total(),
                        "pending": counts.pending,
                        "active": counts.active,
                        "completed": counts.completed,
                    })
                );
            } else {
                println!("Problems:   {}", problems);
                println!("Sessions:   {}", counts.total());
                println!("  pending:   {}", counts.pending);
                println!("  active:    {}", counts.active);
                println!("  completed: {}", counts.completed);
            }
        }
    }

    Ok(())
}
