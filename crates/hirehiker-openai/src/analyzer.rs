//! Scores a finished session by the quality of the candidate's questions

use anyhow::{anyhow, Context, Result};
use hirehiker_core::analysis::clamp_score;
use hirehiker_core::{Analysis, DimensionScores, Message, MessageRole, Problem, Session};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{ChatBackend, ChatMessage, ChatRequest};
use crate::markdown::first_code_block;

/// Assistant turns are shortened to this many characters in the transcript
const ASSISTANT_EXCERPT_CHARS: usize = 600;

const ANALYSIS_INSTRUCTIONS: &str = r#"You evaluate job candidates by the quality of the questions they ask an AI assistant while debugging a codebase.
Score only the candidate's questions; the assistant's answers are context.

Dimensions (0-100 each):
- clarity: questions are easy to understand and unambiguous
- specificity: questions target concrete files, functions, inputs or symptoms
- context: questions share what the candidate already tried, observed or suspects
- problem_solving: questions form a strategy (hypotheses, narrowing down, verifying the fix)

Respond with a single JSON object inside a ```json code block:
{
  "quality_score": <0-100 overall>,
  "dimension_scores": {"clarity": n, "specificity": n, "context": n, "problem_solving": n},
  "strengths": ["..."],
  "improvements": ["..."],
  "summary": "two or three sentences for the recruiter"
}"#;

/// Analysis generator
#[derive(Clone)]
pub struct Analyzer {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            model: String::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Generate an analysis of the session transcript
    pub async fn analyze(
        &self,
        problem: &Problem,
        session: &Session,
        messages: &[Message],
    ) -> Result<Analysis> {
        let question_count = messages.iter().filter(|m| m.is_from_candidate()).count();
        if question_count == 0 {
            anyhow::bail!("Session {} has no candidate questions to analyze", session.id);
        }

        let model = if self.model.is_empty() {
            self.backend.default_model().to_string()
        } else {
            self.model.clone()
        };

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage::system(ANALYSIS_INSTRUCTIONS),
                ChatMessage::user(build_transcript(problem, messages)),
            ],
            tools: None,
            temperature: Some(0.0),
            max_tokens: Some(1_000),
        };

        debug!(
            "Analyzing session {} ({} questions)",
            session.id, question_count
        );
        let response = self.backend.complete(request).await?;
        let content = response
            .first_message()
            .and_then(|m| m.content.clone())
            .ok_or_else(|| anyhow!("Model returned no analysis"))?;

        let analysis = parse_analysis(session, &content)?;
        info!(
            "Session {} scored {:.1} ({})",
            session.id,
            analysis.quality_score,
            analysis.grade()
        );
        Ok(analysis)
    }
}

/// Transcript text sent for scoring
pub fn build_transcript(problem: &Problem, messages: &[Message]) -> String {
    let mut out = format!(
        "Problem: {} ({})\n{}\n\nTranscript:\n",
        problem.title,
        problem.difficulty.as_str(),
        problem.description.trim()
    );

    let mut question_no = 0;
    for message in messages {
        match message.role {
            MessageRole::User => {
                question_no += 1;
                out.push_str(&format!("\n[Q{}] Candidate: {}\n", question_no, message.content.trim()));
            }
            MessageRole::Assistant => {
                let excerpt: String = message.content.chars().take(ASSISTANT_EXCERPT_CHARS).collect();
                let ellipsis = if message.content.chars().count() > ASSISTANT_EXCERPT_CHARS {
                    " ..."
                } else {
                    ""
                };
                out.push_str(&format!("Assistant: {}{}\n", excerpt.trim(), ellipsis));
            }
        }
    }

    out
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    quality_score: Option<f64>,
    #[serde(default)]
    dimension_scores: RawDimensions,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawDimensions {
    #[serde(default)]
    clarity: Option<f64>,
    #[serde(default)]
    specificity: Option<f64>,
    #[serde(default)]
    context: Option<f64>,
    #[serde(default)]
    problem_solving: Option<f64>,
}

impl RawDimensions {
    /// Clamp the scores given; missing ones take the mean of the rest
    fn resolve(&self) -> DimensionScores {
        let present: Vec<f64> = [self.clarity, self.specificity, self.context, self.problem_solving]
            .into_iter()
            .flatten()
            .map(clamp_score)
            .collect();
        let mean = if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        };

        DimensionScores {
            clarity: self.clarity.unwrap_or(mean),
            specificity: self.specificity.unwrap_or(mean),
            context: self.context.unwrap_or(mean),
            problem_solving: self.problem_solving.unwrap_or(mean),
        }
        .clamped()
    }
}

/// Parse the model's answer: first ```json block, else the whole body
pub fn parse_analysis(session: &Session, content: &str) -> Result<Analysis> {
    let json = first_code_block(content, "json")
        .map(|b| b.code)
        .unwrap_or_else(|| content.trim().to_string());

    let raw: RawAnalysis =
        serde_json::from_str(&json).context("Analysis response was not valid JSON")?;

    let dimensions = raw.dimension_scores.resolve();
    let quality_score = raw.quality_score.unwrap_or_else(|| dimensions.average());

    Ok(Analysis::new(
        session.id,
        quality_score,
        dimensions,
        raw.strengths,
        raw.improvements,
        raw.summary,
    ))
}
