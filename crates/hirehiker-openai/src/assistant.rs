//! The debugging assistant candidates chat with
//!
//! Each reply runs a bounded tool-calling loop: the model may call the
//! read-only project tools, and the final permitted round is sent without
//! tools so the model has to answer in text.

use anyhow::{anyhow, Result};
use hirehiker_core::{Message, MessageRole, Problem};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::{ChatBackend, ChatMessage, ChatRequest};
use crate::context::ContextManager;
use crate::tools::ToolExecutor;

/// Default cap on model rounds per reply
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 5;

/// Configuration for the assistant
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Model name; empty uses the backend's default
    pub model: String,
    /// Maximum model rounds per reply, including the final text round
    pub max_tool_iterations: u32,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            temperature: Some(0.3),
            max_tokens: Some(1_500),
        }
    }
}

/// A finished assistant answer
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub content: String,
    /// Number of tool calls executed while producing the answer
    pub tool_calls_made: usize,
    /// Number of model rounds used
    pub rounds: u32,
}

/// Debugging assistant runner
#[derive(Clone)]
pub struct Assistant {
    backend: Arc<dyn ChatBackend>,
    config: AssistantConfig,
}

impl Assistant {
    pub fn new(backend: Arc<dyn ChatBackend>, config: AssistantConfig) -> Self {
        Self { backend, config }
    }

    fn model(&self) -> String {
        if self.config.model.is_empty() {
            self.backend.default_model().to_string()
        } else {
            self.config.model.clone()
        }
    }

    /// Answer the latest candidate message given the whole transcript
    pub async fn reply(&self, problem: &Problem, history: &[Message]) -> Result<AssistantReply> {
        let model = self.model();
        let tools = ToolExecutor::new(problem);
        let window = ContextManager::for_model(&model).window_messages(history);
        if window.dropped_count > 0 {
            debug!(
                "Dropped {} older messages for problem {}",
                window.dropped_count, problem.id
            );
        }

        let mut messages = vec![ChatMessage::system(system_prompt(problem))];
        if let Some(summary) = window.summary {
            messages.push(ChatMessage::system(summary));
        }
        messages.extend(window.messages.iter().map(to_chat_message));

        let max_rounds = self.config.max_tool_iterations.max(1);
        let mut tool_calls_made = 0;

        for round in 1..=max_rounds {
            let final_round = round == max_rounds;
            debug!("Assistant round {}/{}", round, max_rounds);

            let request = ChatRequest {
                model: model.clone(),
                messages: messages.clone(),
                tools: (!final_round).then(ToolExecutor::definitions),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };

            let response = self.backend.complete(request).await?;
            let message = response
                .first_message()
                .cloned()
                .ok_or_else(|| anyhow!("Model returned no choices"))?;

            let calls = message.tool_calls.clone().unwrap_or_default();
            if calls.is_empty() || final_round {
                if final_round && !calls.is_empty() {
                    warn!("Model requested tools after the iteration cap; ignoring");
                }
                let content = message.content.unwrap_or_default().trim().to_string();
                if content.is_empty() {
                    anyhow::bail!("Model returned an empty reply");
                }

                info!(
                    "Assistant replied after {} round(s), {} tool call(s)",
                    round, tool_calls_made
                );
                return Ok(AssistantReply {
                    content,
                    tool_calls_made,
                    rounds: round,
                });
            }

            messages.push(ChatMessage::assistant_tool_calls(
                message.content.clone(),
                calls.clone(),
            ));
            for call in &calls {
                tool_calls_made += 1;
                let output = tools.execute(&call.function.name, &call.function.arguments);
                messages.push(ChatMessage::tool(&call.id, output));
            }
        }

        Err(anyhow!("Tool loop ended without a reply"))
    }
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::User => ChatMessage::user(&message.content),
        MessageRole::Assistant => ChatMessage::assistant(&message.content),
    }
}

/// System prompt describing the exercise to the model
pub fn system_prompt(problem: &Problem) -> String {
    let mut prompt = format!(
        r#"You are a senior engineer helping a candidate debug a sample project during a technical interview.

Project: {}
Difficulty: {}

{}

Answer the candidate's questions accurately and concisely. Use the tools to look at the project
instead of guessing. Answer what was asked: do not hand over a complete fix unless the candidate
asks for one explicitly. Put code in fenced code blocks with a language tag.
"#,
        problem.title,
        problem.difficulty.as_str(),
        problem.description.trim()
    );

    if !problem.bug_tickets.is_empty() {
        prompt.push_str("\nOpen bug tickets:\n");
        for ticket in &problem.bug_tickets {
            prompt.push_str(&format!(
                "- {} [{}] {}\n",
                ticket.id,
                ticket.severity.as_str(),
                ticket.title
            ));
        }
    }

    if !problem.project_files.is_empty() {
        prompt.push_str(&format!(
            "\nThe project has {} files; call list_files to see them.\n",
            problem.project_files.len()
        ));
    }

    if problem.api_spec.is_some() {
        prompt.push_str("An API specification is available through get_api_spec.\n");
    }

    prompt
}
