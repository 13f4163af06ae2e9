//! Token estimation and transcript windowing
//!
//! Long sessions can outgrow the model's context window. The context manager
//! keeps the most recent turns and replaces older ones with a short note.

use hirehiker_core::{Message, MessageRole};

/// Approximate characters per token for English text and code
const CHARS_PER_TOKEN: f64 = 4.0;

/// Per-message overhead for role and structure
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Model context limits
#[derive(Debug, Clone, Copy)]
pub struct ModelLimits {
    /// Maximum context window size
    pub max_context_tokens: usize,
    /// Tokens reserved for the system prompt (problem description, file list)
    pub system_prompt_reserve: usize,
    /// Tokens reserved for tool definitions and tool round-trips
    pub tools_reserve: usize,
    /// Tokens reserved for the reply
    pub output_reserve: usize,
}

impl ModelLimits {
    /// GPT-4o family limits
    pub fn gpt_4o() -> Self {
        Self {
            max_context_tokens: 128_000,
            system_prompt_reserve: 8_000,
            tools_reserve: 24_000,
            output_reserve: 4_096,
        }
    }

    /// Original GPT-4 limits
    pub fn gpt_4() -> Self {
        Self {
            max_context_tokens: 8_192,
            system_prompt_reserve: 2_000,
            tools_reserve: 2_000,
            output_reserve: 1_024,
        }
    }

    /// Get limits for a model name
    pub fn for_model(model: &str) -> Self {
        if model == "gpt-4" || model.starts_with("gpt-4-0") {
            Self::gpt_4()
        } else {
            Self::gpt_4o()
        }
    }

    /// Calculate available tokens for transcript messages
    pub fn available_for_messages(&self) -> usize {
        self.max_context_tokens
            .saturating_sub(self.system_prompt_reserve)
            .saturating_sub(self.tools_reserve)
            .saturating_sub(self.output_reserve)
    }
}

/// Token estimator for messages and text
#[derive(Debug, Clone, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Estimate tokens for a string
    pub fn estimate_text(&self, text: &str) -> usize {
        let char_count = text.chars().count();
        ((char_count as f64) / CHARS_PER_TOKEN).ceil() as usize
    }

    /// Estimate tokens for a message
    pub fn estimate_message(&self, message: &Message) -> usize {
        self.estimate_text(&message.content) + MESSAGE_OVERHEAD_TOKENS
    }

    /// Estimate total tokens for a list of messages
    pub fn estimate_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}

/// Result of transcript windowing
#[derive(Debug, Clone)]
pub struct WindowedMessages {
    /// Note describing the omitted turns (if any were dropped)
    pub summary: Option<String>,
    /// Messages to include in the request
    pub messages: Vec<Message>,
    /// Token estimate of included messages
    pub message_tokens: usize,
    /// Number of messages that were dropped
    pub dropped_count: usize,
}

/// Context manager for transcript windowing
#[derive(Debug, Clone)]
pub struct ContextManager {
    limits: ModelLimits,
    /// Number of recent messages always kept
    min_recent_messages: usize,
    estimator: TokenEstimator,
}

impl ContextManager {
    pub fn new(limits: ModelLimits) -> Self {
        Self {
            limits,
            min_recent_messages: 4,
            estimator: TokenEstimator::new(),
        }
    }

    /// Create with limits for a model
    pub fn for_model(model: &str) -> Self {
        Self::new(ModelLimits::for_model(model))
    }

    pub fn with_min_recent(mut self, count: usize) -> Self {
        self.min_recent_messages = count;
        self
    }

    /// Keep the newest messages that fit the budget
    pub fn window_messages(&self, messages: &[Message]) -> WindowedMessages {
        let budget = self.limits.available_for_messages();
        let total_tokens = self.estimator.estimate_messages(messages);

        if total_tokens <= budget {
            return WindowedMessages {
                summary: None,
                messages: messages.to_vec(),
                message_tokens: total_tokens,
                dropped_count: 0,
            };
        }

        let min_recent = self.min_recent_messages.min(messages.len());
        let mut included_tokens = 0;
        let mut start_idx = messages.len();

        for (i, msg) in messages.iter().enumerate().rev() {
            let msg_tokens = self.estimator.estimate_message(msg);
            let kept = messages.len() - i;
            if kept <= min_recent || included_tokens + msg_tokens <= budget {
                included_tokens += msg_tokens;
                start_idx = i;
            } else {
                break;
            }
        }

        let dropped = &messages[..start_idx];
        let summary = (!dropped.is_empty()).then(|| summarize(dropped));

        WindowedMessages {
            summary,
            messages: messages[start_idx..].to_vec(),
            message_tokens: included_tokens,
            dropped_count: start_idx,
        }
    }
}

/// Short note standing in for dropped turns, without an extra model call
fn summarize(messages: &[Message]) -> String {
    let questions: Vec<&Message> = messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .collect();

    let mut parts = vec![format!(
        "[Earlier conversation: {} messages ({} candidate questions) omitted for length]",
        messages.len(),
        questions.len()
    )];

    // Last few questions keep the thread of the investigation
    let start = questions.len().saturating_sub(3);
    for q in &questions[start..] {
        let preview: String = q.content.chars().take(120).collect();
        parts.push(format!("- Candidate asked: {}", preview));
    }

    parts.join("\n")
}
