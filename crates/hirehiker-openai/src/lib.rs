//! HireHiker OpenAI - chat-completions integration
//!
//! This crate provides the LLM side of an interview session:
//! - API client for the OpenAI chat-completions endpoint
//! - Read-only project tools exposed to the model
//! - The capped tool-calling assistant loop
//! - Transcript windowing for long sessions
//! - Question-quality analysis of finished sessions

pub mod analyzer;
pub mod assistant;
pub mod client;
pub mod context;
pub mod markdown;
pub mod tools;

pub use analyzer::Analyzer;
pub use assistant::{Assistant, AssistantConfig, AssistantReply, DEFAULT_MAX_TOOL_ITERATIONS};
pub use client::{
    ChatBackend, ChatMessage, ChatRequest, ChatResponse, Choice, OpenAiClient, OpenAiClientConfig,
    ToolCall, ToolDefinition, DEFAULT_MODEL,
};
pub use context::{ContextManager, ModelLimits, TokenEstimator};
pub use markdown::{extract_code_blocks, first_code_block, CodeBlock};
pub use tools::ToolExecutor;
