//! Read-only tools the assistant can call while helping a candidate
//!
//! Every tool works on the problem's embedded data; nothing touches the
//! host filesystem or network.

use anyhow::{anyhow, Result};
use hirehiker_core::Problem;
use regex::RegexBuilder;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::ToolDefinition;

/// Largest file body returned by `read_file`
pub const MAX_READ_BYTES: usize = 64 * 1024;

/// Most hits returned by `search_files`
pub const MAX_SEARCH_HITS: usize = 50;

/// Tool executor bound to one problem
pub struct ToolExecutor<'a> {
    problem: &'a Problem,
}

impl<'a> ToolExecutor<'a> {
    /// Create a new tool executor
    pub fn new(problem: &'a Problem) -> Self {
        Self { problem }
    }

    /// Get tool definitions for the chat request
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::function(
                "list_files",
                "List every file path in the candidate's project",
                json!({"type": "object", "properties": {}}),
            ),
            ToolDefinition::function(
                "read_file",
                "Read the content of a project file",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path relative to the project root"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            ToolDefinition::function(
                "search_files",
                "Search project files with a regular expression (case-insensitive)",
                json!({
                    "type": "object",
                    "properties": {
                        "pattern": {
                            "type": "string",
                            "description": "Regular expression"
                        }
                    },
                    "required": ["pattern"]
                }),
            ),
            ToolDefinition::function(
                "get_bug_ticket",
                "Get the full text of a bug ticket",
                json!({
                    "type": "object",
                    "properties": {
                        "id": {
                            "type": "string",
                            "description": "Ticket ID, e.g. BUG-1"
                        }
                    },
                    "required": ["id"]
                }),
            ),
            ToolDefinition::function(
                "get_api_spec",
                "Get the API specification shipped with the project",
                json!({"type": "object", "properties": {}}),
            ),
        ]
    }

    /// Execute a tool call; failures come back as `Error: ...` text
    pub fn execute(&self, name: &str, arguments: &str) -> String {
        debug!("Executing tool {} with {}", name, arguments);

        let result = parse_arguments(arguments).and_then(|args| match name {
            "list_files" => Ok(self.list_files()),
            "read_file" => self.read_file(&args),
            "search_files" => self.search_files(&args),
            "get_bug_ticket" => self.get_bug_ticket(&args),
            "get_api_spec" => Ok(self.get_api_spec()),
            _ => Err(anyhow!("Unknown tool: {}", name)),
        });

        match result {
            Ok(output) => output,
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                format!("Error: {}", e)
            }
        }
    }

    fn list_files(&self) -> String {
        if self.problem.project_files.is_empty() {
            return "The project has no files.".to_string();
        }
        let mut paths: Vec<&str> = self
            .problem
            .project_files
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        paths.sort_unstable();
        paths.join("\n")
    }

    fn read_file(&self, args: &Value) -> Result<String> {
        let path = required_str(args, "path")?;
        let file = self
            .problem
            .file(path)
            .ok_or_else(|| anyhow!("File not found: {}", path))?;

        if file.content.len() <= MAX_READ_BYTES {
            return Ok(file.content.clone());
        }

        let mut end = MAX_READ_BYTES;
        while !file.content.is_char_boundary(end) {
            end -= 1;
        }
        Ok(format!(
            "{}\n... [truncated, {} bytes total]",
            &file.content[..end],
            file.content.len()
        ))
    }

    fn search_files(&self, args: &Value) -> Result<String> {
        let pattern = required_str(args, "pattern")?;
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(1 << 20)
            .build()
            .map_err(|e| anyhow!("Invalid pattern: {}", e))?;

        let mut hits = Vec::new();
        'files: for file in &self.problem.project_files {
            for (line_no, line) in file.content.lines().enumerate() {
                if re.is_match(line) {
                    hits.push(format!("{}:{}: {}", file.path, line_no + 1, line.trim()));
                    if hits.len() >= MAX_SEARCH_HITS {
                        break 'files;
                    }
                }
            }
        }

        if hits.is_empty() {
            Ok(format!("No matches for '{}'", pattern))
        } else {
            Ok(hits.join("\n"))
        }
    }

    fn get_bug_ticket(&self, args: &Value) -> Result<String> {
        let id = required_str(args, "id")?;
        let ticket = self
            .problem
            .bug_ticket(id)
            .ok_or_else(|| anyhow!("Bug ticket not found: {}", id))?;
        Ok(format!(
            "{} [{}] {}\n\n{}",
            ticket.id,
            ticket.severity.as_str(),
            ticket.title,
            ticket.description
        ))
    }

    fn get_api_spec(&self) -> String {
        self.problem
            .api_spec
            .clone()
            .unwrap_or_else(|| "This project has no API specification.".to_string())
    }
}

fn parse_arguments(arguments: &str) -> Result<Value> {
    if arguments.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(arguments).map_err(|e| anyhow!("Invalid tool arguments: {}", e))
}

fn required_str<'v>(args: &'v Value, key: &str) -> Result<&'v str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing required argument: {}", key))
}
