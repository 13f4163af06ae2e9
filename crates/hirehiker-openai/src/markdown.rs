//! Fenced code-block extraction from model output

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches ```lang\n ... ``` blocks; fences must open a line and the info string is optional
static CODE_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^[ \t]*```[ \t]*([A-Za-z0-9_+.#-]*)[^\n]*\n(.*?)^[ \t]*```")
        .expect("Invalid regex")
});

/// A fenced code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info-string language, lowercased (`None` for bare fences)
    pub language: Option<String>,
    pub code: String,
}

/// Extract every fenced code block in order of appearance
pub fn extract_code_blocks(markdown: &str) -> Vec<CodeBlock> {
    CODE_BLOCK_REGEX
        .captures_iter(markdown)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str().trim().to_lowercase())
                .filter(|l| !l.is_empty());
            let code = caps
                .get(2)
                .map(|m| m.as_str().trim_end_matches(['\n', '\r']).to_string())
                .unwrap_or_default();
            CodeBlock { language, code }
        })
        .collect()
}

/// First block tagged with `language`, falling back to the first untagged block
pub fn first_code_block(markdown: &str, language: &str) -> Option<CodeBlock> {
    let blocks = extract_code_blocks(markdown);
    let wanted = language.to_lowercase();

    let tagged = blocks
        .iter()
        .position(|b| b.language.as_deref() == Some(wanted.as_str()));
    let untagged = blocks.iter().position(|b| b.language.is_none());

    tagged.or(untagged).map(|i| blocks[i].clone())
}
