//! Rule-based answers for document analysis mode.
//!
//! The responder classifies a question by keyword, then builds a
//! markdown answer from document statistics, heading-like lines, and line
//! search. Output is deterministic for a given `(query, text)` pair.

pub mod recommend;

use serde::{Deserialize, Serialize};

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Llm,
    HeuristicSummary,
    HeuristicSearch,
    HeuristicDefault,
    Error,
}

impl ResponseSource {
    pub fn is_heuristic(&self) -> bool {
        matches!(
            self,
            ResponseSource::HeuristicSummary
                | ResponseSource::HeuristicSearch
                | ResponseSource::HeuristicDefault
        )
    }
}

/// A displayed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Markdown-like text.
    pub body: String,
    pub source: ResponseSource,
}

impl Response {
    pub fn new(body: impl Into<String>, source: ResponseSource) -> Self {
        Self {
            body: body.into(),
            source,
        }
    }
}

/// What kind of answer a question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Summary,
    Search,
    Default,
}

impl QueryIntent {
    /// Classify by substring. Summary wins over search.
    pub fn classify(query: &str) -> Self {
        let query = query.to_lowercase();
        if query.contains("summary") || query.contains("about") {
            QueryIntent::Summary
        } else if query.contains("find") || query.contains("search") {
            QueryIntent::Search
        } else {
            QueryIntent::Default
        }
    }
}

/// Line, word, and character counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentStats {
    /// Non-blank lines.
    pub lines: usize,
    pub words: usize,
    pub chars: usize,
}

impl DocumentStats {
    pub fn compute(text: &str) -> Self {
        Self {
            lines: text.lines().filter(|l| !l.trim().is_empty()).count(),
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
        }
    }
}

/// Words dropped from a search question before matching.
const STOP_WORDS: &[&str] = &[
    "find", "search", "for", "about", "where", "is", "are", "show", "me",
];

/// Tunables for [`HeuristicResponder`].
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub summary_preview_chars: usize,
    pub default_preview_min: usize,
    pub default_preview_max: usize,
    pub significant_lines: usize,
    pub search_results: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            summary_preview_chars: 400,
            default_preview_min: 100,
            default_preview_max: 500,
            significant_lines: 5,
            search_results: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicResponder {
    config: ResponderConfig,
}

impl HeuristicResponder {
    pub fn new(config: ResponderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Answer `query` from `text`. Never fails.
    pub fn respond(&self, query: &str, text: &str) -> Response {
        match QueryIntent::classify(query) {
            QueryIntent::Summary => self.summary(text),
            QueryIntent::Search => self.search(query, text),
            QueryIntent::Default => self.default_answer(text),
        }
    }

    pub fn summary(&self, text: &str) -> Response {
        let stats = DocumentStats::compute(text);
        let lines: Vec<&str> = non_blank_lines(text).collect();
        let title = lines.first().copied().unwrap_or("Untitled Document");

        let key_content = lines
            .iter()
            .filter(|line| is_significant(line))
            .take(self.config.significant_lines)
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n");

        let body = format!(
            "## Document Summary\n\n\
             **Document Title/First Line**: {title}\n\n\
             **Document Statistics**:\n\
             - Contains {lines} lines of text\n\
             - Contains approximately {words} words\n\
             - Total length: {chars} characters\n\n\
             **Key Content**:\n{key_content}\n\n\
             **Document Preview**:\n```\n{preview}\n```\n\n\
             This is based on the actual content of your document.",
            title = title,
            lines = stats.lines,
            words = stats.words,
            chars = stats.chars,
            key_content = key_content,
            preview = preview(text, self.config.summary_preview_chars),
        );
        Response::new(body, ResponseSource::HeuristicSummary)
    }

    pub fn search(&self, query: &str, text: &str) -> Response {
        let terms = search_terms(query);
        if terms.is_empty() {
            return Response::new(
                "I couldn't identify specific search terms in your query. \
                 Please try again with more specific terms to search for in the document.",
                ResponseSource::HeuristicSearch,
            );
        }
        let term_list = terms.join(", ");

        let matches: Vec<&str> = non_blank_lines(text)
            .filter(|line| {
                let line = line.to_lowercase();
                terms.iter().any(|term| line.contains(term.as_str()))
            })
            .collect();

        if matches.is_empty() {
            return Response::new(
                format!(
                    "I couldn't find any content matching \"{}\" in your document. \
                     Please try different search terms.",
                    term_list
                ),
                ResponseSource::HeuristicSearch,
            );
        }

        let shown = matches
            .iter()
            .take(self.config.search_results)
            .enumerate()
            .map(|(i, line)| format!("{}. {}", i + 1, line))
            .collect::<Vec<_>>()
            .join("\n");
        let more = match matches.len().checked_sub(self.config.search_results) {
            Some(hidden) if hidden > 0 => format!("\n...and {} more matches.", hidden),
            _ => String::new(),
        };

        let body = format!(
            "## Search Results for \"{}\"\n\n\
             Found {} matching lines in your document:\n\n\
             {}\n{}\n\n\
             This search was performed on the actual content of your document.",
            term_list,
            matches.len(),
            shown,
            more
        );
        Response::new(body, ResponseSource::HeuristicSearch)
    }

    pub fn default_answer(&self, text: &str) -> Response {
        let stats = DocumentStats::compute(text);
        let length = stats
            .chars
            .max(self.config.default_preview_min)
            .min(self.config.default_preview_max);

        let body = format!(
            "## Document Content Analysis\n\n\
             Your document contains {} lines and approximately {} words.\n\n\
             **Document Preview**:\n```\n{}\n```\n\n\
             This is showing the actual content of your document. \
             To see specific information, try asking more specific questions like:\n\
             - \"What is this document about?\"\n\
             - \"Find mentions of [specific term]\"\n\
             - \"Give me a summary of this document\"",
            stats.lines,
            stats.words,
            preview(text, length)
        );
        Response::new(body, ResponseSource::HeuristicDefault)
    }
}

/// Search terms left after dropping stop words and short tokens.
///
/// Stop words are removed only as whole tokens, so "research" and
/// "isolation" survive intact rather than losing their "search" or "is".
pub fn search_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| token.chars().count() > 2 && !STOP_WORDS.contains(token))
        .map(String::from)
        .collect()
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Heading-like or structurally interesting line.
fn is_significant(line: &str) -> bool {
    let len = line.chars().count();
    line == line.to_uppercase()
        || (len > 10 && len < 50)
        || line.ends_with(':')
        || line
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .unwrap_or(false)
}

/// First `max_chars` characters, with an ellipsis when cut.
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
