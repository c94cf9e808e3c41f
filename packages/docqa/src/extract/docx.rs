//! Word documents.
//!
//! The file is read as (lossy) text and the `<w:t>` text runs of the
//! WordprocessingML body are scraped with a regex. Files without runs fall
//! back to keeping lines that read like prose.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{title_header, ExtractionMethod, Extracted};

lazy_static! {
    static ref TEXT_RUN_REGEX: Regex = Regex::new(r"<w:t[^>]*>([^<]+)</w:t>").unwrap();
    static ref WORD_REGEX: Regex = Regex::new(r"[a-zA-Z]{3,}").unwrap();
}

const NO_TEXT_NOTICE: &str = "This document appears to contain primarily non-text content \
or uses an encoding that cannot be directly extracted.";

pub(super) fn extract(file_name: &str, bytes: &[u8]) -> Extracted {
    let content = String::from_utf8_lossy(bytes);
    let mut output = title_header(file_name);

    let runs: Vec<String> = TEXT_RUN_REGEX
        .captures_iter(&content)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()))
        .filter(|run| !run.trim().is_empty())
        .collect();

    if !runs.is_empty() {
        debug!(file_name = %file_name, runs = runs.len(), "Found WordprocessingML text runs");
        output.push_str(&join_runs(&runs));
        return Extracted::new(output, ExtractionMethod::DocxXml);
    }

    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| looks_like_prose(line))
        .collect();

    if !lines.is_empty() {
        debug!(file_name = %file_name, lines = lines.len(), "Using plain-line fallback");
        output.push_str(&lines.join("\n"));
        return Extracted::new(output, ExtractionMethod::DocxPlaintext);
    }

    output.push_str(NO_TEXT_NOTICE);
    Extracted::new(output, ExtractionMethod::Placeholder)
}

/// Join runs with single spaces, except after a trailing hyphen.
fn join_runs(runs: &[String]) -> String {
    let mut joined = String::new();
    for run in runs {
        if !joined.is_empty() && !joined.ends_with('-') && !joined.ends_with(' ') {
            joined.push(' ');
        }
        joined.push_str(run);
    }
    joined.trim().to_string()
}

fn looks_like_prose(line: &str) -> bool {
    line.len() > 5
        && WORD_REGEX.is_match(line)
        && !line.starts_with('<')
        && !line.contains("<?xml")
        && !line.contains("xmlns:")
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs_xml(runs: &[&str]) -> String {
        let body: String = runs
            .iter()
            .map(|r| format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, r))
            .collect();
        format!(
            r#"<?xml version="1.0"?><w:document xmlns:w="x"><w:body><w:p>{}</w:p></w:body></w:document>"#,
            body
        )
    }

    #[test]
    fn test_runs_joined_with_spacing_rules() {
        let xml = runs_xml(&["Project Proposal.", "Scope is", "well-", "defined", "here"]);
        let extracted = extract("proposal.docx", xml.as_bytes());

        assert_eq!(extracted.method, ExtractionMethod::DocxXml);
        assert_eq!(
            extracted.text,
            "# proposal.docx\n\nProject Proposal. Scope is well-defined here"
        );
    }

    #[test]
    fn test_entities_decoded() {
        let xml = runs_xml(&["R&amp;D &lt;budget&gt;"]);
        let extracted = extract("a.docx", xml.as_bytes());
        assert!(extracted.text.ends_with("R&D <budget>"));
    }

    #[test]
    fn test_whitespace_runs_skipped() {
        let xml = runs_xml(&["Hello", "   ", "world"]);
        assert!(extract("a.docx", xml.as_bytes()).text.ends_with("Hello world"));
    }

    #[test]
    fn test_plain_line_fallback() {
        let content = "<?xml version=\"1.0\"?>\n<root xmlns:w=\"x\">\n  Quarterly budget summary  \n12345 678\nok\n";
        let extracted = extract("old.doc", content.as_bytes());

        assert_eq!(extracted.method, ExtractionMethod::DocxPlaintext);
        assert_eq!(extracted.text, "# old.doc\n\nQuarterly budget summary");
    }

    #[test]
    fn test_placeholder_when_nothing_readable() {
        let extracted = extract("blob.docx", &[0x50, 0x4b, 0x03, 0x04, 0x00, 0x01]);
        assert_eq!(extracted.method, ExtractionMethod::Placeholder);
        assert!(extracted.text.starts_with("# blob.docx\n\n"));
        assert!(extracted.text.contains("non-text content"));
    }
}
