//! HTML rendering for answers and document previews.
//!
//! Document text and answers are untrusted: every span of text is escaped
//! before any markup is added around it.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BOLD_REGEX: Regex = Regex::new(r"\*\*(.+?)\*\*").unwrap();
    static ref ORDERED_ITEM_REGEX: Regex = Regex::new(r"^(\d+)\.\s+(.*)$").unwrap();
    static ref PAGE_MARKER_REGEX: Regex = Regex::new(r"## Page \d+").unwrap();
}

/// Escape `& < > " '` for HTML text and attribute contexts.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn inline(text: &str) -> String {
    BOLD_REGEX
        .replace_all(&escape_html(text), "<strong>$1</strong>")
        .into_owned()
}

fn heading(line: &str) -> Option<String> {
    [("### ", 3), ("## ", 2), ("# ", 1)]
        .iter()
        .find_map(|(prefix, level)| {
            line.strip_prefix(prefix)
                .map(|rest| format!("<h{level}>{}</h{level}>", inline(rest), level = level))
        })
}

#[derive(Clone, Copy, PartialEq)]
enum List {
    None,
    Unordered,
    Ordered,
}

impl List {
    fn close(self, html: &mut Vec<String>) {
        match self {
            List::Unordered => html.push("</ul>".to_string()),
            List::Ordered => html.push("</ol>".to_string()),
            List::None => {}
        }
    }
}

/// Render a markdown-like answer: headings, fenced code, bullet and
/// numbered lists, bold, and paragraphs.
pub fn response_to_html(body: &str) -> String {
    let mut html = Vec::new();
    let mut list = List::None;
    let mut in_code = false;

    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            if in_code {
                html.push("</code></pre>".to_string());
            } else {
                list.close(&mut html);
                list = List::None;
                html.push("<pre><code>".to_string());
            }
            in_code = !in_code;
            continue;
        }
        if in_code {
            html.push(escape_html(line));
            continue;
        }

        if let Some(item) = line.strip_prefix("- ") {
            if list != List::Unordered {
                list.close(&mut html);
                html.push("<ul>".to_string());
                list = List::Unordered;
            }
            html.push(format!("<li>{}</li>", inline(item)));
            continue;
        }
        if let Some(caps) = ORDERED_ITEM_REGEX.captures(line) {
            if list != List::Ordered {
                list.close(&mut html);
                html.push("<ol>".to_string());
                list = List::Ordered;
            }
            html.push(format!("<li>{}</li>", inline(&caps[2])));
            continue;
        }

        list.close(&mut html);
        list = List::None;

        if line.trim().is_empty() {
            continue;
        }
        match heading(line) {
            Some(h) => html.push(h),
            None => html.push(format!("<p>{}</p>", inline(line))),
        }
    }

    list.close(&mut html);
    if in_code {
        html.push("</code></pre>".to_string());
    }
    html.join("\n")
}

/// Line-by-line rendering: headings, `<br>` for blank lines, escaped text.
pub fn format_plain_text(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if let Some(rest) = line.strip_prefix("# ") {
                format!("<h1>{}</h1>", escape_html(rest))
            } else if let Some(rest) = line.strip_prefix("## ") {
                format!("<h2>{}</h2>", escape_html(rest))
            } else if let Some(rest) = line.strip_prefix("### ") {
                format!("<h3>{}</h3>", escape_html(rest))
            } else if line.trim().is_empty() {
                "<br>".to_string()
            } else {
                escape_html(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Preview of extracted text. PDF output is split into page blocks.
pub fn document_preview_html(content: &str, file_name: &str) -> String {
    let is_pdf = file_name.to_lowercase().ends_with(".pdf");

    if is_pdf && (content.contains("# ") || content.contains("## Page")) {
        let mut parts = PAGE_MARKER_REGEX.split(content);
        let header = parts.next().unwrap_or_default();
        let pages: Vec<String> = parts
            .filter(|page| !page.trim().is_empty())
            .map(|page| format!("<div class=\"document-page\">{}</div>", format_plain_text(page)))
            .collect();

        return format!(
            "<div class=\"document-text\">{}{}</div>",
            format_plain_text(header),
            pages.join("<div class=\"page-break\"></div>")
        );
    }

    format!("<div class=\"document-text\">{}</div>", format_plain_text(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#039;y&#039;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_response_structure() {
        let body = "## Document Summary\n\n**Title**: Report\n\n- one\n- two\n\n1. first\n2. second";
        let html = response_to_html(body);
        assert_eq!(
            html,
            "<h2>Document Summary</h2>\n<p><strong>Title</strong>: Report</p>\n\
             <ul>\n<li>one</li>\n<li>two</li>\n</ul>\n\
             <ol>\n<li>first</li>\n<li>second</li>\n</ol>"
        );
    }

    #[test]
    fn test_code_block_escaped_verbatim() {
        let html = response_to_html("**Preview**:\n```\n<b>**not bold**</b>\n```");
        assert!(html.contains("<pre><code>\n&lt;b&gt;**not bold**&lt;/b&gt;\n</code></pre>"));
    }

    #[test]
    fn test_document_markup_never_survives() {
        let html = response_to_html("# <img src=x onerror=alert(1)>\n- <script>x</script>");
        assert!(!html.contains("<img"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_unclosed_fence_closed() {
        assert!(response_to_html("```\ncode").ends_with("</code></pre>"));
    }

    #[test]
    fn test_pdf_preview_pages() {
        let content = "# a.pdf\n\nPDF Document - 2 pages\n\n## Page 1\n\nFirst\n\n## Page 2\n\nSecond <b>\n\n";
        let html = document_preview_html(content, "a.pdf");

        assert!(html.starts_with("<div class=\"document-text\"><h1>a.pdf</h1>"));
        assert_eq!(html.matches("<div class=\"document-page\">").count(), 2);
        assert_eq!(html.matches("<div class=\"page-break\"></div>").count(), 1);
        assert!(html.contains("Second &lt;b&gt;"));
    }

    #[test]
    fn test_plain_preview() {
        let html = document_preview_html("line <1>\n\nline 2", "notes.txt");
        assert_eq!(
            html,
            "<div class=\"document-text\">line &lt;1&gt;\n<br>\nline 2</div>"
        );
    }
}
