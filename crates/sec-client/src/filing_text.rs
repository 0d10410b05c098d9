//! Plain-text extraction from annual report HTML.

use regex::Regex;
use scraper::{Html, Node};
use std::sync::LazyLock;

/// Maximum characters kept from a filing document.
pub const MAX_FILING_CHARS: usize = 50_000;

static RISK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)item\s*1a\.?\s*risk\s*factors").expect("valid risk start pattern")
});

static RISK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)item\s*(1b|2)\.?").expect("valid risk end pattern"));

fn is_non_content(node: &Node) -> bool {
    node.as_element()
        .map_or(false, |e| matches!(e.name(), "script" | "style" | "head"))
}

/// Convert an HTML document to newline-separated text. Script and style
/// content is dropped, runs of whitespace collapse, blank lines disappear.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if node.ancestors().any(|a| is_non_content(a.value())) {
            continue;
        }
        for line in text.lines() {
            let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if !collapsed.is_empty() {
                lines.push(collapsed);
            }
        }
    }

    lines.join("\n")
}

/// Text of the "Item 1A. Risk Factors" section.
///
/// Annual reports repeat the heading in the table of contents, so the longest
/// start-to-end span wins. Without an end heading a window of
/// [`MAX_FILING_CHARS`] is taken; without a start heading, the document prefix.
pub fn extract_risk_section(text: &str) -> &str {
    let mut best: Option<&str> = None;

    for start in RISK_START.find_iter(text) {
        let section = match RISK_END.find_at(text, start.end()) {
            Some(end) => &text[start.start()..end.start()],
            None => analysis_core::text::truncate_chars(&text[start.start()..], MAX_FILING_CHARS),
        };
        if best.map_or(true, |b| section.len() > b.len()) {
            best = Some(section);
        }
    }

    best.unwrap_or_else(|| analysis_core::text::truncate_chars(text, MAX_FILING_CHARS))
}
