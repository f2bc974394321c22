use biblatex::Bibliography;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::identifier::CitingWorkIdentifier;

/// Matches `@TYPE{key,` at the start of a line
static ENTRY_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*@\s*([A-Za-z]+)\s*\{\s*([^,\s]+)\s*,").expect("valid entry header pattern")
});

/// Exported record text for one citing work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographicEntry {
    pub identifier: CitingWorkIdentifier,
    pub text: String,
}

impl BibliographicEntry {
    /// Build an entry, normalizing the whitespace of the exported text
    pub fn new(identifier: CitingWorkIdentifier, text: &str) -> Self {
        Self {
            identifier,
            text: normalize_whitespace(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Entry keys declared in the text, in order of appearance
    ///
    /// Parsed with biblatex; falls back to scanning entry headers when the
    /// export is not fully parseable (unknown macros and the like).
    pub fn keys(&self) -> Vec<String> {
        if let Ok(bibliography) = Bibliography::parse(&self.text) {
            let keys: Vec<String> = bibliography.iter().map(|e| e.key.to_string()).collect();
            if !keys.is_empty() {
                return keys;
            }
        }

        ENTRY_HEADER
            .captures_iter(&self.text)
            .filter(|cap| !is_special_block(&cap[1]))
            .map(|cap| cap[2].to_string())
            .collect()
    }
}

/// `@string`, `@preamble` and `@comment` blocks carry no entry key
fn is_special_block(kind: &str) -> bool {
    matches!(
        kind.to_ascii_lowercase().as_str(),
        "string" | "preamble" | "comment"
    )
}

/// CRLF to LF, trailing whitespace stripped per line, outer blank lines removed
pub fn normalize_whitespace(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end())
        .collect();

    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());

    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}
