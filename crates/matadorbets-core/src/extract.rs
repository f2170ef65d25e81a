//! Title and one-line summary derived from a model answer, used to label
//! history entries.
//!
//! The persona answers with a fixed markdown layout: a `# 🐂 Home vs Away`
//! heading, a value table whose `🏆 Ganador` row holds the main pick, and a
//! `### 💎 La Joya` quote with the highlighted player prop. Anything else
//! (small talk, errors) keeps the defaults and is not saved.

use std::sync::OnceLock;

use regex::Regex;

pub const DEFAULT_TITLE: &str = "Análisis Matador";
pub const DEFAULT_SUMMARY: &str = "Ver ficha técnica";

const SUMMARY_MAX_CHARS: usize = 60;
const SUMMARY_KEEP_CHARS: usize = 57;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDetails {
    pub title: String,
    pub summary: String,
}

impl MatchDetails {
    /// True when at least one field was extracted from the text. Only
    /// recognized answers go into the history.
    pub fn is_recognized(&self) -> bool {
        self.title != DEFAULT_TITLE || self.summary != DEFAULT_SUMMARY
    }
}

fn title_re() -> &'static Regex {
    static TITLE_RE: OnceLock<Regex> = OnceLock::new();
    TITLE_RE.get_or_init(|| Regex::new(r"(?m)^#[ \t]*🐂[ \t]*([^\n]*)").expect("valid title regex"))
}

fn joya_bold_re() -> &'static Regex {
    static JOYA_BOLD_RE: OnceLock<Regex> = OnceLock::new();
    JOYA_BOLD_RE.get_or_init(|| {
        Regex::new(r"(?i)### 💎 La Joya[^\n]*\n> \*\*([^\n]*?)\*\*").expect("valid joya regex")
    })
}

fn joya_quote_re() -> &'static Regex {
    static JOYA_QUOTE_RE: OnceLock<Regex> = OnceLock::new();
    JOYA_QUOTE_RE.get_or_init(|| {
        Regex::new(r"(?i)### 💎 La Joya[^\n]*\n>[ \t]*([^\n]*)").expect("valid joya quote regex")
    })
}

fn winner_row_re() -> &'static Regex {
    static WINNER_ROW_RE: OnceLock<Regex> = OnceLock::new();
    WINNER_ROW_RE.get_or_init(|| {
        Regex::new(r"(?i)\|\s*🏆\s*Ganador\s*\|\s*([^|\n]*?)\s*\|").expect("valid winner row regex")
    })
}

/// First non-empty capture of `re` in `text`
fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

fn extract_title(text: &str) -> String {
    capture(title_re(), text)
        .map(|title| title.replace("**", "").trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn extract_summary(text: &str) -> String {
    let joya = capture(joya_bold_re(), text).or_else(|| capture(joya_quote_re(), text));

    let summary = match joya {
        Some(pick) => format!("💎 {}", pick),
        None => match capture(winner_row_re(), text) {
            Some(winner) => format!("🏆 {}", winner),
            None => DEFAULT_SUMMARY.to_string(),
        },
    };

    clean_summary(&summary)
}

/// Strip bold markers and brackets, trim, and ellipsize past 60 chars
fn clean_summary(summary: &str) -> String {
    let cleaned: String = summary
        .replace("**", "")
        .chars()
        .filter(|c| *c != '[' && *c != ']')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > SUMMARY_MAX_CHARS {
        let kept: String = cleaned.chars().take(SUMMARY_KEEP_CHARS).collect();
        format!("{}...", kept)
    } else {
        cleaned.to_string()
    }
}

pub fn extract(response_text: &str) -> MatchDetails {
    MatchDetails {
        title: extract_title(response_text),
        summary: extract_summary(response_text),
    }
}
