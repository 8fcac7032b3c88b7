//! Diagnostics with source snippets, colors, and JSON output.

use crate::analysis::lexer::LexError;
use crate::analysis::parser::ParseError;
use crate::analysis::tokens::Span;
use crate::CheckError;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Stable identifier of the check that produced a diagnostic
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RuleId {
    PromiseMustComplete,
    DeferredMustComplete,
    AnalysisFault,
    ParseError,
}

impl RuleId {
    pub fn description(self) -> &'static str {
        match self {
            RuleId::PromiseMustComplete => "every path through a promise executor calls resolve or reject",
            RuleId::DeferredMustComplete => "every path through a deferred's scope calls resolve or reject on it",
            RuleId::AnalysisFault => "the analysis of one construct failed and was skipped",
            RuleId::ParseError => "the file could not be lexed or parsed",
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            RuleId::PromiseMustComplete | RuleId::DeferredMustComplete => Severity::Warning,
            RuleId::AnalysisFault | RuleId::ParseError => Severity::Error,
        }
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule: RuleId,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Byte offset of the anchor in the source
    pub offset: usize,
    /// Byte width of the anchor
    pub width: usize,
    pub line: usize,
    pub col: usize,
    #[serde(skip)]
    pub source_line: Option<String>,
    #[serde(skip)]
    pub underline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// A diagnostic anchored on `span`, with the first line of the span
    /// underlined in the rendered snippet.
    pub fn new(rule: RuleId, message: impl Into<String>, span: Span, source: &str) -> Self {
        let source_line = get_source_line(source, span.line);
        let underline = source_line.as_ref().map(|text| {
            let rest = text.len().saturating_sub(span.col.saturating_sub(1));
            make_underline(span.col, span.width().min(rest))
        });
        Self {
            rule,
            severity: rule.default_severity(),
            message: message.into(),
            file: None,
            offset: span.start,
            width: span.width(),
            line: span.line,
            col: span.col,
            source_line,
            underline,
            suggestions: vec![],
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Render with ANSI colors for terminal
    pub fn render_ansi(&self) -> String {
        let mut out = String::new();

        let severity_label = match self.severity {
            Severity::Error => red("error"),
            Severity::Warning => yellow("warning"),
        };
        out.push_str(&format!("{}[{}]: {}\n", severity_label, bold(self.rule.as_ref()), bold(&self.message)));

        if let Some(ref file) = self.file {
            out.push_str(&format!("  {} {}:{}:{}\n", cyan("-->"), file, self.line, self.col));
        }

        if let (Some(ref line_text), Some(ref underline)) = (&self.source_line, &self.underline) {
            out.push_str(&format!("   {}\n", cyan("|")));
            out.push_str(&format!("{:>3} {} {}\n", cyan(&self.line.to_string()), cyan("|"), line_text));
            out.push_str(&format!("   {} {}\n", cyan("|"), yellow(underline)));
        }

        if !self.suggestions.is_empty() {
            out.push_str(&format!("   {}\n", cyan("|")));
            for suggestion in &self.suggestions {
                out.push_str(&format!("   {} {}: {}\n", cyan("="), cyan("help"), suggestion));
            }
        }

        out
    }

    /// Render without colors (for tests and piped output)
    pub fn render_plain(&self) -> String {
        let mut out = String::new();

        let severity_label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        out.push_str(&format!("{}[{}]: {}\n", severity_label, self.rule, self.message));

        if let Some(ref file) = self.file {
            out.push_str(&format!("  --> {}:{}:{}\n", file, self.line, self.col));
        }

        if let (Some(ref line_text), Some(ref underline)) = (&self.source_line, &self.underline) {
            out.push_str("   |\n");
            out.push_str(&format!("{:>3} | {}\n", self.line, line_text));
            out.push_str(&format!("   | {}\n", underline));
        }

        if !self.suggestions.is_empty() {
            out.push_str("   |\n");
            for suggestion in &self.suggestions {
                out.push_str(&format!("   = help: {}\n", suggestion));
            }
        }

        out
    }
}

// ANSI color helpers
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

fn get_source_line(source: &str, line: usize) -> Option<String> {
    if line == 0 {
        return None;
    }
    source.lines().nth(line - 1).map(|s| s.to_string())
}

fn make_underline(col: usize, len: usize) -> String {
    format!("{}{}", " ".repeat(col.saturating_sub(1)), "^".repeat(len.max(1)))
}

/// Turn a lex or parse failure into a diagnostic for `filename`.
pub fn format_check_error(error: &CheckError, source: &str, filename: &str) -> Diagnostic {
    let (line, col) = match error {
        CheckError::Lex(e) => lex_position(e),
        CheckError::Parse(e) => parse_position(e),
        CheckError::Config(_) => (0, 0),
    };
    let offset = offset_of(source, line, col);
    let span = Span::new(offset, offset + 1, line, col);
    let diag = Diagnostic::new(RuleId::ParseError, error.to_string(), span, source).with_file(filename);
    match error {
        CheckError::Parse(ParseError::TooDeep { .. }) => diag.with_suggestion("split deeply nested code into functions"),
        CheckError::Lex(LexError::UnterminatedString { .. }) => diag.with_suggestion("add a closing quote"),
        _ => diag,
    }
}

fn lex_position(error: &LexError) -> (usize, usize) {
    match error {
        LexError::UnexpectedChar { line, col, .. }
        | LexError::UnterminatedString { line, col }
        | LexError::UnterminatedTemplate { line, col }
        | LexError::UnterminatedComment { line, col }
        | LexError::InvalidNumber { line, col } => (*line, *col),
    }
}

fn parse_position(error: &ParseError) -> (usize, usize) {
    match error {
        ParseError::Unexpected { line, col, .. }
        | ParseError::InvalidAssignmentTarget { line, col }
        | ParseError::TooDeep { line, col, .. } => (*line, *col),
    }
}

/// Byte offset of a 1-based line/column position (columns count chars).
fn offset_of(source: &str, line: usize, col: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut offset = 0;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let within: usize = text.chars().take(col.saturating_sub(1)).map(char::len_utf8).sum();
            return offset + within;
        }
        offset += text.len();
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_get_source_line() {
        let source = "line 1\nline 2\nline 3\n";
        assert_eq!(get_source_line(source, 1), Some("line 1".to_string()));
        assert_eq!(get_source_line(source, 3), Some("line 3".to_string()));
        assert_eq!(get_source_line(source, 4), None);
        assert_eq!(get_source_line(source, 0), None);
    }

    #[test]
    fn test_make_underline() {
        assert_eq!(make_underline(1, 3), "^^^");
        assert_eq!(make_underline(5, 2), "    ^^");
        assert_eq!(make_underline(3, 0), "  ^");
    }

    #[test]
    fn test_underline_clipped_to_first_line() {
        let source = "var d = $.Deferred(\n);";
        let span = Span::new(4, source.len(), 1, 5);
        let diag = Diagnostic::new(RuleId::DeferredMustComplete, "msg", span, source);
        assert_eq!(diag.underline.as_deref(), Some("    ^^^^^^^^^^^^^^^"));
        assert_eq!(diag.width, source.len() - 4);
    }

    #[test]
    fn test_rule_ids_are_kebab_case() {
        let ids: Vec<String> = RuleId::iter().map(|r| r.to_string()).collect();
        assert_eq!(ids, vec!["promise-must-complete", "deferred-must-complete", "analysis-fault", "parse-error"]);
        assert_eq!("deferred-must-complete".parse::<RuleId>().ok(), Some(RuleId::DeferredMustComplete));
    }

    #[test]
    fn test_render_plain() {
        let source = "new Promise(function (resolve) {});";
        let span = Span::new(0, source.len() - 1, 1, 1);
        let diag = Diagnostic::new(RuleId::PromiseMustComplete, "never settles", span, source).with_file("a.js");

        let output = diag.render_plain();
        assert!(output.starts_with("warning[promise-must-complete]: never settles\n"));
        assert!(output.contains("  --> a.js:1:1\n"));
        assert!(output.contains("  1 | new Promise"));
        assert!(output.contains("^^^^"));
    }

    #[test]
    fn test_render_ansi() {
        let diag = Diagnostic::new(RuleId::AnalysisFault, "boom", Span::new(0, 1, 1, 1), "x");
        let output = diag.render_ansi();
        assert!(output.contains("\x1b["));
        assert!(output.contains("analysis-fault"));
        assert!(output.contains("boom"));
    }

    #[test]
    fn test_json_shape() {
        let diag = Diagnostic::new(RuleId::PromiseMustComplete, "m", Span::new(2, 5, 1, 3), "a  bcd").with_file("f.js");
        let json = serde_json::to_value(&diag).expect("serializes");
        assert_eq!(json["rule"], "promise-must-complete");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["offset"], 2);
        assert_eq!(json["width"], 3);
        assert!(json.get("source_line").is_none());
        assert!(json.get("suggestions").is_none());
    }

    #[test]
    fn test_format_parse_error() {
        let source = "var a = 1;\nvar = 2;\n";
        let error = CheckError::Parse(ParseError::Unexpected {
            found: "=".to_string(),
            expected: "binding pattern".to_string(),
            line: 2,
            col: 5,
        });
        let diag = format_check_error(&error, source, "bad.js");
        assert_eq!(diag.rule, RuleId::ParseError);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.offset, 15);
        assert_eq!(diag.file.as_deref(), Some("bad.js"));
        assert!(diag.message.contains("unexpected token"));
    }
}
