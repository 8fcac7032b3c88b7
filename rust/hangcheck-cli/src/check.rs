//! `hangcheck check`: expand paths, analyze each file, render the results.

use crate::colors::{bold, maybe, red, yellow};
use crate::config::FilesSection;
use crate::CliError;
use hangcheck_analyzer::diagnostics::format_check_error;
use hangcheck_analyzer::{check_program, parse, Diagnostic, RuleId, Rules};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

/// Outcome of checking one file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the file could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub findings: usize,
    pub faults: usize,
    pub errors: usize,
}

impl Summary {
    pub fn of(reports: &[FileReport]) -> Self {
        let mut summary = Summary { files: reports.len(), ..Summary::default() };
        for report in reports {
            if report.error.is_some() {
                summary.errors += 1;
            }
            for diag in &report.diagnostics {
                match diag.rule {
                    RuleId::PromiseMustComplete | RuleId::DeferredMustComplete => summary.findings += 1,
                    RuleId::AnalysisFault => summary.faults += 1,
                    RuleId::ParseError => summary.errors += 1,
                }
            }
        }
        summary
    }

    pub fn exit_code(&self) -> i32 {
        if self.findings + self.faults + self.errors > 0 {
            1
        } else {
            0
        }
    }
}

/// Expand command-line paths into the files to check.
///
/// Files are taken as given. Directories are walked recursively for the
/// configured extensions, skipping excluded paths. Anything else that looks
/// like a glob is expanded; a missing plain path is kept so that checking it
/// reports the read error.
pub fn collect_files(paths: &[PathBuf], files: &FilesSection) -> Result<Vec<PathBuf>, CliError> {
    let exclude = files
        .exclude
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(|source| CliError::Glob { pattern: p.clone(), source }))
        .collect::<Result<Vec<_>, _>>()?;
    let wanted = |path: &Path| {
        path.extension().and_then(|e| e.to_str()).is_some_and(|ext| files.extensions.iter().any(|w| w == ext))
    };
    let excluded = |rel: &Path| exclude.iter().any(|p| p.matches_path(rel));

    let mut out = Vec::new();
    for path in paths {
        if path.is_file() {
            out.push(path.clone());
        } else if path.is_dir() {
            walk(path, path, &wanted, &excluded, &mut out);
        } else {
            let text = path.to_string_lossy();
            if text.contains(['*', '?', '[']) {
                let entries =
                    glob::glob(&text).map_err(|source| CliError::Glob { pattern: text.to_string(), source })?;
                for entry in entries.flatten() {
                    if entry.is_file() && wanted(entry.as_path()) && !excluded(entry.as_path()) {
                        out.push(entry);
                    }
                }
            } else {
                out.push(path.clone());
            }
        }
    }
    out.sort();
    out.dedup();
    debug!(count = out.len(), "collected files");
    Ok(out)
}

fn walk(
    root: &Path,
    dir: &Path,
    wanted: &dyn Fn(&Path) -> bool,
    excluded: &dyn Fn(&Path) -> bool,
    out: &mut Vec<PathBuf>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(&path);
        if excluded(rel) {
            continue;
        }
        if path.is_dir() {
            walk(root, &path, wanted, excluded, out);
        } else if wanted(path.as_path()) {
            out.push(path);
        }
    }
}

/// Check one file. Read failures and parse failures are reported in the
/// returned report, never as an `Err`.
pub fn check_file(path: &Path, rules: &Rules) -> FileReport {
    let file = path.display().to_string();
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            let error = CliError::Read { path: path.to_path_buf(), source: e };
            return FileReport { file, diagnostics: vec![], error: Some(error.to_string()) };
        }
    };
    let diagnostics = match parse(&source) {
        Ok(program) => check_program(&program, &source, rules)
            .into_iter()
            .map(|d| d.with_file(file.as_str()))
            .collect(),
        Err(e) => {
            debug!(file = %file, error = %e, "parse failed");
            vec![format_check_error(&e, &source, &file)]
        }
    };
    FileReport { file, diagnostics, error: None }
}

pub fn check_paths(paths: &[PathBuf], files: &FilesSection, rules: &Rules) -> Result<Vec<FileReport>, CliError> {
    let targets = collect_files(paths, files)?;
    Ok(targets.iter().map(|path| check_file(path, rules)).collect())
}

pub fn render_plain(reports: &[FileReport], color: bool) -> String {
    let mut out = String::new();
    for report in reports {
        if let Some(error) = &report.error {
            out.push_str(&format!("{} {}\n", maybe(color, red, "error:"), error));
        }
        for diag in &report.diagnostics {
            if color {
                out.push_str(&diag.render_ansi());
            } else {
                out.push_str(&diag.render_plain());
            }
            out.push('\n');
        }
    }
    let summary = Summary::of(reports);
    let line = format!(
        "hangcheck: {} file{} checked, {} finding{}, {} fault{}, {} error{}",
        summary.files,
        plural(summary.files),
        summary.findings,
        plural(summary.findings),
        summary.faults,
        plural(summary.faults),
        summary.errors,
        plural(summary.errors),
    );
    let painter = if summary.exit_code() == 0 { bold } else { yellow };
    out.push_str(&maybe(color, painter, &line));
    out.push('\n');
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: Summary,
    files: &'a [FileReport],
}

pub fn render_json(reports: &[FileReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport { summary: Summary::of(reports), files: reports })
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangcheck_analyzer::AnalyzerConfig;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new(prefix: &str) -> Self {
            let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
            let path = std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), stamp));
            fs::create_dir_all(&path).expect("should create temp test directory");
            Self { path }
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.path.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("should create parent dir");
            }
            fs::write(&path, content).expect("should write file");
            path
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn rules() -> Rules {
        Rules::from_config(&AnalyzerConfig::default()).expect("default config")
    }

    #[test]
    fn directories_expand_by_extension_and_skip_excluded() {
        let temp = TempDir::new("hangcheck_collect");
        temp.write("a.js", "");
        temp.write("src/b.mjs", "");
        temp.write("src/readme.md", "");
        temp.write("node_modules/lib/c.js", "");
        let files = collect_files(&[temp.path.clone()], &FilesSection::default()).expect("collect");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(&temp.path).expect("under temp").to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.js", "src/b.mjs"]);
    }

    #[test]
    fn explicit_and_missing_files_are_kept() {
        let temp = TempDir::new("hangcheck_collect_explicit");
        let txt = temp.write("notes.txt", "");
        let missing = temp.path.join("gone.js");
        let files = collect_files(&[txt.clone(), missing.clone()], &FilesSection::default()).expect("collect");
        assert_eq!(files.len(), 2);
        assert!(files.contains(&txt) && files.contains(&missing));
    }

    #[test]
    fn glob_arguments_expand() {
        let temp = TempDir::new("hangcheck_collect_glob");
        temp.write("x/one.js", "");
        temp.write("y/two.js", "");
        temp.write("y/two.txt", "");
        let pattern = temp.path.join("*").join("*.js");
        let files = collect_files(&[pattern], &FilesSection::default()).expect("collect");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn check_file_reports_findings_with_file_name() {
        let temp = TempDir::new("hangcheck_check_file");
        let path = temp.write("p.js", "new Promise(function (resolve) { if (a) { resolve(); } });\n");
        let report = check_file(&path, &rules());
        assert!(report.error.is_none());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].file.as_deref(), Some(report.file.as_str()));
    }

    #[test]
    fn unreadable_and_unparsable_files_are_errors() {
        let temp = TempDir::new("hangcheck_check_errors");
        let bad = temp.write("bad.js", "var = ;\n");
        let missing = temp.path.join("missing.js");
        let reports = vec![check_file(&bad, &rules()), check_file(&missing, &rules())];
        assert_eq!(reports[0].diagnostics[0].rule, RuleId::ParseError);
        assert!(reports[1].error.as_deref().is_some_and(|e| e.starts_with("cannot read")));
        let summary = Summary::of(&reports);
        assert_eq!(summary, Summary { files: 2, findings: 0, faults: 0, errors: 2 });
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn clean_run_exits_zero_and_renders_summary() {
        let temp = TempDir::new("hangcheck_check_clean");
        let path = temp.write("ok.js", "new Promise((resolve) => resolve(1));\n");
        let reports = check_paths(&[path], &FilesSection::default(), &rules()).expect("check");
        assert_eq!(Summary::of(&reports).exit_code(), 0);
        let out = render_plain(&reports, false);
        assert_eq!(out, "hangcheck: 1 file checked, 0 findings, 0 faults, 0 errors\n");
    }

    #[test]
    fn json_render_has_summary_and_files() {
        let report = FileReport { file: "a.js".to_string(), diagnostics: vec![], error: Some("boom".to_string()) };
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&[report]).expect("serializes")).expect("valid json");
        assert_eq!(json["summary"]["errors"], 1);
        assert_eq!(json["files"][0]["file"], "a.js");
        assert_eq!(json["files"][0]["error"], "boom");
    }
}
