//! Condensed project summaries for medium-sized projects.
//!
//! A structured overview (file listing plus a selection of file contents) is
//! sent to a cheap model with a request for an eight-section summary. If the
//! model call fails the overview itself is returned, so summarizing never
//! fails from the caller's point of view.

use std::path::Path;

use crewroute_llm::{LlmClient, LlmRequest};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::project_size::is_ignored_dir;

const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".cache",
    ".pytest_cache",
    "env",
    "target",
    ".next",
    "coverage",
    ".nyc_output",
];

const RELEVANT_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "h", "hpp", "cs", "go", "rs", "rb", "php",
    "swift", "md", "txt", "json", "yaml", "yml", "xml", "html", "css", "scss", "sql", "sh", "bat",
    "ps1",
];

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "go", "rs", "rb", "php",
];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "xml", "toml", "ini", "env"];
const DOC_EXTENSIONS: &[&str] = &["md", "txt", "rst"];

const MAX_LISTED_CODE: usize = 20;
const MAX_LISTED_TESTS: usize = 10;
const MAX_LISTED_CONFIG: usize = 10;
const MAX_LISTED_DOCS: usize = 5;

const README_CANDIDATES: &[&str] = &["README.md", "readme.md", "README.txt"];
const README_MAX_CHARS: usize = 10_000;
const SAMPLED_CODE_FILES: usize = 5;
const CODE_SAMPLE_MAX_CHARS: usize = 5_000;
const MANIFEST_CANDIDATES: &[&str] = &["package.json", "setup.py", "pyproject.toml", "Cargo.toml"];
const MANIFEST_MAX_CHARS: usize = 3_000;

/// Files of a project, grouped by category. Paths are relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectScan {
    pub code_files: Vec<String>,
    pub tests: Vec<String>,
    pub config_files: Vec<String>,
    pub docs: Vec<String>,
    pub other: Vec<String>,
}

/// Walk `root` and categorize every relevant file.
pub fn scan(root: &Path) -> ProjectScan {
    let mut result = ProjectScan::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e, IGNORED_DIRS));

    for entry in walker.filter_map(std::result::Result::ok) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !RELEVANT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let name = entry.file_name().to_string_lossy().to_lowercase();

        if CODE_EXTENSIONS.contains(&ext) {
            if name.contains("test") || name.contains("spec") {
                result.tests.push(rel);
            } else {
                result.code_files.push(rel);
            }
        } else if CONFIG_EXTENSIONS.contains(&ext) {
            result.config_files.push(rel);
        } else if DOC_EXTENSIONS.contains(&ext) {
            result.docs.push(rel);
        } else {
            result.other.push(rel);
        }
    }

    result
}

/// Read at most `max_chars` characters of `path`, marking truncation.
fn read_capped(path: &Path, max_chars: usize) -> String {
    match std::fs::read(path) {
        Ok(bytes) => truncate_chars(&String::from_utf8_lossy(&bytes), max_chars),
        Err(_) => "[Error reading file]".to_string(),
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!(
        "{head}\n\n... [truncated, {} more characters]",
        total - max_chars
    )
}

fn push_listing(out: &mut String, title: &str, files: &[String], cap: usize, note_overflow: bool) {
    out.push_str(&format!("**{} ({}):**\n", title, files.len()));
    for f in files.iter().take(cap) {
        out.push_str(&format!("- {f}\n"));
    }
    if note_overflow && files.len() > cap {
        out.push_str(&format!("... and {} more\n", files.len() - cap));
    }
}

fn push_file(out: &mut String, label: &str, path: &Path, max_chars: usize) {
    out.push_str(&format!(
        "## {}\n```\n{}\n```\n\n",
        label,
        read_capped(path, max_chars)
    ));
}

/// Structured overview of the project: listing plus selected file contents.
pub fn overview(root: &Path, scan: &ProjectScan) -> String {
    let mut out = String::from("# PROJECT STRUCTURE\n\n");

    push_listing(&mut out, "Code files", &scan.code_files, MAX_LISTED_CODE, true);
    out.push('\n');
    push_listing(&mut out, "Test files", &scan.tests, MAX_LISTED_TESTS, true);
    out.push('\n');
    push_listing(&mut out, "Configuration", &scan.config_files, MAX_LISTED_CONFIG, false);
    out.push('\n');
    push_listing(&mut out, "Documentation", &scan.docs, MAX_LISTED_DOCS, false);

    out.push_str("\n\n# FILE CONTENTS (selection)\n\n");

    if let Some(readme) = README_CANDIDATES.iter().find(|n| root.join(n).is_file()) {
        push_file(&mut out, readme, &root.join(readme), README_MAX_CHARS);
    }

    for code_file in scan.code_files.iter().take(SAMPLED_CODE_FILES) {
        let path = root.join(code_file);
        if path.is_file() {
            push_file(&mut out, code_file, &path, CODE_SAMPLE_MAX_CHARS);
        }
    }

    if let Some(manifest) = MANIFEST_CANDIDATES.iter().find(|n| root.join(n).is_file()) {
        push_file(&mut out, manifest, &root.join(manifest), MANIFEST_MAX_CHARS);
    }

    out
}

pub fn summary_prompt(overview: &str) -> String {
    format!(
        "You are a project analyst. Analyse this project and write a COMPACT, STRUCTURED summary.

{overview}

Write the summary with the following sections:

1. **PROJECT TYPE**: (web app, CLI tool, library, API, ...)
2. **TECH STACK**: (languages, frameworks, most important dependencies)
3. **ARCHITECTURE**: (folder structure, main components, design patterns)
4. **CORE FEATURES**: (the 3-5 most important features)
5. **ENTRY POINTS**: (where does the application start, main files)
6. **DEPENDENCIES**: (external libraries, APIs, databases)
7. **TESTING**: (test framework, coverage, important test files)
8. **SPECIAL NOTES**: (special configuration, deployment, ...)

IMPORTANT: keep the summary COMPACT (at most 2000 tokens). Focus on what matters most!
"
    )
}

/// Summarize the project under `root` with `client`.
///
/// Falls back to the raw overview, annotated with the error, when the model
/// call fails.
pub async fn summarize(root: &Path, client: &dyn LlmClient) -> String {
    let scan = scan(root);
    let overview = overview(root, &scan);

    debug!(
        code_files = scan.code_files.len(),
        tests = scan.tests.len(),
        overview_len = overview.len(),
        "Summarizing project"
    );

    let request = LlmRequest::single_turn(None, summary_prompt(&overview));
    match client.complete(request).await {
        Ok(response) => {
            info!(
                model = %client.model_name(),
                summary_len = response.content.len(),
                "Project summary created"
            );
            response.content
        }
        Err(e) => {
            warn!(error = %e, "Project summary failed, using raw overview");
            format!("# PROJECT OVERVIEW\n\n{overview}\n\n[Automatic summary failed: {e}]")
        }
    }
}
