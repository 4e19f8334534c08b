//! File tools available to every crew member.
//!
//! All four tools are confined to the crew's working directory. Failures are
//! reported as plain strings to the calling role, never as errors: a model
//! asking for `../../etc/passwd` gets a refusal it can read and react to.

use std::fs;
use std::path::Path;

use crewroute_common::WorkDir;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::project_size::{is_ignored_dir, IGNORED_DIRS};

const MAX_LISTING_ENTRIES: usize = 500;
const MAX_READ_CHARS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ReadDirectory,
    ReadFile,
    WriteFile,
    DeleteFile,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::ReadDirectory,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::DeleteFile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::ReadDirectory => "read_directory",
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::DeleteFile => "delete_file",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            ToolKind::ReadDirectory => {
                r#"read_directory {"path": "src"} - list files below a directory (path optional, defaults to the working directory)"#
            }
            ToolKind::ReadFile => r#"read_file {"filename": "src/main.py"} - read a file"#,
            ToolKind::WriteFile => {
                r#"write_file {"filename": "src/utils.py", "content": "..."} - create or overwrite a file, parent directories are created"#
            }
            ToolKind::DeleteFile => r#"delete_file {"filename": "old.py"} - delete a file"#,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Input for read_directory.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReadDirectoryInput {
    #[serde(default)]
    pub path: Option<String>,
}

/// Input for read_file and delete_file.
#[derive(Debug, Serialize, Deserialize)]
pub struct FilenameInput {
    pub filename: String,
}

/// Input for write_file.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteFileInput {
    pub filename: String,
    pub content: String,
}

/// A tool invocation requested by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The fixed tool set, scoped to one working directory.
#[derive(Debug, Clone)]
pub struct FileToolset {
    work_dir: WorkDir,
}

impl FileToolset {
    pub fn new(work_dir: WorkDir) -> Self {
        Self { work_dir }
    }

    pub fn work_dir(&self) -> &WorkDir {
        &self.work_dir
    }

    pub fn kinds(&self) -> &'static [ToolKind] {
        &ToolKind::ALL
    }

    /// Tool usage lines for a system prompt.
    pub fn describe(&self) -> String {
        self.kinds()
            .iter()
            .map(|k| format!("- {}", k.usage()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run a model-requested tool call and return its textual result.
    pub fn dispatch(&self, call: &ToolCall) -> String {
        let Some(kind) = ToolKind::from_name(&call.tool) else {
            return format!(
                "Error: unknown tool '{}'. Available tools: read_directory, read_file, write_file, delete_file",
                call.tool
            );
        };

        debug!(tool = kind.name(), "Dispatching tool call");

        let args = if call.args.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            call.args.clone()
        };

        match kind {
            ToolKind::ReadDirectory => match serde_json::from_value::<ReadDirectoryInput>(args) {
                Ok(input) => self.read_directory(input.path.as_deref().unwrap_or(".")),
                Err(e) => format!("Error: invalid arguments for read_directory: {e}"),
            },
            ToolKind::ReadFile => match serde_json::from_value::<FilenameInput>(args) {
                Ok(input) => self.read_file(&input.filename),
                Err(e) => format!("Error: invalid arguments for read_file: {e}"),
            },
            ToolKind::WriteFile => match serde_json::from_value::<WriteFileInput>(args) {
                Ok(input) => self.write_file(&input.filename, &input.content),
                Err(e) => format!("Error: invalid arguments for write_file: {e}"),
            },
            ToolKind::DeleteFile => match serde_json::from_value::<FilenameInput>(args) {
                Ok(input) => self.delete_file(&input.filename),
                Err(e) => format!("Error: invalid arguments for delete_file: {e}"),
            },
        }
    }

    pub fn read_directory(&self, path: &str) -> String {
        let dir = match self.work_dir.resolve(path) {
            Ok(dir) => dir,
            Err(_) => return self.refusal("read", path),
        };
        if !dir.is_dir() {
            return format!("Error: not a directory: {path}");
        }

        let mut entries = Vec::new();
        let mut truncated = false;
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_ignored_dir(e, IGNORED_DIRS));

        for entry in walker.filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entries.len() == MAX_LISTING_ENTRIES {
                truncated = true;
                break;
            }
            entries.push(self.work_dir.display_relative(entry.path()));
        }

        if entries.is_empty() {
            return format!("Directory is empty: {path}");
        }

        let mut listing = entries.join("\n");
        if truncated {
            listing.push_str(&format!("\n... listing truncated after {MAX_LISTING_ENTRIES} files"));
        }
        listing
    }

    pub fn read_file(&self, filename: &str) -> String {
        let path = match self.work_dir.resolve(filename) {
            Ok(path) => path,
            Err(_) => return self.refusal("read", filename),
        };

        match fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let total = text.chars().count();
                if total > MAX_READ_CHARS {
                    let head: String = text.chars().take(MAX_READ_CHARS).collect();
                    format!(
                        "{head}\n\n... [truncated, {} more characters]",
                        total - MAX_READ_CHARS
                    )
                } else {
                    text.into_owned()
                }
            }
            Err(e) => format!("Error reading {filename}: {e}"),
        }
    }

    pub fn write_file(&self, filename: &str, content: &str) -> String {
        let path = match self.work_dir.resolve(filename) {
            Ok(path) => path,
            Err(_) => return self.refusal("written", filename),
        };
        if path == self.work_dir.root() {
            return "Error: a filename is required".to_string();
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return format!("Error creating directories for {filename}: {e}");
            }
        }

        match fs::write(&path, content) {
            Ok(()) => format!("File saved: {}", self.work_dir.display_relative(&path)),
            Err(e) => format!("Error writing {filename}: {e}"),
        }
    }

    pub fn delete_file(&self, filename: &str) -> String {
        let path = match self.work_dir.resolve(filename) {
            Ok(path) => path,
            Err(_) => return self.refusal("deleted", filename),
        };

        if !path.exists() {
            return format!(
                "Warning: file does not exist: {}",
                self.work_dir.display_relative(&path)
            );
        }
        if !path.is_file() {
            return format!("Error: not a file: {filename}");
        }

        match fs::remove_file(&path) {
            Ok(()) => format!("File deleted: {}", self.work_dir.display_relative(&path)),
            Err(e) => format!("Error deleting {filename}: {e}"),
        }
    }

    fn refusal(&self, action: &str, requested: &str) -> String {
        warn!(path = %requested, "Refused file access outside the working directory");
        format!(
            "Error: files may only be {} inside the working directory {} (requested '{}')",
            action,
            display(self.work_dir.root()),
            requested
        )
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn toolset() -> (TempDir, FileToolset) {
        let dir = TempDir::new().unwrap();
        let tools = FileToolset::new(WorkDir::new(dir.path()).unwrap());
        (dir, tools)
    }

    #[test]
    fn write_creates_parent_directories() {
        let (dir, tools) = toolset();
        let result = tools.write_file("src/utils/helpers.py", "print('hi')");
        assert!(result.starts_with("File saved"), "{result}");
        let written = std::fs::read_to_string(dir.path().join("src/utils/helpers.py")).unwrap();
        assert_eq!(written, "print('hi')");
    }

    #[test]
    fn write_refuses_traversal_without_touching_disk() {
        let (dir, tools) = toolset();
        let result = tools.write_file("../../etc/passwd", "root::0:0");
        assert!(result.starts_with("Error: files may only be written"), "{result}");

        let escaped = dir.path().join("../../etc/passwd");
        assert!(std::fs::read_to_string(escaped)
            .map(|c| c != "root::0:0")
            .unwrap_or(true));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn delete_missing_file_is_a_warning() {
        let (_dir, tools) = toolset();
        let result = tools.delete_file("ghost.txt");
        assert_eq!(result, "Warning: file does not exist: ghost.txt");
    }

    #[test]
    fn delete_removes_file() {
        let (dir, tools) = toolset();
        std::fs::write(dir.path().join("old.py"), "x").unwrap();
        assert_eq!(tools.delete_file("old.py"), "File deleted: old.py");
        assert!(!dir.path().join("old.py").exists());
    }

    #[test]
    fn delete_refuses_outside_paths() {
        let (_dir, tools) = toolset();
        let result = tools.delete_file("../sibling.txt");
        assert!(result.starts_with("Error: files may only be deleted"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_cannot_redirect_write_or_delete() {
        let (dir, tools) = toolset();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();

        let result = tools.write_file("link", "escaped");
        assert!(result.starts_with("Error: files may only be written"), "{result}");
        assert!(!target.exists());

        std::fs::write(&target, "keep me").unwrap();
        let result = tools.delete_file("link");
        assert!(result.starts_with("Error: files may only be deleted"), "{result}");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "keep me");
    }

    #[test]
    fn read_file_and_directory() {
        let (dir, tools) = toolset();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "import os").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();

        assert_eq!(tools.read_file("src/app.py"), "import os");
        let listing = tools.read_directory(".");
        assert!(listing.contains("app.py"));
        assert!(!listing.contains("node_modules"));
    }

    #[test]
    fn read_refuses_outside_paths() {
        let (_dir, tools) = toolset();
        assert!(tools.read_file("/etc/hostname").starts_with("Error: files may only be read"));
        assert!(tools.read_directory("..").starts_with("Error: files may only be read"));
    }

    #[test]
    fn dispatch_routes_by_tool_name() {
        let (dir, tools) = toolset();
        let call = ToolCall {
            tool: "write_file".into(),
            args: json!({"filename": "a.txt", "content": "hello"}),
        };
        assert!(tools.dispatch(&call).starts_with("File saved"));
        assert!(dir.path().join("a.txt").exists());

        let read = ToolCall {
            tool: "read_file".into(),
            args: json!({"filename": "a.txt"}),
        };
        assert_eq!(tools.dispatch(&read), "hello");
    }

    #[test]
    fn dispatch_reports_bad_input() {
        let (_dir, tools) = toolset();
        let unknown = ToolCall {
            tool: "run_shell".into(),
            args: json!({}),
        };
        assert!(tools.dispatch(&unknown).starts_with("Error: unknown tool"));

        let missing_arg = ToolCall {
            tool: "write_file".into(),
            args: json!({"filename": "a.txt"}),
        };
        assert!(tools
            .dispatch(&missing_arg)
            .starts_with("Error: invalid arguments for write_file"));
    }

    #[test]
    fn read_directory_defaults_to_root() {
        let (dir, tools) = toolset();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        let call = ToolCall {
            tool: "read_directory".into(),
            args: serde_json::Value::Null,
        };
        assert_eq!(tools.dispatch(&call), "main.rs");
    }
}
