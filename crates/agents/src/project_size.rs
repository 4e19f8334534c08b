//! Project size estimation.
//!
//! Size is a rough token estimate over the text files of the working
//! directory (one token per four characters). It decides whether a crew gets
//! a compact orchestrator, a summarized project, or a large-context model.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[
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
];

/// Lowercase file extensions whose contents are counted.
pub const COUNTED_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "h", "hpp", "cs", "go", "rs", "rb", "php",
    "swift", "md", "txt", "json", "yaml", "yml", "xml", "html", "css", "scss", "sql",
];

/// Projects below this many tokens are small.
pub const SMALL_TOKEN_LIMIT: u64 = 100_000;
/// Projects below this many tokens (and not small) are medium.
pub const MEDIUM_TOKEN_LIMIT: u64 = 400_000;

const CHARS_PER_TOKEN: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSize {
    Small,
    Medium,
    Large,
}

impl ProjectSize {
    pub fn from_tokens(tokens: u64) -> Self {
        if tokens < SMALL_TOKEN_LIMIT {
            ProjectSize::Small
        } else if tokens < MEDIUM_TOKEN_LIMIT {
            ProjectSize::Medium
        } else {
            ProjectSize::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectSize::Small => "small",
            ProjectSize::Medium => "medium",
            ProjectSize::Large => "large",
        }
    }
}

impl fmt::Display for ProjectSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for directories below the walk root whose name is in `ignored`.
pub(crate) fn is_ignored_dir(entry: &DirEntry, ignored: &[&str]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| ignored.contains(&name))
            .unwrap_or(false)
}

fn is_counted(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| COUNTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Estimated token count of `root`. Unreadable entries are skipped; a root
/// that cannot be walked at all estimates to zero.
pub fn estimate_tokens(root: &Path) -> u64 {
    let mut total_chars: u64 = 0;
    let mut file_count = 0usize;

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e, IGNORED_DIRS));

    for entry in walker.filter_map(std::result::Result::ok) {
        // `Path::is_file` follows symlinks, so linked files are counted too.
        if !entry.path().is_file() || !is_counted(entry.path()) {
            continue;
        }
        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        // Invalid UTF-8 sequences are dropped rather than counted.
        let chars = String::from_utf8_lossy(&bytes)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .count();
        total_chars += chars as u64;
        file_count += 1;
    }

    let tokens = total_chars / CHARS_PER_TOKEN;
    debug!(root = %root.display(), file_count, tokens, "Estimated project size");
    tokens
}

pub fn classify(root: &Path) -> ProjectSize {
    ProjectSize::from_tokens(estimate_tokens(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_chars(dir: &Path, name: &str, count: usize) {
        if let Some(parent) = dir.join(name).parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dir.join(name), "a".repeat(count)).unwrap();
    }

    #[test]
    fn thresholds() {
        assert_eq!(ProjectSize::from_tokens(0), ProjectSize::Small);
        assert_eq!(ProjectSize::from_tokens(99_999), ProjectSize::Small);
        assert_eq!(ProjectSize::from_tokens(100_000), ProjectSize::Medium);
        assert_eq!(ProjectSize::from_tokens(399_999), ProjectSize::Medium);
        assert_eq!(ProjectSize::from_tokens(400_000), ProjectSize::Large);
    }

    #[test]
    fn small_medium_boundary_on_disk() {
        let dir = TempDir::new().unwrap();
        write_chars(dir.path(), "notes.txt", 99_999 * 4);
        assert_eq!(estimate_tokens(dir.path()), 99_999);
        assert_eq!(classify(dir.path()), ProjectSize::Small);

        write_chars(dir.path(), "more.md", 4);
        assert_eq!(estimate_tokens(dir.path()), 100_000);
        assert_eq!(classify(dir.path()), ProjectSize::Medium);
    }

    #[test]
    fn medium_large_boundary_on_disk() {
        let dir = TempDir::new().unwrap();
        write_chars(dir.path(), "src/big.py", 399_999 * 4);
        assert_eq!(classify(dir.path()), ProjectSize::Medium);

        write_chars(dir.path(), "src/extra.rs", 4);
        assert_eq!(classify(dir.path()), ProjectSize::Large);
    }

    #[test]
    fn ignored_directories_do_not_count() {
        let dir = TempDir::new().unwrap();
        write_chars(dir.path(), "node_modules/lib/index.js", 2_000_000);
        write_chars(dir.path(), ".git/objects/pack.txt", 2_000_000);
        write_chars(dir.path(), "target/debug/out.json", 2_000_000);
        write_chars(dir.path(), "main.py", 40);

        assert_eq!(estimate_tokens(dir.path()), 10);
        assert_eq!(classify(dir.path()), ProjectSize::Small);
    }

    #[test]
    fn only_listed_extensions_count() {
        let dir = TempDir::new().unwrap();
        write_chars(dir.path(), "blob.bin", 4_000_000);
        write_chars(dir.path(), "Makefile", 4_000);
        write_chars(dir.path(), "README.MD", 8);

        assert_eq!(estimate_tokens(dir.path()), 2);
    }

    #[test]
    fn invalid_utf8_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"abcd".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        bytes.extend_from_slice(b"efgh");
        fs::write(dir.path().join("mixed.txt"), bytes).unwrap();

        assert_eq!(estimate_tokens(dir.path()), 2);
    }

    #[test]
    fn missing_root_is_small() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert_eq!(estimate_tokens(&missing), 0);
        assert_eq!(classify(&missing), ProjectSize::Small);
    }

    #[test]
    fn root_named_like_ignored_dir_is_still_scanned() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("build");
        write_chars(&root, "app.ts", 400);
        assert_eq!(estimate_tokens(&root), 100);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_counted() {
        let dir = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        write_chars(shared.path(), "shared.py", 400);
        std::os::unix::fs::symlink(shared.path().join("shared.py"), dir.path().join("linked.py"))
            .unwrap();

        assert_eq!(estimate_tokens(dir.path()), 100);
    }
}
