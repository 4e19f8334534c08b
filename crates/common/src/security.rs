//! Path confinement for everything that touches the working directory.
//!
//! Agents address files relative to the working directory. Before any read
//! or mutation the relative name is resolved and checked to still lie under
//! the working directory's canonical path. Symlinks on the way are followed,
//! dangling ones included, so they cannot be used to escape.

use crate::{CrewError, Result};
use std::path::{Component, Path, PathBuf};

/// A canonicalized working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Canonicalize `path`. Fails if it does not exist or is not a directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let root = path.canonicalize().map_err(|e| {
            CrewError::Config(format!(
                "Failed to resolve working directory '{}': {}",
                path.display(),
                e
            ))
        })?;

        if !root.is_dir() {
            return Err(CrewError::Config(format!(
                "Working directory '{}' is not a directory",
                path.display()
            )));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` under this directory, see [`resolve_within`].
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        resolve_within(&self.root, relative)
    }

    /// Display form of `path` relative to the root, falling back to the full path.
    pub fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }
}

/// Symlinks followed while resolving one path before giving up.
const MAX_SYMLINK_HOPS: usize = 40;

/// Resolve `relative` against the canonical `root` and verify the result
/// stays inside `root`.
///
/// - `..` components are applied lexically
/// - every existing symlink on the way is followed, dangling ones included
/// - absolute inputs are accepted only if they land inside `root`
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = root.join(relative.trim());
    let resolved = resolve_links(&candidate, &mut 0)?;

    if !resolved.starts_with(root) {
        return Err(CrewError::Tool(format!(
            "Path '{}' resolves outside the working directory {}",
            relative,
            root.display()
        )));
    }

    Ok(resolved)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Walk `path` component by component, replacing each symlink with its
/// target. Unlike `canonicalize` this also resolves links whose target does
/// not exist yet.
fn resolve_links(path: &Path, hops: &mut usize) -> Result<PathBuf> {
    let mut current = PathBuf::new();
    for component in normalize_lexically(path).components() {
        let Component::Normal(part) = component else {
            current.push(component.as_os_str());
            continue;
        };

        let next = current.join(part);
        match std::fs::symlink_metadata(&next) {
            Ok(meta) if meta.file_type().is_symlink() => {
                *hops += 1;
                if *hops > MAX_SYMLINK_HOPS {
                    return Err(CrewError::Tool(format!(
                        "Too many levels of symbolic links at '{}'",
                        next.display()
                    )));
                }
                let target = std::fs::read_link(&next)?;
                current = resolve_links(&current.join(target), hops)?;
            }
            _ => current = next,
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn work_dir() -> (TempDir, WorkDir) {
        let dir = TempDir::new().unwrap();
        let wd = WorkDir::new(dir.path()).unwrap();
        (dir, wd)
    }

    #[test]
    fn test_resolves_plain_relative_path() {
        let (_dir, wd) = work_dir();
        let resolved = wd.resolve("src/main.rs").unwrap();
        assert_eq!(resolved, wd.root().join("src/main.rs"));
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let (_dir, wd) = work_dir();
        assert!(wd.resolve("../../etc/passwd").is_err());
        assert!(wd.resolve("src/../../outside.txt").is_err());
    }

    #[test]
    fn test_allows_inner_parent_components() {
        let (_dir, wd) = work_dir();
        let resolved = wd.resolve("src/../README.md").unwrap();
        assert_eq!(resolved, wd.root().join("README.md"));
    }

    #[test]
    fn test_rejects_absolute_path_outside() {
        let (_dir, wd) = work_dir();
        assert!(wd.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn test_accepts_absolute_path_inside() {
        let (_dir, wd) = work_dir();
        let inside = wd.root().join("notes.txt");
        let resolved = wd.resolve(inside.to_str().unwrap()).unwrap();
        assert_eq!(resolved, inside);
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let (_dir, wd) = work_dir();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), wd.root().join("link")).unwrap();

        assert!(wd.resolve("link/secret.txt").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_dangling_symlink_escape() {
        let (_dir, wd) = work_dir();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, wd.root().join("link")).unwrap();

        assert!(wd.resolve("link").is_err());
        assert!(wd.resolve("./link").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_follows_symlinks_that_stay_inside() {
        let (_dir, wd) = work_dir();
        std::fs::create_dir(wd.root().join("real")).unwrap();
        std::os::unix::fs::symlink("real", wd.root().join("alias")).unwrap();
        std::os::unix::fs::symlink("real/new.txt", wd.root().join("pending")).unwrap();

        assert_eq!(wd.resolve("alias/a.txt").unwrap(), wd.root().join("real/a.txt"));
        assert_eq!(wd.resolve("pending").unwrap(), wd.root().join("real/new.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_an_error() {
        let (_dir, wd) = work_dir();
        std::os::unix::fs::symlink("b", wd.root().join("a")).unwrap();
        std::os::unix::fs::symlink("a", wd.root().join("b")).unwrap();

        assert!(wd.resolve("a/file.txt").is_err());
    }

    #[test]
    fn test_work_dir_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(WorkDir::new(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_work_dir_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(WorkDir::new(&file).is_err());
    }

    #[test]
    fn test_display_relative() {
        let (_dir, wd) = work_dir();
        let path = wd.root().join("a/b.txt");
        assert_eq!(wd.display_relative(&path), format!("a{}b.txt", std::path::MAIN_SEPARATOR));
    }
}
