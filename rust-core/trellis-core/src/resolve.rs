//! # Cascading Path Resolver
//!
//! Translates a logical path such as `auth/login/password` or `shared.head`
//! into a concrete entry below a base directory.
//!
//! The direct concatenation is tried first. Failing that, the segments are
//! walked left to right and the first accumulated prefix that names a file
//! wins, so `auth/login` shadows `auth/login/password` unless the deeper
//! file exists. The walk stops as soon as a prefix is neither a file nor a
//! directory.
//!
//! The walk runs over the [`Tree`] trait so the same cascade serves the
//! real filesystem (templates, layouts, error pages) and the in-memory
//! controller and block registries.
//!
//! Logical paths are not sanitized against `..` segments; callers must not
//! feed untrusted input to a filesystem-backed resolver without checking.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Characters treated as directory separators inside a logical path
pub const SEPARATORS: [char; 5] = ['/', '.', '_', '|', ':'];

/// Split a logical path into its non-empty segments
#[must_use]
pub fn split_logical(path: &str) -> Vec<&str> {
    path.split(SEPARATORS).filter(|s| !s.is_empty()).collect()
}

/// A hierarchy the resolver can walk
pub trait Tree {
    /// Whether `path` names a leaf entry
    fn is_file(&self, path: &Path) -> bool;

    /// Whether `path` names an entry with children
    fn is_dir(&self, path: &Path) -> bool;
}

/// The local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystem;

impl Tree for FileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// A successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The concrete entry, extension included when it was needed
    pub path: PathBuf,
    /// How many logical segments were used to reach the entry
    pub consumed: usize,
}

/// Cascading lookup below a base directory
#[derive(Debug, Clone)]
pub struct PathResolver<'t, T: Tree + ?Sized> {
    tree: &'t T,
    base: PathBuf,
    extension: String,
}

impl<'t, T: Tree + ?Sized> PathResolver<'t, T> {
    /// Create a resolver over `tree` rooted at `base`, trying `extension` on each candidate
    pub fn new(tree: &'t T, base: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            tree,
            base: base.into(),
            extension: extension.into(),
        }
    }

    /// The base directory
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve a logical path
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` carrying the logical path when nothing resolves.
    pub fn resolve(&self, logical: &str) -> Result<Resolved> {
        self.resolve_parts(&split_logical(logical))
    }

    /// Resolve already-split segments
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` when the segments are empty or no prefix names a file.
    pub fn resolve_parts(&self, parts: &[&str]) -> Result<Resolved> {
        let not_found = || Error::RouteNotFound {
            path: parts.join("/"),
        };
        if parts.is_empty() {
            return Err(not_found());
        }

        let mut direct = self.base.clone();
        direct.extend(parts);
        if let Some(path) = self.file_at(&direct) {
            return Ok(Resolved {
                path,
                consumed: parts.len(),
            });
        }

        let mut current = self.base.clone();
        for (index, part) in parts.iter().enumerate() {
            current.push(part);
            if let Some(path) = self.file_at(&current) {
                return Ok(Resolved {
                    path,
                    consumed: index + 1,
                });
            }
            if !self.tree.is_dir(&current) {
                return Err(not_found());
            }
        }
        Err(not_found())
    }

    /// `path` relative to the resolver root, if it lies below it
    #[must_use]
    pub fn relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.base).ok()
    }

    /// The file for `candidate`, preferring the bare name over the extended one.
    /// A file wins over a directory of the same name.
    fn file_at(&self, candidate: &Path) -> Option<PathBuf> {
        if self.tree.is_file(candidate) {
            return Some(candidate.to_path_buf());
        }
        let extended = with_extension(candidate, &self.extension);
        self.tree.is_file(&extended).then_some(extended)
    }
}

/// Append `extension` verbatim (unlike `Path::with_extension`, dots inside names survive)
fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(extension);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_split_logical() {
        assert_eq!(split_logical("/auth/login"), vec!["auth", "login"]);
        assert_eq!(split_logical("shared.head"), vec!["shared", "head"]);
        assert_eq!(split_logical("a_b|c:d"), vec!["a", "b", "c", "d"]);
        assert!(split_logical("//..").is_empty());
    }

    #[test]
    fn test_resolves_direct_file() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/b.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        let found = resolver.resolve("a/b").unwrap();
        assert_eq!(found.path, dir.path().join("a/b.ext"));
        assert_eq!(found.consumed, 2);
    }

    #[test]
    fn test_shallow_file_wins() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/b.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        let found = resolver.resolve("a/b/c").unwrap();
        assert_eq!(found.path, dir.path().join("a/b.ext"));
        assert_eq!(found.consumed, 2);
    }

    #[test]
    fn test_deeper_file_beats_cascade_when_present() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "auth/login.ext");
        touch(dir.path(), "auth/login/password.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        let found = resolver.resolve("auth/login/password").unwrap();
        assert_eq!(found.path, dir.path().join("auth/login/password.ext"));
        assert_eq!(found.consumed, 3);
    }

    #[test]
    fn test_separator_characters_are_normalized() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "shared/head.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        for logical in ["shared.head", "shared_head", "shared|head", "shared:head"] {
            let found = resolver.resolve(logical).unwrap();
            assert_eq!(found.path, dir.path().join("shared/head.ext"));
        }
    }

    #[test]
    fn test_file_shadows_same_named_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "auth/login.ext");
        touch(dir.path(), "auth/login/password.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        let found = resolver.resolve("auth/login/check").unwrap();
        assert_eq!(found.path, dir.path().join("auth/login.ext"));
        assert_eq!(found.consumed, 2);
    }

    #[test]
    fn test_file_without_extension() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "plain");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        assert_eq!(resolver.resolve("plain").unwrap().path, dir.path().join("plain"));
    }

    #[test]
    fn test_directory_is_not_a_match() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/b/c.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        assert!(resolver.resolve("a/b").is_err());
    }

    #[test]
    fn test_missing_segment_fails() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/b.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        let err = resolver.resolve("x/b").unwrap_err();
        assert!(matches!(err, Error::RouteNotFound { .. }));
    }

    #[test]
    fn test_empty_path_fails() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        assert!(resolver.resolve("").is_err());
        assert!(resolver.resolve("/./").is_err());
    }

    #[test]
    fn test_relative_strips_base() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/b.ext");

        let resolver = PathResolver::new(&FileSystem, dir.path(), ".ext");
        let found = resolver.resolve("a/b").unwrap();
        assert_eq!(resolver.relative(&found.path), Some(Path::new("a/b.ext")));
    }
}
