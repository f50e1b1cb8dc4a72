//! # Factory Registries
//!
//! Name-keyed factory tables for controllers and blocks, populated when the
//! framework is built. A registry also acts as a [`Tree`], so the same
//! cascading resolver that walks template directories walks registered
//! keys: registering `auth/login` makes `auth` a directory and
//! `auth/login` a file.
//!
//! Keys are case-folded and use `/` between segments.

use crate::error::{Error, Result};
use crate::resolve::{split_logical, PathResolver, Tree};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

/// Normalize a logical name into a registry key (`Shared.Head` -> `shared/head`)
#[must_use]
pub fn normalize_key(name: &str) -> String {
    split_logical(name)
        .iter()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("/")
}

fn path_key(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_lowercase()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Sorted table of factories addressed by normalized key
pub struct Registry<F> {
    kind: &'static str,
    entries: BTreeMap<String, F>,
}

impl<F> Registry<F> {
    /// Create an empty registry; `kind` names it in errors (`controller`, `block`)
    #[must_use]
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`, returning any factory it replaced
    pub fn insert(&mut self, name: &str, factory: F) -> Option<F> {
        self.entries.insert(normalize_key(name), factory)
    }

    /// Look up a factory by logical name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&F> {
        self.entries.get(&normalize_key(name))
    }

    /// Look up a factory by the path a resolver returned
    #[must_use]
    pub fn get_path(&self, path: &Path) -> Option<&F> {
        self.entries.get(&path_key(path))
    }

    /// Look up a factory, failing when it is absent
    ///
    /// # Errors
    ///
    /// Returns `Error::ClassNotFound` when nothing is registered under `name`.
    pub fn require(&self, name: &str) -> Result<&F> {
        self.get(name).ok_or_else(|| Error::ClassNotFound {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    /// A cascading resolver over the registered keys
    #[must_use]
    pub fn resolver(&self) -> PathResolver<'_, Self> {
        PathResolver::new(self, "", "")
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered factories
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<F> Tree for Registry<F> {
    fn is_file(&self, path: &Path) -> bool {
        self.entries.contains_key(&path_key(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let key = path_key(path);
        if key.is_empty() {
            return !self.entries.is_empty();
        }
        let prefix = format!("{key}/");
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(candidate, _)| candidate.starts_with(&prefix))
    }
}

impl<F> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
