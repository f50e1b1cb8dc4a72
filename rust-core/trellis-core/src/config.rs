//! # Config Store
//!
//! Loads every recognized file of the config directory once and answers
//! dotted-path queries against the result.
//!
//! Each file becomes one root entry keyed by its stem, so `config/app.toml`
//! is reachable as `app` and its `root_url` key as `app.root_url`. TOML
//! and JSON files are recognized; both are normalized into
//! [`serde_json::Value`].
//!
//! The store is immutable after construction. Lookups are memoized by the
//! literal path string.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Walk `root` along `segments`, indexing objects by key and arrays by position
#[must_use]
pub fn lookup<'v, S: AsRef<str>>(root: &'v Value, segments: &[S]) -> Option<&'v Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment.as_ref()),
            Value::Array(items) => segment
                .as_ref()
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        })
}

/// Render a scalar config value the way templates and routing expect it
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Immutable, memoized view over the config directory
#[derive(Debug, Default)]
pub struct ConfigStore {
    loaded: Value,
    cache: RwLock<HashMap<String, Option<Value>>>,
}

impl ConfigStore {
    /// A store with nothing loaded
    #[must_use]
    pub fn empty() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    /// A store over an already-built tree (one root entry per config file)
    #[must_use]
    pub fn from_value(loaded: Value) -> Self {
        Self {
            loaded,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load every `*.toml` and `*.json` file in `dir`
    ///
    /// A missing directory yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be listed or a file cannot be
    /// read, and `Error::Config` if a file does not parse.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Config directory missing, using empty config");
            return Ok(Self::empty());
        }

        let mut files = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        files.sort();

        let mut loaded = Map::new();
        for path in files.iter().filter(|p| p.is_file()) {
            let Some(value) = parse_file(path)? else {
                debug!(file = %path.display(), "Skipping unrecognized config file");
                continue;
            };
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if loaded.insert(stem.clone(), value).is_some() {
                warn!(key = %stem, file = %path.display(), "Config key loaded twice, last file wins");
            }
        }

        info!(dir = %dir.display(), files = loaded.len(), "Config loaded");
        Ok(Self::from_value(Value::Object(loaded)))
    }

    /// Look up a dotted path such as `routes.default_controller`
    ///
    /// Any missing segment yields `None`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(hit) = self
            .cache
            .read()
            .expect("Config cache lock poisoned")
            .get(path)
        {
            return hit.clone();
        }

        let segments: Vec<&str> = path.split('.').collect();
        let found = lookup(&self.loaded, &segments).cloned();
        self.cache
            .write()
            .expect("Config cache lock poisoned")
            .insert(path.to_string(), found.clone());
        found
    }

    /// Look up a dotted path and render it as a string if it is a scalar
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get(path).as_ref().and_then(scalar_to_string)
    }

    /// Look up a dotted path expected to hold a boolean
    #[must_use]
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).as_ref().and_then(Value::as_bool)
    }

    /// The whole loaded tree
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.loaded
    }
}

fn parse_file(path: &Path) -> Result<Option<Value>> {
    let config_error = |reason: String| Error::Config {
        file: path.display().to_string(),
        reason,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            let text = fs::read_to_string(path)?;
            toml::from_str::<Value>(&text)
                .map(Some)
                .map_err(|e| config_error(e.to_string()))
        }
        Some("json") => {
            let text = fs::read_to_string(path)?;
            serde_json::from_str::<Value>(&text)
                .map(Some)
                .map_err(|e| config_error(e.to_string()))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> ConfigStore {
        ConfigStore::from_value(json!({
            "app": { "root_url": "http://x", "name": "demo" },
            "routes": { "rewrites": { "/old/path": "new@action" } },
            "autoload": { "blocks": ["head", "footer"] }
        }))
    }

    #[test]
    fn test_dotted_lookup() {
        let config = store();
        assert_eq!(config.get("app.root_url"), Some(json!("http://x")));
        assert_eq!(config.get_str("app.name").as_deref(), Some("demo"));
    }

    #[test]
    fn test_missing_segment_is_none() {
        let config = store();
        assert_eq!(config.get("app.missing"), None);
        assert_eq!(config.get("nothing.at.all"), None);
        assert_eq!(config.get("app.root_url.deeper"), None);
    }

    #[test]
    fn test_whole_file_lookup() {
        let config = store();
        let routes = config.get("routes").unwrap();
        assert!(routes.get("rewrites").is_some());
    }

    #[test]
    fn test_array_index_lookup() {
        let config = store();
        assert_eq!(config.get_str("autoload.blocks.1").as_deref(), Some("footer"));
        assert_eq!(config.get("autoload.blocks.9"), None);
    }

    #[test]
    fn test_memoized_results_are_stable() {
        let config = store();
        assert!(config.cache.read().unwrap().is_empty());

        let first = config.get("app.root_url");
        let second = config.get("app.root_url");
        assert_eq!(first, second);
        assert_eq!(config.get("app.missing"), None);
        assert_eq!(config.get("app.missing"), None);

        let cache = config.cache.read().unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("app.root_url"), Some(&first));
        assert_eq!(cache.get("app.missing"), Some(&None));
    }

    #[test]
    fn test_load_toml_and_json_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.toml"), "root_url = \"http://x\"\n[db]\nport = 5432\n").unwrap();
        fs::write(dir.path().join("routes.json"), r#"{"default_controller": "Home_Controller"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let config = ConfigStore::load(dir.path()).unwrap();
        assert_eq!(config.get_str("app.root_url").as_deref(), Some("http://x"));
        assert_eq!(config.get_str("app.db.port").as_deref(), Some("5432"));
        assert_eq!(
            config.get_str("routes.default_controller").as_deref(),
            Some("Home_Controller")
        );
        assert_eq!(config.get("notes"), None);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.toml"), "this is = = not toml").unwrap();

        let err = ConfigStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_reports_malformed_json_as_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("routes.json"), "{\"default_controller\": ").unwrap();

        match ConfigStore::load(dir.path()).unwrap_err() {
            Error::Config { file, .. } => assert!(file.ends_with("routes.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = ConfigStore::load(&dir.path().join("nope")).unwrap();
        assert_eq!(config.get("app"), None);
    }
}
