//! # Route Metadata
//!
//! The outcome of routing one request, and the rewrite table applied
//! before routing.

use crate::config::lookup;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The controller a request was routed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerRoute {
    /// Derived class-style name (`Auth_Login_Controller`)
    pub name: String,
    /// Registry key the factory was found under (`auth/login`)
    pub key: String,
}

/// The action a request was routed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCall {
    /// Action name
    pub name: String,
    /// Positional arguments, in URL order
    pub args: Vec<String>,
}

/// Resolved route for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteResult {
    /// Selected controller
    pub controller: ControllerRoute,
    /// Selected action and its arguments
    pub method: MethodCall,
}

impl RouteResult {
    /// The selected controller
    #[must_use]
    pub const fn controller(&self) -> &ControllerRoute {
        &self.controller
    }

    /// The selected action
    #[must_use]
    pub const fn method(&self) -> &MethodCall {
        &self.method
    }

    /// Look up a field by dotted path (`method.args.0`, `controller.name`)
    ///
    /// Unknown keys yield `None`.
    #[must_use]
    pub fn get(&self, dotted: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
        lookup(&root, &segments).cloned()
    }
}

/// Literal URL-prefix rewrites (`/old/path` -> `new@action`)
///
/// Keys are stored in normalized `a/b` form; matching picks the longest
/// prefix of the request segments present in the table.
#[derive(Debug, Clone, Default)]
pub struct Rewrites {
    rules: HashMap<String, Vec<String>>,
    longest: usize,
}

impl Rewrites {
    /// An empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from the `routes.rewrites` mapping
    ///
    /// Entries whose target is not a string are skipped.
    #[must_use]
    pub fn from_config(rules: Option<&Value>) -> Self {
        let mut table = Self::new();
        let Some(Value::Object(map)) = rules else {
            return table;
        };
        for (from, target) in map {
            match target.as_str() {
                Some(target) => table.insert(from, target),
                None => warn!(rewrite = %from, "Ignoring rewrite with non-string target"),
            }
        }
        table
    }

    /// Add a rule; `target` has the form `controller@method` or `controller`
    pub fn insert(&mut self, from: &str, target: &str) {
        let key = segments(from);
        let replacement = target_segments(target);
        if key.is_empty() || replacement.is_empty() {
            warn!(rewrite = %from, target = %target, "Ignoring empty rewrite rule");
            return;
        }
        self.longest = self.longest.max(key.len());
        self.rules.insert(key.join("/"), replacement);
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rewrite `segments` if a prefix of them matches a rule
    ///
    /// The matched prefix is replaced by the rule's target segments and the
    /// unmatched tail is kept.
    #[must_use]
    pub fn apply(&self, segments: &[String]) -> Option<Vec<String>> {
        let upper = segments.len().min(self.longest);
        (1..=upper).rev().find_map(|k| {
            let prefix = segments[..k].join("/");
            self.rules.get(&prefix).map(|target| {
                debug!(from = %prefix, to = %target.join("/"), "Rewrite applied");
                target
                    .iter()
                    .cloned()
                    .chain(segments[k..].iter().cloned())
                    .collect()
            })
        })
    }
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `Auth_Login_Controller@check` -> `["auth", "login", "check"]`
fn target_segments(target: &str) -> Vec<String> {
    let (controller, method) = target.split_once('@').unwrap_or((target, ""));
    let controller = strip_controller_suffix(&controller.trim().to_lowercase()).to_string();
    let joined = if method.trim().is_empty() {
        controller
    } else {
        format!("{controller}_{}", method.trim())
    };
    joined
        .replace('_', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove a trailing `_controller`, ignoring ASCII case
pub(crate) fn strip_controller_suffix(name: &str) -> &str {
    const SUFFIX: &str = "_controller";
    if name.len() > SUFFIX.len() {
        let cut = name.len() - SUFFIX.len();
        if let Some(tail) = name.get(cut..) {
            if tail.eq_ignore_ascii_case(SUFFIX) {
                return &name[..cut];
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owned(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_string()).collect()
    }

    fn sample() -> RouteResult {
        RouteResult {
            controller: ControllerRoute {
                name: "Auth_Login_Controller".to_string(),
                key: "auth/login".to_string(),
            },
            method: MethodCall {
                name: "check".to_string(),
                args: owned(&["7", "x"]),
            },
        }
    }

    #[test]
    fn test_route_result_dotted_lookup() {
        let route = sample();
        assert_eq!(route.get("controller.name"), Some(json!("Auth_Login_Controller")));
        assert_eq!(route.get("method.args.1"), Some(json!("x")));
        assert_eq!(route.get("method.missing"), None);
        assert_eq!(route.get("method.args.9"), None);
    }

    #[test]
    fn test_target_segments() {
        assert_eq!(target_segments("new@action"), owned(&["new", "action"]));
        assert_eq!(
            target_segments("Auth_Login_Controller@check"),
            owned(&["auth", "login", "check"])
        );
        assert_eq!(target_segments("Blog_Controller"), owned(&["blog"]));
    }

    #[test]
    fn test_rewrite_keeps_tail() {
        let rewrites = Rewrites::from_config(Some(&json!({ "/old/path": "new@action" })));
        assert_eq!(
            rewrites.apply(&owned(&["old", "path", "5"])),
            Some(owned(&["new", "action", "5"]))
        );
        assert_eq!(rewrites.apply(&owned(&["old"])), None);
        assert_eq!(rewrites.apply(&owned(&["other", "path"])), None);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut rewrites = Rewrites::new();
        rewrites.insert("/shop", "store@index");
        rewrites.insert("/shop/cart", "basket@view");
        assert_eq!(
            rewrites.apply(&owned(&["shop", "cart", "2"])),
            Some(owned(&["basket", "view", "2"]))
        );
        assert_eq!(
            rewrites.apply(&owned(&["shop", "items"])),
            Some(owned(&["store", "index", "items"]))
        );
    }

    #[test]
    fn test_invalid_rules_are_skipped() {
        let rewrites = Rewrites::from_config(Some(&json!({ "/a": 3, "/": "x@y", "/b": "" })));
        assert!(rewrites.is_empty());
        assert!(Rewrites::from_config(None).is_empty());
    }

    #[test]
    fn test_strip_controller_suffix() {
        assert_eq!(strip_controller_suffix("Home_Controller"), "Home");
        assert_eq!(strip_controller_suffix("home_CONTROLLER"), "home");
        assert_eq!(strip_controller_suffix("home"), "home");
        assert_eq!(strip_controller_suffix("_controller"), "_controller");
    }
}
