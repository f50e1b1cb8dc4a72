//! # Controllers
//!
//! A controller is a set of named actions. The router picks the controller
//! from the [`ControllerRegistry`] by cascading over its keys, then the
//! dispatcher asks the instance whether it has the action before invoking it.
//!
//! Implementations are normally generated by the `#[controller]` attribute:
//!
//! ```ignore
//! #[derive(Default)]
//! struct Home;
//!
//! #[controller]
//! impl Home {
//!     pub fn index(&mut self, app: &mut App<'_>, args: &[String]) -> Result<()> {
//!         app.echo("hello");
//!         Ok(())
//!     }
//! }
//! ```

use crate::app::App;
use crate::error::Result;
use crate::registry::Registry;
use std::sync::Arc;

/// A request handler exposing named actions
pub trait Controller: Send {
    /// The action names this controller answers to
    fn actions(&self) -> &'static [&'static str];

    /// Whether `action` names one of [`Controller::actions`], ignoring ASCII case
    fn has_action(&self, action: &str) -> bool {
        self.actions()
            .iter()
            .any(|known| known.eq_ignore_ascii_case(action))
    }

    /// Run `action` with the positional `args` left over from routing
    ///
    /// # Errors
    ///
    /// Returns `Error::MethodNotFound` for an unknown action, or whatever the
    /// action itself fails with.
    fn invoke(&mut self, action: &str, app: &mut App<'_>, args: &[String]) -> Result<()>;
}

/// Builds a fresh controller for each request
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Controller factories keyed by route (`home`, `auth/login`)
pub type ControllerRegistry = Registry<ControllerFactory>;

/// Wrap a `Default` controller type as a factory
pub fn factory<C>() -> ControllerFactory
where
    C: Controller + Default + 'static,
{
    Arc::new(|| Box::new(C::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct Pages;

    impl Controller for Pages {
        fn actions(&self) -> &'static [&'static str] {
            &["index", "show_page"]
        }

        fn invoke(&mut self, action: &str, _app: &mut App<'_>, _args: &[String]) -> Result<()> {
            Err(Error::MethodNotFound {
                controller: "Pages_Controller".to_string(),
                method: action.to_string(),
            })
        }
    }

    #[test]
    fn test_has_action_ignores_case() {
        let pages = Pages;
        assert!(pages.has_action("index"));
        assert!(pages.has_action("Show_Page"));
        assert!(!pages.has_action("delete"));
    }

    #[test]
    fn test_factory_builds_fresh_instances() {
        let mut registry = ControllerRegistry::new("controller");
        registry.insert("pages", factory::<Pages>());
        let build = registry.get("Pages").unwrap();
        assert_eq!(build().actions().len(), 2);
    }
}
