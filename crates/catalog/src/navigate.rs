//! The navigable URL, as far as the engine is concerned: query parameters
//! that are read once at mount and written back through history pushes.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub trait Navigator: Send + Sync {
    /// Current value of a query parameter.
    fn param(&self, name: &str) -> Option<String>;

    /// Set (`Some`) or remove (`None`) a query parameter by pushing a new
    /// history entry, without navigating away.
    fn push_param(&self, name: &str, value: Option<&str>);
}

/// Reads a boolean parameter the way links in the wild spell it.
pub(crate) fn read_flag(navigator: &dyn Navigator, name: &str) -> bool {
    matches!(navigator.param(name).as_deref(), Some("true" | "1"))
}

#[derive(Debug, Default)]
struct Location {
    params: BTreeMap<String, String>,
    /// Query strings of every pushed entry, oldest first.
    history: Vec<String>,
}

impl Location {
    fn query_string(&self) -> String {
        self.params.iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("&")
    }
}

/// In-process [`Navigator`] with a history stack. Useful for embedding
/// without a browser, and for asserting on URL updates.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    location: Mutex<Location>,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let params = params.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            location: Mutex::new(Location { params, history: Vec::new() }),
        }
    }

    /// Current query string, parameters in name order (`a=1&b=2`).
    pub fn query_string(&self) -> String {
        self.lock().query_string()
    }

    /// Query strings of every history entry pushed so far.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Location> {
        self.location.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for MemoryNavigator {
    fn param(&self, name: &str) -> Option<String> {
        self.lock().params.get(name).cloned()
    }

    fn push_param(&self, name: &str, value: Option<&str>) {
        let mut location = self.lock();
        match value {
            Some(value) => location.params.insert(name.to_string(), value.to_string()),
            None => location.params.remove(name),
        };
        let entry = location.query_string();
        location.history.push(entry);
    }
}
