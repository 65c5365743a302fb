//! Navigation seam between the session layer and whatever owns the view

use std::sync::{Mutex, PoisonError};

/// Where the user is and how to send them elsewhere
pub trait Navigator: Send + Sync {
    /// Path of the current view, without query string
    fn current_path(&self) -> String;

    fn navigate(&self, to: &str);
}

/// In-memory navigator that records every navigation
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![initial.into()]),
        }
    }

    /// Every location visited, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Full current location including any query string
    pub fn location(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        let location = self.location();
        match location.split_once('?') {
            Some((path, _)) => path.to_string(),
            None => location,
        }
    }

    fn navigate(&self, to: &str) {
        tracing::debug!(to, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(to.to_string());
    }
}
