//! Shared manager lifecycle: the state machine every manager follows and
//! the trait the coordinator drives them through.

use std::cell::Cell;
use std::fmt;

use serde::Serialize;

use crate::error::FolioError;

/// Lifecycle state of a manager (and of the coordinator itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ManagerState {
    /// Constructed, `init` never called.
    Uninitialized,
    /// `init` in progress.
    Initializing,
    /// Fully initialized.
    Ready,
    /// Torn down; may be initialized again.
    Destroyed,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Interior-mutable holder for a [`ManagerState`] with the transition rules
/// baked in.
#[derive(Debug)]
pub struct StateCell(Cell<ManagerState>);

impl Default for StateCell {
    fn default() -> Self {
        Self(Cell::new(ManagerState::Uninitialized))
    }
}

impl StateCell {
    /// Current state.
    pub fn get(&self) -> ManagerState {
        self.0.get()
    }

    /// Enter `Initializing`. Returns `false` (and changes nothing) when the
    /// manager is already ready or mid-init, making `init` idempotent.
    pub fn begin_init(&self) -> bool {
        match self.0.get() {
            ManagerState::Ready | ManagerState::Initializing => false,
            ManagerState::Uninitialized | ManagerState::Destroyed => {
                self.0.set(ManagerState::Initializing);
                true
            }
        }
    }

    /// Finish a successful init.
    pub fn ready(&self) {
        self.0.set(ManagerState::Ready);
    }

    /// Roll back a failed init so it can be retried.
    pub fn failed(&self) {
        self.0.set(ManagerState::Uninitialized);
    }

    /// Enter `Destroyed` from any state. Returns whether anything was live
    /// (i.e. the previous state was `Initializing` or `Ready`).
    pub fn destroy(&self) -> bool {
        let was_live = matches!(
            self.0.get(),
            ManagerState::Initializing | ManagerState::Ready
        );
        self.0.set(ManagerState::Destroyed);
        was_live
    }

    /// Whether the state is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.0.get() == ManagerState::Ready
    }
}

/// A behavior manager driven by the application coordinator.
///
/// Managers are single-threaded and use interior mutability, so every
/// operation takes `&self`.
pub trait Manager {
    /// Registry name (`navigation`, `observers`, ...).
    fn name(&self) -> &'static str;

    /// Current lifecycle state.
    fn state(&self) -> ManagerState;

    /// Set up every listener, watcher, timer and injected node. A no-op
    /// while already ready.
    fn init(&self) -> Result<(), FolioError>;

    /// Release everything `init` created. Safe in any state.
    fn destroy(&self);

    /// React to a (debounced) viewport resize.
    fn handle_resize(&self) {}

    /// JSON status snapshot for diagnostics.
    fn status(&self) -> serde_json::Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_while_ready() {
        let state = StateCell::default();
        assert!(state.begin_init());
        assert!(!state.begin_init());
        state.ready();
        assert!(!state.begin_init());
        assert!(state.is_ready());
    }

    #[test]
    fn destroyed_managers_can_restart() {
        let state = StateCell::default();
        assert!(!state.destroy());
        assert_eq!(state.get(), ManagerState::Destroyed);
        assert!(state.begin_init());
        state.ready();
        assert!(state.destroy());
        assert!(state.begin_init());
    }

    #[test]
    fn failed_init_rolls_back() {
        let state = StateCell::default();
        assert!(state.begin_init());
        state.failed();
        assert_eq!(state.get(), ManagerState::Uninitialized);
        assert_eq!(state.get().to_string(), "uninitialized");
    }
}
