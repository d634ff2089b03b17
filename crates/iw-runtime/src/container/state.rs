//! # Installation State
//!
//! Which installs already happened: once per process for the interception
//! layer, once per context for everything else. Held by one `IpcWatch`
//! and injectable, so tests can start from a clean slate.

use parking_lot::Mutex;
use shared_types::ContextId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Default)]
pub struct InstallationState {
    process: AtomicBool,
    contexts: Mutex<HashSet<ContextId>>,
}

static GLOBAL_STATE: OnceLock<Arc<InstallationState>> = OnceLock::new();

impl InstallationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance.
    #[must_use]
    pub fn global() -> Arc<Self> {
        GLOBAL_STATE.get_or_init(|| Arc::new(Self::new())).clone()
    }

    #[must_use]
    pub fn is_process_installed(&self) -> bool {
        self.process.load(Ordering::SeqCst)
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn mark_process_installed(&self) -> bool {
        !self.process.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_installed(&self, context_id: &ContextId) -> bool {
        self.contexts.lock().contains(context_id)
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn mark_installed(&self, context_id: &ContextId) -> bool {
        self.contexts.lock().insert(context_id.clone())
    }

    #[must_use]
    pub fn installed_contexts(&self) -> usize {
        self.contexts.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_transition_happens_once() {
        let state = InstallationState::new();
        assert!(!state.is_process_installed());
        assert!(state.mark_process_installed());
        assert!(!state.mark_process_installed());
        assert!(state.is_process_installed());
    }

    #[test]
    fn test_contexts_are_independent() {
        let state = InstallationState::new();
        let default = ContextId::default_context();
        let partition = ContextId::partition("persist:a");

        assert!(state.mark_installed(&default));
        assert!(!state.mark_installed(&default));
        assert!(!state.is_installed(&partition));
        assert!(state.mark_installed(&partition));
        assert_eq!(state.installed_contexts(), 2);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&InstallationState::global(), &InstallationState::global()));
    }
}
