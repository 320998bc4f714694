//! Lifecycle hooks.
//!
//! An application can observe devices entering, changing in and leaving the
//! service by registering a [`DeviceLifecycleHooks`] implementation. Hooks
//! may only be registered before the service starts serving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::model::{AdminState, ProtocolDescriptor};

/// Callbacks fired on device lifecycle transitions. Every method defaults to
/// doing nothing, so implementors override only what they need.
pub trait DeviceLifecycleHooks: Send + Sync {
    /// A device became owned by this service.
    fn on_add(&self, _name: &str, _protocols: &[ProtocolDescriptor], _admin_state: AdminState) {}

    /// An owned device's protocols changed.
    fn on_update(&self, _name: &str, _protocols: &[ProtocolDescriptor], _admin_state: AdminState) {
    }

    /// A device was deleted or moved to another service.
    fn on_remove(&self, _name: &str, _protocols: &[ProtocolDescriptor]) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("Lifecycle hooks must be registered before the service starts")]
    AlreadyStarted,
}

/// Holds the single hook set for a service.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Option<Arc<dyn DeviceLifecycleHooks>>>,
    started: AtomicBool,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hook set, replacing any earlier registration.
    ///
    /// Fails once [`mark_started`](Self::mark_started) has been called; the
    /// existing hooks are left in place.
    pub fn register(&self, hooks: Arc<dyn DeviceLifecycleHooks>) -> Result<(), HookError> {
        let mut slot = self.hooks.write();
        if self.started.load(Ordering::Acquire) {
            warn!("Lifecycle hooks can only be registered before the service starts");
            return Err(HookError::AlreadyStarted);
        }
        *slot = Some(hooks);
        Ok(())
    }

    /// Close registration. Taking the write lock orders this after any
    /// registration already in progress.
    pub fn mark_started(&self) {
        let _slot = self.hooks.write();
        self.started.store(true, Ordering::Release);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn has_hooks(&self) -> bool {
        self.hooks.read().is_some()
    }

    fn current(&self) -> Option<Arc<dyn DeviceLifecycleHooks>> {
        self.hooks.read().clone()
    }

    pub fn fire_add(&self, name: &str, protocols: &[ProtocolDescriptor], admin_state: AdminState) {
        if let Some(hooks) = self.current() {
            hooks.on_add(name, protocols, admin_state);
        }
    }

    pub fn fire_update(
        &self,
        name: &str,
        protocols: &[ProtocolDescriptor],
        admin_state: AdminState,
    ) {
        if let Some(hooks) = self.current() {
            hooks.on_update(name, protocols, admin_state);
        }
    }

    pub fn fire_remove(&self, name: &str, protocols: &[ProtocolDescriptor]) {
        if let Some(hooks) = self.current() {
            hooks.on_remove(name, protocols);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counting {
        calls: Mutex<Vec<String>>,
    }

    impl DeviceLifecycleHooks for Counting {
        fn on_add(&self, name: &str, _: &[ProtocolDescriptor], _: AdminState) {
            self.calls.lock().push(format!("add:{}", name));
        }
    }

    struct Silent;
    impl DeviceLifecycleHooks for Silent {}

    #[test]
    fn test_register_before_start() {
        let registry = HookRegistry::new();
        assert!(!registry.has_hooks());
        let hooks = Arc::new(Counting::default());
        registry.register(hooks.clone()).unwrap();
        registry.fire_add("d1", &[], AdminState::Unlocked);
        // default no-op bodies
        registry.fire_update("d1", &[], AdminState::Unlocked);
        registry.fire_remove("d1", &[]);
        assert_eq!(*hooks.calls.lock(), vec!["add:d1".to_string()]);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = HookRegistry::new();
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        registry.register(first.clone()).unwrap();
        registry.register(second.clone()).unwrap();
        registry.fire_add("d1", &[], AdminState::Unlocked);
        assert!(first.calls.lock().is_empty());
        assert_eq!(second.calls.lock().len(), 1);
    }

    #[test]
    fn test_register_after_start_rejected() {
        let registry = HookRegistry::new();
        let hooks = Arc::new(Counting::default());
        registry.register(hooks.clone()).unwrap();
        registry.mark_started();

        assert_eq!(registry.register(Arc::new(Silent)), Err(HookError::AlreadyStarted));
        registry.fire_add("d2", &[], AdminState::Locked);
        assert_eq!(*hooks.calls.lock(), vec!["add:d2".to_string()]);
    }

    #[test]
    fn test_fire_without_hooks() {
        let registry = HookRegistry::new();
        registry.fire_add("d1", &[], AdminState::Unlocked);
        registry.fire_remove("d1", &[]);
    }
}
