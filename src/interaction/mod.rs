//! Interaction sources for immediate flushes.
//!
//! The connector never listens to a UI runtime directly. Instead the host
//! injects an [`InteractionSource`] that calls the registered hooks when the
//! user interacts with the page and when the session is torn down.

pub mod channel;
pub mod manual;

pub use channel::{ChannelInteractionSource, InteractionEvent};
pub use manual::ManualInteractionSource;

use std::sync::Arc;

/// A callback fired once per interaction or teardown event.
pub type InteractionHook = Arc<dyn Fn() + Send + Sync>;

/// Something that can notify the connector of user activity.
pub trait InteractionSource {
    /// Register a hook for user interactions (e.g. a click anywhere).
    fn on_interaction(&self, hook: InteractionHook);

    /// Register a hook for session teardown.
    fn on_teardown(&self, hook: InteractionHook);
}

impl<T: InteractionSource + ?Sized> InteractionSource for Arc<T> {
    fn on_interaction(&self, hook: InteractionHook) {
        (**self).on_interaction(hook)
    }

    fn on_teardown(&self, hook: InteractionHook) {
        (**self).on_teardown(hook)
    }
}

/// Registered hooks, shared by the source implementations.
#[derive(Default)]
pub(crate) struct HookRegistry {
    interaction: std::sync::Mutex<Vec<InteractionHook>>,
    teardown: std::sync::Mutex<Vec<InteractionHook>>,
}

impl HookRegistry {
    pub(crate) fn add(&self, event: InteractionEvent, hook: InteractionHook) {
        self.list(event)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(hook);
    }

    /// Fire every hook registered for `event`, returning how many ran.
    pub(crate) fn fire(&self, event: InteractionEvent) -> usize {
        // Clone out of the lock so a hook may register further hooks.
        let hooks: Vec<InteractionHook> = self
            .list(event)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        for hook in &hooks {
            hook();
        }
        hooks.len()
    }

    pub(crate) fn count(&self, event: InteractionEvent) -> usize {
        self.list(event)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn list(&self, event: InteractionEvent) -> &std::sync::Mutex<Vec<InteractionHook>> {
        match event {
            InteractionEvent::Interaction => &self.interaction,
            InteractionEvent::Teardown => &self.teardown,
        }
    }
}
