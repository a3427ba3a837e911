//! Interaction source driven by direct calls.
//!
//! Hosts that already have their own event loop call [`interact`] and
//! [`teardown`] from their click and shutdown handlers. Tests use it to
//! simulate user activity.
//!
//! [`interact`]: ManualInteractionSource::interact
//! [`teardown`]: ManualInteractionSource::teardown

use crate::interaction::{HookRegistry, InteractionEvent, InteractionHook, InteractionSource};

/// An interaction source whose events are raised by the caller.
#[derive(Default)]
pub struct ManualInteractionSource {
    hooks: HookRegistry,
}

impl ManualInteractionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal a user interaction. Returns the number of hooks fired.
    pub fn interact(&self) -> usize {
        self.hooks.fire(InteractionEvent::Interaction)
    }

    /// Signal session teardown. Returns the number of hooks fired.
    pub fn teardown(&self) -> usize {
        self.hooks.fire(InteractionEvent::Teardown)
    }

    /// Number of hooks registered for `event`.
    pub fn hook_count(&self, event: InteractionEvent) -> usize {
        self.hooks.count(event)
    }
}

impl InteractionSource for ManualInteractionSource {
    fn on_interaction(&self, hook: InteractionHook) {
        self.hooks.add(InteractionEvent::Interaction, hook);
    }

    fn on_teardown(&self, hook: InteractionHook) {
        self.hooks.add(InteractionEvent::Teardown, hook);
    }
}
