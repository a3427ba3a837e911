//! Interaction source fed over a channel.
//!
//! Producers on any thread (a UI thread, a signal handler) send
//! [`InteractionEvent`]s; a dispatch thread fires the registered hooks.

use crate::interaction::{HookRegistry, InteractionHook, InteractionSource};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Kinds of events an interaction source reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionEvent {
    /// The user interacted with the host UI
    Interaction,
    /// The host session is going away
    Teardown,
}

/// Errors from the channel source.
#[derive(Debug)]
pub enum ChannelSourceError {
    AlreadyRunning,
    Spawn(String),
}

impl std::fmt::Display for ChannelSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelSourceError::AlreadyRunning => write!(f, "Dispatcher is already running"),
            ChannelSourceError::Spawn(e) => write!(f, "Failed to spawn dispatcher: {e}"),
        }
    }
}

impl std::error::Error for ChannelSourceError {}

/// An interaction source that dispatches events received on a channel.
pub struct ChannelInteractionSource {
    hooks: Arc<HookRegistry>,
    sender: Sender<InteractionEvent>,
    receiver: Receiver<InteractionEvent>,
    running: Arc<AtomicBool>,
}

impl ChannelInteractionSource {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            hooks: Arc::new(HookRegistry::default()),
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A sender producers use to raise events.
    pub fn sender(&self) -> Sender<InteractionEvent> {
        self.sender.clone()
    }

    /// Start the dispatch thread.
    ///
    /// The thread exits after dispatching a teardown event, or once every
    /// sender (including the one held by this source) is dropped.
    pub fn start(&self) -> Result<JoinHandle<()>, ChannelSourceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ChannelSourceError::AlreadyRunning);
        }

        let receiver = self.receiver.clone();
        let hooks = Arc::clone(&self.hooks);
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("interaction-dispatch".to_string())
            .spawn(move || {
                while let Ok(event) = receiver.recv() {
                    let fired = hooks.fire(event);
                    tracing::debug!(?event, fired, "Dispatched interaction event");
                    if event == InteractionEvent::Teardown {
                        break;
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                ChannelSourceError::Spawn(e.to_string())
            })
    }

    /// Check if the dispatch thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for ChannelInteractionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionSource for ChannelInteractionSource {
    fn on_interaction(&self, hook: InteractionHook) {
        self.hooks.add(InteractionEvent::Interaction, hook);
    }

    fn on_teardown(&self, hook: InteractionHook) {
        self.hooks.add(InteractionEvent::Teardown, hook);
    }
}
