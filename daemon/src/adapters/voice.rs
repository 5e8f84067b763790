//! Push-to-talk voice assistant adapter
//!
//! Conversations block for their whole duration, so the assistant runs on a
//! dedicated thread that waits for the push-to-talk trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::action::{Action, ActionToken, Source};
use crate::dispatch::{Dispatcher, Submission};

/// Spoken back when the assistant heard nothing usable
pub const DEFAULT_PROMPT: &str = "Say a command";

const TRIGGER_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("conversation failed: {0}")]
    Conversation(String),

    #[error("voice listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn voice thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Result of one conversation turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Utterance {
    /// Transcript or reply to show
    pub message: Option<String>,
    /// Device action the assistant recognised, with its arguments
    pub command: Option<(String, Vec<Value>)>,
}

/// A speech backend able to hold one conversation turn
pub trait VoiceAssistant: Send + 'static {
    fn converse(&mut self) -> Result<Utterance, AssistantError>;
}

/// Push-to-talk flag shared between the handler and the voice thread
#[derive(Debug, Clone, Default)]
pub struct AssistantTrigger(Arc<AtomicBool>);

impl AssistantTrigger {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Test and clear
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Map an utterance onto a device action
pub fn utterance_action(utterance: Utterance) -> Action {
    let message = utterance.message;

    if let Some((kind, args)) = utterance.command {
        match Action::from_parts(&kind, &args) {
            Ok(action) => return action,
            Err(e) => warn!(command = %kind, error = %e, "unusable assistant command"),
        }
    }

    Action::AssistantMsg {
        message: message.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
    }
}

pub struct VoiceListener {
    trigger: AssistantTrigger,
    dispatcher: Dispatcher,
    running: Arc<AtomicBool>,
}

impl VoiceListener {
    pub fn new(trigger: AssistantTrigger, dispatcher: Dispatcher) -> Self {
        Self {
            trigger,
            dispatcher,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the voice thread driving `assistant`
    pub fn start<A: VoiceAssistant>(&self, assistant: A) -> Result<(), AssistantError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AssistantError::AlreadyRunning);
        }

        let trigger = self.trigger.clone();
        let dispatcher = self.dispatcher.clone();
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("voice-assistant".to_string())
            .spawn(move || {
                info!("voice thread started");
                run_voice_loop(assistant, &trigger, &dispatcher, &running);
                running.store(false, Ordering::SeqCst);
                info!("voice thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn run_voice_loop<A: VoiceAssistant>(
    mut assistant: A,
    trigger: &AssistantTrigger,
    dispatcher: &Dispatcher,
    running: &AtomicBool,
) {
    while running.load(Ordering::SeqCst) {
        if !trigger.take() {
            thread::sleep(TRIGGER_POLL);
            continue;
        }

        debug!("push-to-talk triggered");
        let utterance = match assistant.converse() {
            Ok(utterance) => utterance,
            Err(e) => {
                error!(error = %e, "assistant conversation failed");
                continue;
            }
        };

        let action = utterance_action(utterance);
        if dispatcher.submit(ActionToken::new(action, Source::Voice)) == Submission::Closed {
            break;
        }
    }
}
