//! Single-worker action queue with an explicit overflow policy
//!
//! At most `capacity + 1` tokens are admitted at once: one being handled and
//! up to `capacity` waiting. Anything beyond that is dropped on submit, never
//! buffered. Capacity 0 means a token arriving while another is being
//! handled is lost.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::action::ActionToken;
use crate::events::{self, DeviceEvent, EventBus};

/// Largest queue depth accepted by [`Dispatcher::spawn`]
pub const MAX_CAPACITY: usize = 1024;

/// Consumer of admitted tokens, run on the worker thread
pub trait ActionSink: Send + 'static {
    fn handle(&mut self, token: ActionToken);
}

/// Outcome of a submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// The worker was saturated; the token was discarded
    Dropped,
    /// The worker has stopped
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to spawn dispatcher thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Cloneable handle every adapter submits through
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<ActionToken>,
    admitted: Arc<AtomicUsize>,
    limit: usize,
    dropped: Arc<AtomicU64>,
    events: EventBus,
}

impl Dispatcher {
    /// Start the worker thread feeding `sink`
    pub fn spawn<S: ActionSink>(
        sink: S,
        capacity: usize,
        events: EventBus,
    ) -> Result<(Self, thread::JoinHandle<()>), DispatchError> {
        let capacity = capacity.min(MAX_CAPACITY);
        let limit = capacity + 1;
        let (tx, rx) = mpsc::channel(limit);
        let admitted = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            rx,
            sink,
            admitted: Arc::clone(&admitted),
        };
        let handle = thread::Builder::new()
            .name("action-dispatcher".to_string())
            .spawn(move || worker.run())?;

        info!(capacity, "dispatcher started");

        Ok((
            Self {
                tx,
                admitted,
                limit,
                dropped: Arc::new(AtomicU64::new(0)),
                events,
            },
            handle,
        ))
    }

    /// Hand a token to the worker without blocking
    pub fn submit(&self, token: ActionToken) -> Submission {
        let admitted = self
            .admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok();

        if !admitted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                action = %token.action,
                source = %token.source,
                "dispatcher busy, dropping action"
            );
            events::publish(
                &self.events,
                DeviceEvent::ActionDropped {
                    action: token.action.kind().to_string(),
                    source: token.source.to_string(),
                },
            );
            return Submission::Dropped;
        }

        debug!(action = %token.action, source = %token.source, "action submitted");
        match self.tx.try_send(token) {
            Ok(()) => Submission::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => {
                // admission is bounded by the channel size, so this is a bookkeeping slip
                self.admitted.fetch_sub(1, Ordering::SeqCst);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!("dispatcher queue full despite admission");
                Submission::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.admitted.fetch_sub(1, Ordering::SeqCst);
                Submission::Closed
            }
        }
    }

    /// Tokens discarded so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct Worker<S> {
    rx: mpsc::Receiver<ActionToken>,
    sink: S,
    admitted: Arc<AtomicUsize>,
}

impl<S: ActionSink> Worker<S> {
    fn run(mut self) {
        debug!("dispatcher worker running");
        while let Some(token) = self.rx.blocking_recv() {
            let _slot = AdmissionSlot(&self.admitted);
            let action = token.action.kind();
            let source = token.source;

            let sink = &mut self.sink;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink.handle(token))) {
                error!(
                    action,
                    %source,
                    panic = panic_message(payload.as_ref()),
                    "action handler panicked"
                );
            }
        }
        info!("dispatcher worker stopped");
    }
}

/// Gives an admitted token's slot back when handling ends, however it ends
struct AdmissionSlot<'a>(&'a AtomicUsize);

impl Drop for AdmissionSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
