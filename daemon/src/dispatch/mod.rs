//! Serialized action dispatch
//!
//! Adapters submit tokens through a cloneable [`Dispatcher`]; a single worker
//! thread applies them to the [`ActionHandler`], which owns all mutable device
//! state and publishes a [`DeviceStatus`] snapshot after each one.

mod handler;
mod queue;
mod status;

pub use handler::{ActionHandler, HandlerError, Services};
pub use queue::{ActionSink, DispatchError, Dispatcher, Submission, MAX_CAPACITY};
pub use status::{channel as status_channel, DeviceStatus, StatusReceiver, StatusSender};

#[cfg(test)]
pub(crate) use queue::tests as fakes;
