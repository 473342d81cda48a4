//! Deferred delivery of change notifications.
//!
//! A touch never runs handlers on the caller's stack.  Each touch becomes one
//! [`Notification`] pushed onto a process-wide queue.  A single dispatcher
//! thread, started on first use, drains the queue, so notifications are
//! delivered in the order they were scheduled whether or not a Tokio runtime
//! is current.  Inside a notification the handlers run one after another in
//! registration order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use tokio::sync::mpsc::{self, UnboundedSender};

use crate::value::{Function, Value};

static QUEUE: OnceLock<Option<UnboundedSender<Notification>>> = OnceLock::new();

/// A scheduled batch of handler invocations for one touched key.
#[derive(Debug)]
pub struct Notification {
    pub id: String,
    pub value: Value,
    pub handlers: Vec<Function>,
}

impl Notification {
    /// Invoke every handler with `(id, value)` and no receiver.
    ///
    /// A panicking handler is logged and does not stop the ones after it.
    pub fn deliver(self) {
        let args = [Value::Str(self.id), self.value];
        for handler in &self.handlers {
            let called = catch_unwind(AssertUnwindSafe(|| handler.call(&Value::Unset, &args)));
            if called.is_err() {
                tracing::warn!(id = %args[0], "notification handler panicked");
            }
        }
    }
}

fn start_dispatcher() -> Option<UnboundedSender<Notification>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
    let spawned = std::thread::Builder::new()
        .name("varstore-notify".into())
        .spawn(move || {
            while let Some(notification) = rx.blocking_recv() {
                notification.deliver();
            }
        });
    match spawned {
        Ok(_) => Some(tx),
        Err(e) => {
            tracing::warn!("failed to start notification dispatcher: {e}");
            None
        }
    }
}

/// Queue `notification` for delivery off the current call stack.
///
/// If the dispatcher thread cannot be started the notification is delivered
/// inline rather than dropped.
pub fn schedule(notification: Notification) {
    tracing::debug!(
        id = %notification.id,
        handlers = notification.handlers.len(),
        "scheduling notification"
    );
    let notification = match QUEUE.get_or_init(start_dispatcher) {
        Some(tx) => match tx.send(notification) {
            Ok(()) => return,
            Err(mpsc::error::SendError(returned)) => returned,
        },
        None => notification,
    };
    tracing::warn!(id = %notification.id, "dispatcher unavailable, delivering inline");
    notification.deliver();
}
