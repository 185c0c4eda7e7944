//! Dispatch Bridge - marshals work from any thread onto the render thread
//!
//! Workers hold a cloneable [`Dispatcher`]; the render loop owns the matching
//! [`DispatchQueue`] and drains it once per tick, before drawing.
//!
//! ```text
//!   worker ──enqueue──► mpsc ──drain──► fn(&mut Session) ──► redraw
//! ```
//!
//! Tasks sent from one thread run in send order. Scoped tasks carry a
//! [`CancellationToken`]; if the token is cancelled before the task is
//! drained, the task is dropped without running.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::session::Session;
use crate::error::CsqlError;

/// Upper bound of tasks run per tick so input stays responsive under floods
pub const MAX_TASKS_PER_TICK: usize = 1024;

/// A unit of UI work, run on the render thread
pub type Task = Box<dyn FnOnce(&mut Session) + Send>;

/// Callback fired by an alert button
pub type Callback = Box<dyn FnOnce(&mut Session) + Send>;

/// Address of a message, alert or modal overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

impl OverlayId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OverlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

struct Envelope {
    token: Option<CancellationToken>,
    task: Task,
}

/// Sending half of the bridge. Cheap to clone, safe to use from any thread.
#[derive(Clone)]
pub struct Dispatcher {
    tx: UnboundedSender<Envelope>,
    redraw: Arc<AtomicBool>,
    next_overlay_id: Arc<AtomicU64>,
}

/// Receiving half of the bridge, owned by the render loop
pub struct DispatchQueue {
    rx: UnboundedReceiver<Envelope>,
    redraw: Arc<AtomicBool>,
}

/// Create a connected dispatcher / queue pair
pub fn channel() -> (Dispatcher, DispatchQueue) {
    let (tx, rx) = unbounded_channel();
    let redraw = Arc::new(AtomicBool::new(true));
    (
        Dispatcher {
            tx,
            redraw: Arc::clone(&redraw),
            next_overlay_id: Arc::new(AtomicU64::new(1)),
        },
        DispatchQueue { rx, redraw },
    )
}

impl Dispatcher {
    /// Schedule `f` to run on the render thread before the next redraw.
    pub fn enqueue<F>(&self, f: F)
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        self.send(Envelope {
            token: None,
            task: Box::new(f),
        });
    }

    /// Like [`enqueue`](Self::enqueue), but `f` is dropped unrun if `token`
    /// is cancelled first.
    pub fn enqueue_scoped<F>(&self, token: CancellationToken, f: F)
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        self.send(Envelope {
            token: Some(token),
            task: Box::new(f),
        });
    }

    fn send(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            debug!("dispatch queue closed, dropping task");
            return;
        }
        self.request_redraw();
    }

    pub fn request_redraw(&self) {
        self.redraw.store(true, Ordering::Release);
    }

    /// Allocate a fresh overlay id. Ids are never reused.
    pub fn next_overlay_id(&self) -> OverlayId {
        OverlayId(self.next_overlay_id.fetch_add(1, Ordering::Relaxed))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Overlay helpers usable off the render thread
    // ─────────────────────────────────────────────────────────────────────

    /// Queue a message overlay. The id is valid immediately.
    pub fn show_message_async(&self, text: impl Into<String>, wait: bool) -> OverlayId {
        let id = self.next_overlay_id();
        let text = text.into();
        self.enqueue(move |session| session.insert_message(id, text, wait));
        id
    }

    pub fn close_message_async(&self, id: OverlayId) {
        self.enqueue(move |session| session.close_message(id));
    }

    /// Queue an alert overlay. The id is valid immediately.
    pub fn show_alert_async<C, X>(&self, text: impl Into<String>, on_confirm: C, on_cancel: X) -> OverlayId
    where
        C: FnOnce(&mut Session) + Send + 'static,
        X: FnOnce(&mut Session) + Send + 'static,
    {
        let id = self.next_overlay_id();
        let text = text.into();
        self.enqueue(move |session| {
            session.insert_alert(id, text, Box::new(on_confirm), Box::new(on_cancel))
        });
        id
    }

    /// Queue a blocking error message
    pub fn show_error_async(&self, err: &CsqlError) {
        self.show_message_async(err.to_string(), true);
    }
}

impl DispatchQueue {
    /// Run pending tasks against `session`, returning how many ran.
    ///
    /// A panicking task is logged and reported in a message overlay; the
    /// remaining tasks still run.
    pub fn drain(&mut self, session: &mut Session) -> usize {
        let mut ran = 0;
        for _ in 0..MAX_TASKS_PER_TICK {
            let Ok(envelope) = self.rx.try_recv() else {
                break;
            };
            if envelope.token.as_ref().is_some_and(|t| t.is_cancelled()) {
                debug!("dropping task of a cancelled scope");
                continue;
            }
            let task = envelope.task;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task(session))) {
                let reason = panic_message(payload.as_ref());
                error!(%reason, "dispatched task panicked");
                session.show_message(format!("Internal error: {}", reason), true);
            }
            ran += 1;
        }
        ran
    }

    /// Returns whether a redraw was requested since the last call
    pub fn take_redraw(&self) -> bool {
        self.redraw.swap(false, Ordering::AcqRel)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
