//! # Attach Dispatch Module
//!
//! Routes the transport's context-free attach callback to the active controller.
//!
//! The transport only accepts a plain `fn(UnitSlot)`, so the callback cannot
//! capture the controller it belongs to. Instead the active controller installs a
//! weak reference to its attach port in a single-slot, thread-local anchor during
//! `begin()` and clears it in `shutdown()`. [`dispatch_attach`] resolves the
//! anchor and forwards the event, or does nothing if no controller is active.
//!
//! The attach port queues the slot; the controller drains the queue right after
//! the poll that produced it, inside the same tick. This keeps the controller
//! from being re-entered while it is itself polling the transport.
//!
//! Only one controller is active at a time. Installing a second one replaces the
//! first; keeping that from happening is up to the application.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::transport::UnitSlot;

/// Receiver of attach notifications.
pub trait AttachSink {
    fn on_attach(&self, slot: UnitSlot);
}

thread_local! {
    static ANCHOR: RefCell<Option<Weak<dyn AttachSink>>> = RefCell::new(None);
}

/// Makes `target` the active attach receiver. Only a weak reference is kept.
pub fn install(target: &Rc<dyn AttachSink>) {
    ANCHOR.with(|anchor| {
        let mut anchor = anchor.borrow_mut();
        if anchor.as_ref().and_then(Weak::upgrade).is_some() {
            debug!("Replacing the active attach anchor");
        }
        *anchor = Some(Rc::downgrade(target));
    });
}

/// Clears the anchor. Later callbacks are ignored.
pub fn clear() {
    ANCHOR.with(|anchor| *anchor.borrow_mut() = None);
}

/// Whether a live controller is anchored.
#[must_use]
pub fn is_installed() -> bool {
    ANCHOR.with(|anchor| anchor.borrow().as_ref().and_then(Weak::upgrade).is_some())
}

/// The attach callback handed to the transport.
pub fn dispatch_attach(slot: UnitSlot) {
    let target = ANCHOR.with(|anchor| anchor.borrow().as_ref().and_then(Weak::upgrade));
    match target {
        Some(target) => target.on_attach(slot),
        None => trace!("Attach on {} unit with no active controller", slot),
    }
}

/// Attach port owned by a controller: queues slots until the controller drains
/// them.
#[derive(Debug, Default)]
pub struct AttachInbox {
    pending: RefCell<Vec<UnitSlot>>,
}

impl AttachInbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every queued slot, oldest first.
    pub fn drain(&self) -> Vec<UnitSlot> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    /// Drops queued slots without handling them.
    pub fn discard(&self) {
        self.pending.borrow_mut().clear();
    }
}

impl AttachSink for AttachInbox {
    fn on_attach(&self, slot: UnitSlot) {
        self.pending.borrow_mut().push(slot);
    }
}
