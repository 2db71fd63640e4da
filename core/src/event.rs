//! Synchronous publish/subscribe channels.
//!
//! One [`EventChannel`] exists per named occurrence (a cell opened, a flag switched, a mine hit).
//! Delivery is a direct fan-out on the caller's stack: every listener runs, in subscription order,
//! before [`EventChannel::notify`] returns. A listener that panics is logged and skipped; the
//! remaining listeners still run and the publisher never observes the failure.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

/// Token returned by [`EventChannel::subscribe`], the only way to detach that registration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener<S, P> = Rc<dyn Fn(&S, &P)>;

pub struct EventChannel<S, P> {
    listeners: RefCell<Vec<(ListenerId, Listener<S, P>)>>,
    next_id: Cell<u64>,
}

impl<S, P> EventChannel<S, P> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&S, &P) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let listener: Listener<S, P> = Rc::new(listener);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Detaches a registration, returning whether it was still attached.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|(registered, _)| *registered == id) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invokes every listener registered when delivery starts, in subscription order.
    ///
    /// Listeners may subscribe or unsubscribe while being notified. A listener added during
    /// delivery first runs on the next notification; one removed during delivery is skipped if it
    /// has not run yet.
    pub fn notify(&self, sender: &S, payload: &P) {
        let snapshot: Vec<(ListenerId, Listener<S, P>)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();

        for (position, (id, listener)) in snapshot.iter().enumerate() {
            if !self.is_subscribed(*id) {
                continue;
            }
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(sender, payload))) {
                let message = panic
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("non-string panic payload");
                log::error!("Error in event listener #{position}: {message}");
            }
        }
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.listeners
            .borrow()
            .iter()
            .any(|(registered, _)| *registered == id)
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }
}

impl<S, P> Default for EventChannel<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, P> fmt::Debug for EventChannel<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
