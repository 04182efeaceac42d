// Typed publish/subscribe registry shared by the UI and the transport.
//
// Handlers are keyed by the `TypeId` of the event they accept and kept in
// subscription order. `emit` runs every handler for that event type
// synchronously on the caller's stack. Subscriptions are fixed for the life
// of the bus: there is no unsubscribe, and a handler whose owner has gone
// away is expected to turn itself into a no-op (see `Transport::new`, which
// captures a `Weak`).
//
// Re-entrancy: the handler list is cloned before dispatch, so a handler may
// emit further events or subscribe new handlers. Handlers added during a
// dispatch first run on the next `emit`.
//
// Single-threaded by construction (`Rc` handlers, `RefCell` registry); the
// bus lives on the game loop's thread next to the transport.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

type Handler = Rc<dyn Fn(&dyn Any)>;

#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<BTreeMap<TypeId, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events of type `E`.
    pub fn on<E: 'static>(&self, handler: impl Fn(&E) + 'static) {
        let erased: Handler = Rc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers
            .borrow_mut()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(erased);
    }

    /// Deliver `event` to every subscriber of `E`, in subscription order.
    pub fn emit<E: 'static>(&self, event: &E) {
        let handlers = self
            .handlers
            .borrow()
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.handlers
            .borrow()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.borrow();
        f.debug_struct("EventBus")
            .field("event_types", &handlers.len())
            .field("handlers", &handlers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
