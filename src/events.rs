//! Synchronous Event Hub
//!
//! A small publish/subscribe registry. The engine and the world each own one
//! and emit lifecycle notifications through it; callbacks run synchronously
//! on the caller's thread, in registration order.
//!
//! Payloads carry handles and plain values rather than references into the
//! engine, so a callback can never observe the world mid-mutation.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::fmt;

use crate::common::BodyId;
use crate::composite::Child;
use crate::pairs::Pair;

// ============================================================================
// Event Names and Payloads
// ============================================================================

/// The recognised lifecycle notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Start of an engine step, before anything has moved
    BeforeUpdate,
    /// After integration, before the first solver phase
    BeforeSolve,
    /// End of an engine step
    AfterUpdate,
    /// Pairs that began colliding this step
    CollisionStart,
    /// Pairs still colliding this step
    CollisionActive,
    /// Pairs that stopped colliding this step
    CollisionEnd,
    /// A body fell asleep
    SleepStart,
    /// A body woke up
    SleepEnd,
    /// A child is about to be added to a composite
    BeforeAdd,
    /// A child has been added to a composite
    AfterAdd,
    /// A child is about to be removed from a composite
    BeforeRemove,
    /// A child has been removed from a composite
    AfterRemove,
}

impl EventName {
    /// Stable string form of the event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeUpdate => "beforeUpdate",
            Self::BeforeSolve => "beforeSolve",
            Self::AfterUpdate => "afterUpdate",
            Self::CollisionStart => "collisionStart",
            Self::CollisionActive => "collisionActive",
            Self::CollisionEnd => "collisionEnd",
            Self::SleepStart => "sleepStart",
            Self::SleepEnd => "sleepEnd",
            Self::BeforeAdd => "beforeAdd",
            Self::AfterAdd => "afterAdd",
            Self::BeforeRemove => "beforeRemove",
            Self::AfterRemove => "afterRemove",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data delivered with an emission.
#[derive(Clone, Copy, Debug)]
pub enum EventPayload<'a> {
    /// Timing of the surrounding step
    Step {
        /// Simulation timestamp at emission
        timestamp: f64,
        /// Delta of the current step
        delta: f64,
    },
    /// The pairs a collision notification refers to
    Collisions {
        /// Simulation timestamp at emission
        timestamp: f64,
        /// Pair snapshots for this notification
        pairs: &'a [Pair],
    },
    /// The body a sleep notification refers to
    Sleep {
        /// Body that changed sleep state
        body: BodyId,
    },
    /// The child a composite notification refers to
    Tree {
        /// Child being added or removed
        child: Child,
    },
}

// ============================================================================
// Events
// ============================================================================

/// Handle returned by [`Events::on`], used to unsubscribe.
pub type SubscriptionId = u64;

type Callback = Box<dyn FnMut(EventName, &EventPayload<'_>)>;

struct Subscriber {
    name: EventName,
    id: SubscriptionId,
    callback: Callback,
}

/// Subscriber registry with synchronous, registration-ordered delivery.
#[derive(Default)]
pub struct Events {
    subscribers: Vec<Subscriber>,
    next_id: SubscriptionId,
}

impl Events {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Subscribe to `name`. Returns an id accepted by [`Self::off`].
    pub fn on(
        &mut self,
        name: EventName,
        callback: impl FnMut(EventName, &EventPayload<'_>) + 'static,
    ) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            name,
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Unsubscribe. Unknown or already-removed ids are a no-op returning
    /// `false`.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Drop every subscriber.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Whether anyone is listening for `name`.
    #[must_use]
    pub fn has_subscribers(&self, name: EventName) -> bool {
        self.subscribers.iter().any(|s| s.name == name)
    }

    /// Deliver `payload` to every subscriber of `name`, in registration
    /// order.
    pub fn emit(&mut self, name: EventName, payload: &EventPayload<'_>) {
        for subscriber in &mut self.subscribers {
            if subscriber.name == name {
                (subscriber.callback)(name, payload);
            }
        }
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_delivery_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut events = Events::new();

        let a = Rc::clone(&order);
        events.on(EventName::BeforeUpdate, move |_, _| a.borrow_mut().push(1));
        let b = Rc::clone(&order);
        events.on(EventName::BeforeUpdate, move |_, _| b.borrow_mut().push(2));
        let c = Rc::clone(&order);
        events.on(EventName::AfterUpdate, move |_, _| c.borrow_mut().push(3));

        events.emit(
            EventName::BeforeUpdate,
            &EventPayload::Step {
                timestamp: 0.0,
                delta: 16.0,
            },
        );
        assert_eq!(*order.borrow(), vec![1, 2], "only matching subscribers run");
    }

    #[test]
    fn test_off_removes_subscriber() {
        let hits = Rc::new(RefCell::new(0));
        let mut events = Events::new();
        let h = Rc::clone(&hits);
        let id = events.on(EventName::SleepStart, move |_, _| *h.borrow_mut() += 1);

        let payload = EventPayload::Sleep { body: BodyId(0) };
        events.emit(EventName::SleepStart, &payload);
        assert!(events.off(id));
        assert!(!events.off(id), "second removal is a no-op");
        events.emit(EventName::SleepStart, &payload);

        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_payload_reaches_callback() {
        let seen = Rc::new(RefCell::new(None));
        let mut events = Events::new();
        let s = Rc::clone(&seen);
        events.on(EventName::SleepEnd, move |name, payload| {
            if let EventPayload::Sleep { body } = payload {
                *s.borrow_mut() = Some((name, *body));
            }
        });

        events.emit(EventName::SleepEnd, &EventPayload::Sleep { body: BodyId(7) });
        assert_eq!(*seen.borrow(), Some((EventName::SleepEnd, BodyId(7))));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventName::CollisionStart.as_str(), "collisionStart");
        assert_eq!(EventName::BeforeAdd.as_str(), "beforeAdd");
    }
}
