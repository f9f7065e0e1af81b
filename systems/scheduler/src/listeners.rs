use horde_core::Event;

/// Receives scheduler notifications.
pub trait WaveListener {
    /// Handles a single notification.
    fn notify(&mut self, event: &Event);
}

impl<F> WaveListener for F
where
    F: FnMut(&Event),
{
    fn notify(&mut self, event: &Event) {
        self(event);
    }
}

/// Identifier returned on registration, used to unregister a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl ListenerId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Ordered set of listeners invoked synchronously.
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(ListenerId, Box<dyn WaveListener>)>,
    next_id: u32,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("registered", &self.entries.len())
            .finish()
    }
}

impl Listeners {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener; it is invoked after every listener registered before it.
    pub fn register<L>(&mut self, listener: L) -> ListenerId
    where
        L: WaveListener + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener, returning whether it was registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delivers `events` in order, each to every listener in registration order.
    pub fn dispatch(&mut self, events: &[Event]) {
        for event in events {
            for (_, listener) in &mut self.entries {
                listener.notify(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use horde_core::WaveIndex;

    use super::*;

    #[test]
    fn dispatch_follows_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        for name in ["first", "second"] {
            let log = Rc::clone(&log);
            let _ = listeners.register(move |event: &Event| {
                if let Event::WaveStarted { wave } = event {
                    log.borrow_mut().push((name, wave.get()));
                }
            });
        }
        assert_eq!(listeners.len(), 2);

        listeners.dispatch(&[
            Event::WaveStarted { wave: WaveIndex::new(1) },
            Event::WaveStarted { wave: WaveIndex::new(2) },
        ]);

        assert_eq!(
            *log.borrow(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn unregistered_listeners_stop_receiving() {
        let count = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::new();
        let counter = Rc::clone(&count);
        let id = listeners.register(move |_: &Event| *counter.borrow_mut() += 1);

        listeners.dispatch(&[Event::WaveEnded { wave: WaveIndex::FIRST }]);
        assert!(listeners.unregister(id));
        assert!(!listeners.unregister(id));
        listeners.dispatch(&[Event::WaveEnded { wave: WaveIndex::FIRST }]);

        assert_eq!(*count.borrow(), 1);
        assert!(listeners.is_empty());
    }
}
