//! Cache-update listeners.
//!
//! Listeners are added and removed by [`ListenerId`]. A broadcast iterates a
//! snapshot of the list taken before the first call, so a listener that
//! removes itself (or another listener) mid-broadcast doesn't change who
//! receives the record currently being delivered.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use timescrub_types::Record;

/// Callback invoked for every record a provider inserts.
pub type Listener = Rc<dyn Fn(&Arc<Record>)>;

/// Identity handle returned by [`ObserverRegistry::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener list with add/remove by identity.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Deliver each record to every listener registered when the call began.
    pub fn broadcast(&self, records: &[Arc<Record>]) {
        if records.is_empty() {
            return;
        }
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for record in records {
            for listener in &snapshot {
                listener(record);
            }
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}
