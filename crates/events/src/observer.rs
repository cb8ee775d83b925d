use std::sync::{Arc, RwLock};

use ceu_types::CrxUpdateItem;

/// Receives every state-change snapshot for every component in every batch,
/// in the order `UpdateEngine` produces them.
///
/// Implementers must avoid re-entering the client from inside `on_event`; if
/// they do, the re-entrant call is simply serialized behind whatever the
/// client is already doing (the client has no re-entrancy detection of its
/// own — this is a documented caller obligation, matching the source).
pub trait Observer: Send + Sync {
    fn on_event(&self, item: &CrxUpdateItem);
}

/// Blanket impl so a bare closure (wrapped in `Arc`) can be registered
/// directly, which is convenient in tests.
impl<F> Observer for F
where
    F: Fn(&CrxUpdateItem) + Send + Sync,
{
    fn on_event(&self, item: &CrxUpdateItem) {
        self(item);
    }
}

/// The set of observers registered via `add_observer`/`remove_observer`.
///
/// Observers are identified by `Arc` pointer identity so the same closure
/// registered twice is tracked as two distinct entries, matching how
/// pointer-identity-based add/remove works for trait objects in the source.
#[derive(Default)]
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl ObserverSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<dyn Observer>) {
        self.observers.write().expect("observer lock poisoned").push(observer);
    }

    pub fn remove(&self, observer: &Arc<dyn Observer>) {
        let mut observers = self.observers.write().expect("observer lock poisoned");
        if let Some(pos) = observers
            .iter()
            .position(|o| Arc::ptr_eq(o, observer))
        {
            observers.remove(pos);
        }
    }

    /// Dispatch `item` to every registered observer, on the caller's task.
    pub fn notify(&self, item: &CrxUpdateItem) {
        let observers = self.observers.read().expect("observer lock poisoned");
        for observer in observers.iter() {
            observer.on_event(item);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().expect("observer lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notify_reaches_every_registered_observer() {
        let set = ObserverSet::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_a = count.clone();
        let count_b = count.clone();
        set.add(Arc::new(move |_: &CrxUpdateItem| {
            count_a.fetch_add(1, Ordering::SeqCst);
        }));
        set.add(Arc::new(move |_: &CrxUpdateItem| {
            count_b.fetch_add(1, Ordering::SeqCst);
        }));

        set.notify(&CrxUpdateItem::new("app1"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_drops_the_matching_observer_only() {
        let set = ObserverSet::new();
        let a: Arc<dyn Observer> = Arc::new(|_: &CrxUpdateItem| {});
        let b: Arc<dyn Observer> = Arc::new(|_: &CrxUpdateItem| {});
        set.add(a.clone());
        set.add(b.clone());
        assert_eq!(set.len(), 2);

        set.remove(&a);
        assert_eq!(set.len(), 1);
    }
}
