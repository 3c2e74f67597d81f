//! Binding registry: tracks which listeners are attached to which sources.
//!
//! Every `listen` call stores a `Binding` in a generational arena and hands
//! back a `BindingId`. Bindings are grouped by event type in insertion order.
//! Detaching a binding drops its source and listener, so a second detach
//! through the same binding (or through a stale id) does nothing.

use std::collections::HashMap;

/// Handle to a binding created by [`BindingRegistry::listen`].
///
/// Ids are invalidated when their binding is removed; a slot reused by a
/// later `listen` gets a new generation, so stale ids never alias it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId {
    index: usize,
    generation: u32,
}

/// One active subscription: {source, event type, listener}.
#[derive(Debug)]
pub struct Binding<S, L> {
    event_type: &'static str,
    source: Option<S>,
    listener: Option<L>,
}

impl<S, L> Binding<S, L> {
    pub fn new(source: S, event_type: &'static str, listener: L) -> Self {
        Binding {
            event_type,
            source: Some(source),
            listener: Some(listener),
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    pub fn listener(&self) -> Option<&L> {
        self.listener.as_ref()
    }

    /// Drop the source and listener references.
    ///
    /// Returns `true` only for the call that actually detached.
    pub fn detach(&mut self) -> bool {
        let was_attached = self.source.take().is_some();
        self.listener = None;
        was_attached
    }
}

struct Slot<S, L> {
    generation: u32,
    binding: Option<Binding<S, L>>,
}

/// Registry of bindings keyed by event type.
///
/// All operations are total: unknown sources, event types, or ids are
/// no-ops. After [`destroy`](Self::destroy) every method is a no-op.
pub struct BindingRegistry<S, L> {
    slots: Vec<Slot<S, L>>,
    free: Vec<usize>,
    by_event: HashMap<&'static str, Vec<BindingId>>,
    destroyed: bool,
}

impl<S: PartialEq, L> BindingRegistry<S, L> {
    pub fn new() -> Self {
        BindingRegistry {
            slots: Vec::new(),
            free: Vec::new(),
            by_event: HashMap::new(),
            destroyed: false,
        }
    }

    /// Attach `listener` to `source` for `event_type`.
    ///
    /// Returns `None` once the registry has been destroyed.
    pub fn listen(&mut self, source: S, event_type: &'static str, listener: L) -> Option<BindingId> {
        if self.destroyed {
            return None;
        }
        let binding = Binding::new(source, event_type, listener);
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.binding = Some(binding);
                BindingId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    binding: Some(binding),
                });
                BindingId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.by_event.entry(event_type).or_default().push(id);
        Some(id)
    }

    /// Detach every binding matching both `source` and `event_type`.
    pub fn unlisten(&mut self, source: &S, event_type: &str) {
        let matching = match self.by_event.get_mut(event_type) {
            Some(ids) => {
                let slots = &self.slots;
                let mut matching = Vec::new();
                ids.retain(|id| {
                    let hit = slot_binding(slots, *id)
                        .and_then(Binding::source)
                        .is_some_and(|s| s == source);
                    if hit {
                        matching.push(*id);
                    }
                    !hit
                });
                matching
            }
            None => return,
        };
        if self.by_event.get(event_type).is_some_and(Vec::is_empty) {
            self.by_event.remove(event_type);
        }
        for id in matching {
            self.release(id);
        }
    }

    /// Detach a single binding by handle. Returns `false` for stale ids.
    pub fn unlisten_binding(&mut self, id: BindingId) -> bool {
        let Some(event_type) = slot_binding(&self.slots, id).map(Binding::event_type) else {
            return false;
        };
        if let Some(ids) = self.by_event.get_mut(event_type) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_event.remove(event_type);
            }
        }
        self.release(id)
    }

    /// Detach every binding regardless of source or event type.
    pub fn remove_all(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(mut binding) = slot.binding.take() {
                binding.detach();
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.by_event.clear();
    }

    /// `remove_all`, then release internal storage. The registry stays
    /// usable as a value but ignores every later call.
    pub fn destroy(&mut self) {
        self.remove_all();
        self.slots = Vec::new();
        self.free = Vec::new();
        self.by_event = HashMap::new();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Number of attached bindings.
    pub fn len(&self) -> usize {
        self.by_event.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of attached bindings for one event type.
    pub fn count(&self, event_type: &str) -> usize {
        self.by_event.get(event_type).map_or(0, Vec::len)
    }

    fn release(&mut self, id: BindingId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index) else {
            return false;
        };
        if slot.generation != id.generation {
            return false;
        }
        let Some(mut binding) = slot.binding.take() else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        binding.detach()
    }
}

impl<S: PartialEq, L: Clone> BindingRegistry<S, L> {
    /// Snapshot of the listeners bound to (`source`, `event_type`), in
    /// insertion order. Callers may mutate the registry while walking it.
    pub fn listeners(&self, source: &S, event_type: &str) -> Vec<L> {
        let Some(ids) = self.by_event.get(event_type) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| slot_binding(&self.slots, *id))
            .filter(|b| b.source().is_some_and(|s| s == source))
            .filter_map(|b| b.listener().cloned())
            .collect()
    }
}

impl<S: PartialEq, L> Default for BindingRegistry<S, L> {
    fn default() -> Self {
        Self::new()
    }
}

fn slot_binding<S, L>(slots: &[Slot<S, L>], id: BindingId) -> Option<&Binding<S, L>> {
    slots
        .get(id.index)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.binding.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Listener that counts how many times it has been dropped.
    struct DropProbe(Rc<Cell<u32>>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn listen_preserves_insertion_order() {
        let mut reg: BindingRegistry<u32, &str> = BindingRegistry::new();
        reg.listen(1, "timeupdate", "a");
        reg.listen(1, "timeupdate", "b");
        reg.listen(2, "timeupdate", "x");
        reg.listen(1, "timeupdate", "c");
        assert_eq!(reg.listeners(&1, "timeupdate"), vec!["a", "b", "c"]);
        assert_eq!(reg.listeners(&2, "timeupdate"), vec!["x"]);
        assert!(reg.listeners(&1, "ended").is_empty());
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn unlisten_matches_source_and_type_only() {
        let mut reg: BindingRegistry<u32, &str> = BindingRegistry::new();
        reg.listen(1, "ended", "a");
        reg.listen(1, "seeked", "b");
        reg.listen(2, "ended", "c");
        reg.unlisten(&1, "ended");
        assert!(reg.listeners(&1, "ended").is_empty());
        assert_eq!(reg.listeners(&1, "seeked"), vec!["b"]);
        assert_eq!(reg.listeners(&2, "ended"), vec!["c"]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn unlisten_unknown_is_noop() {
        let mut reg: BindingRegistry<u32, &str> = BindingRegistry::new();
        reg.listen(1, "ended", "a");
        reg.unlisten(&9, "ended");
        reg.unlisten(&1, "nothing");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicates_are_independently_removable() {
        let mut reg: BindingRegistry<u32, &str> = BindingRegistry::new();
        let first = reg.listen(1, "ended", "a").unwrap();
        let second = reg.listen(1, "ended", "a").unwrap();
        assert_ne!(first, second);
        assert!(reg.unlisten_binding(first));
        assert_eq!(reg.listeners(&1, "ended"), vec!["a"]);
        assert!(!reg.unlisten_binding(first));
        assert!(reg.unlisten_binding(second));
        assert!(reg.is_empty());
    }

    #[test]
    fn stale_id_does_not_touch_reused_slot() {
        let mut reg: BindingRegistry<u32, &str> = BindingRegistry::new();
        let old = reg.listen(1, "ended", "old").unwrap();
        reg.unlisten(&1, "ended");
        let new = reg.listen(1, "ended", "new").unwrap();
        assert_ne!(old, new);
        assert!(!reg.unlisten_binding(old));
        assert_eq!(reg.listeners(&1, "ended"), vec!["new"]);
    }

    #[test]
    fn binding_detach_is_idempotent() {
        let mut binding = Binding::new(7u32, "ended", "listener");
        assert!(binding.is_attached());
        assert!(binding.detach());
        assert!(!binding.is_attached());
        assert!(binding.source().is_none());
        assert!(binding.listener().is_none());
        assert!(!binding.detach());
    }

    #[test]
    fn remove_all_detaches_each_listener_exactly_once() {
        let drops = Rc::new(Cell::new(0));
        let mut reg: BindingRegistry<u32, DropProbe> = BindingRegistry::new();
        let events = ["ended", "seeked", "timeupdate"];
        let mut attached = 0;
        for round in 0..4u32 {
            for (i, event) in events.into_iter().enumerate() {
                reg.listen(round % 2, event, DropProbe(drops.clone()));
                attached += 1;
                if i == 1 {
                    reg.unlisten(&(round % 2), "seeked");
                }
            }
        }
        reg.unlisten(&0, "ended");
        reg.remove_all();
        assert!(reg.is_empty());
        assert_eq!(drops.get(), attached);

        reg.remove_all();
        assert_eq!(drops.get(), attached);
    }

    #[test]
    fn remove_all_releases_listener_references() {
        let listener = Rc::new(());
        let mut reg: BindingRegistry<u32, Rc<()>> = BindingRegistry::new();
        reg.listen(1, "ended", listener.clone());
        reg.listen(1, "ended", listener.clone());
        reg.listen(2, "seeked", listener.clone());
        assert_eq!(Rc::strong_count(&listener), 4);
        reg.remove_all();
        assert_eq!(Rc::strong_count(&listener), 1);
    }

    const EVENTS: [&str; 3] = ["ended", "seeked", "timeupdate"];

    #[derive(Debug, Clone)]
    enum Op {
        Listen(u32, usize),
        Unlisten(u32, usize),
        /// Detach the n-th id handed out so far, modulo the count.
        UnlistenBinding(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3u32, 0..EVENTS.len()).prop_map(|(s, e)| Op::Listen(s, e)),
            (0..3u32, 0..EVENTS.len()).prop_map(|(s, e)| Op::Unlisten(s, e)),
            any::<usize>().prop_map(Op::UnlistenBinding),
        ]
    }

    proptest! {
        #[test]
        fn remove_all_leaves_nothing_attached(ops in prop::collection::vec(op(), 0..64)) {
            let drops = Rc::new(Cell::new(0u32));
            let mut reg: BindingRegistry<u32, DropProbe> = BindingRegistry::new();
            let mut ids = Vec::new();
            let mut listens = 0u32;
            for op in ops {
                match op {
                    Op::Listen(source, e) => {
                        ids.extend(reg.listen(source, EVENTS[e], DropProbe(drops.clone())));
                        listens += 1;
                    }
                    Op::Unlisten(source, e) => reg.unlisten(&source, EVENTS[e]),
                    Op::UnlistenBinding(n) => {
                        if !ids.is_empty() {
                            reg.unlisten_binding(ids[n % ids.len()]);
                        }
                    }
                }
                // Every detach drops its listener exactly once.
                prop_assert_eq!(reg.len() as u32, listens - drops.get());
            }

            reg.remove_all();
            prop_assert!(reg.is_empty());
            prop_assert_eq!(drops.get(), listens);
            for event in EVENTS {
                prop_assert_eq!(reg.count(event), 0);
            }

            reg.remove_all();
            prop_assert_eq!(drops.get(), listens);
        }
    }

    #[test]
    fn destroy_makes_later_calls_noops() {
        let mut reg: BindingRegistry<u32, &str> = BindingRegistry::new();
        let id = reg.listen(1, "ended", "a").unwrap();
        reg.destroy();
        assert!(reg.is_destroyed());
        assert!(reg.is_empty());
        assert!(reg.listen(1, "ended", "b").is_none());
        assert!(!reg.unlisten_binding(id));
        reg.unlisten(&1, "ended");
        reg.remove_all();
        reg.destroy();
        assert!(reg.listeners(&1, "ended").is_empty());
    }

    #[test]
    fn count_tracks_per_event_type() {
        let mut reg: BindingRegistry<u32, &str> = BindingRegistry::new();
        reg.listen(1, "ended", "a");
        reg.listen(2, "ended", "b");
        reg.listen(1, "seeked", "c");
        assert_eq!(reg.count("ended"), 2);
        assert_eq!(reg.count("seeked"), 1);
        assert_eq!(reg.count("timeupdate"), 0);
    }
}
