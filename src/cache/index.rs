use std::collections::HashMap;
use std::sync::Arc;

use crate::block::BlockBacking;

use super::entry::Entry;

struct Node<V> {
    entry: Arc<Entry<V>>,
    /// Neighbor closer to the front (more recently used).
    prev: Option<usize>,
    /// Neighbor closer to the back (less recently used).
    next: Option<usize>,
}

/// Key map plus recency list over an arena of stable slots.
///
/// Entries live in `slots`; the map and the list links hold slot indices, so
/// a node can be unlinked while a walk holds indices to its neighbors. The
/// front of the list is the most recently used entry.
pub(crate) struct RecencyIndex<V> {
    map: HashMap<String, usize>,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    front: Option<usize>,
    back: Option<usize>,
    current_bytes: u64,
}

impl<V: BlockBacking> RecencyIndex<V> {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            front: None,
            back: None,
            current_bytes: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn current_bytes(&self) -> u64 {
        self.current_bytes
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Arc<Entry<V>>> {
        let &idx = self.map.get(key)?;
        self.entry_at(idx)
    }

    /// Insert a new entry at the front of the recency list.
    pub(crate) fn push_front(&mut self, entry: Arc<Entry<V>>) {
        let size = entry.value().size();
        let key = entry.key().to_string();
        let node = Node { entry, prev: None, next: None };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.link_front(idx);
        self.map.insert(key, idx);
        self.current_bytes += size;
    }

    /// Promote an existing entry to most recently used.
    pub(crate) fn move_to_front(&mut self, key: &str) {
        let Some(&idx) = self.map.get(key) else { return };
        if self.front == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    /// Unlink an entry from the map and the list, releasing its slot and
    /// subtracting its size from the byte accounting.
    pub(crate) fn remove(&mut self, key: &str) -> Option<Arc<Entry<V>>> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        let node = self.slots[idx].take()?;
        self.free.push(idx);
        self.current_bytes = self.current_bytes.saturating_sub(node.entry.value().size());
        Some(node.entry)
    }

    /// Slot index of the least recently used entry.
    pub(crate) fn back(&self) -> Option<usize> {
        self.back
    }

    /// Slot index of the neighbor one step closer to the front.
    pub(crate) fn toward_front(&self, idx: usize) -> Option<usize> {
        self.node(idx)?.prev
    }

    pub(crate) fn entry_at(&self, idx: usize) -> Option<&Arc<Entry<V>>> {
        self.node(idx).map(|node| &node.entry)
    }

    /// All resident entries, in no particular order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &Arc<Entry<V>>> + '_ {
        self.map.values().filter_map(move |&idx| self.entry_at(idx))
    }

    /// Keys front-to-back: most recently used first.
    pub(crate) fn keys_by_recency(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut cursor = self.front;
        while let Some(idx) = cursor {
            let Some(node) = self.node(idx) else { break };
            keys.push(node.entry.key().to_string());
            cursor = node.next;
        }
        keys
    }

    fn node(&self, idx: usize) -> Option<&Node<V>> {
        self.slots.get(idx).and_then(|slot| slot.as_ref())
    }

    fn link_front(&mut self, idx: usize) {
        match self.front {
            Some(old_front) => {
                if let Some(node) = self.slots[old_front].as_mut() {
                    node.prev = Some(idx);
                }
                if let Some(node) = self.slots[idx].as_mut() {
                    node.prev = None;
                    node.next = Some(old_front);
                }
            }
            None => {
                if let Some(node) = self.slots[idx].as_mut() {
                    node.prev = None;
                    node.next = None;
                }
                self.back = Some(idx);
            }
        }
        self.front = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let Some((prev, next)) = self.node(idx).map(|node| (node.prev, node.next)) else {
            return;
        };
        match prev {
            Some(prev_idx) => {
                if let Some(node) = self.slots[prev_idx].as_mut() {
                    node.next = next;
                }
            }
            None => self.front = next,
        }
        match next {
            Some(next_idx) => {
                if let Some(node) = self.slots[next_idx].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.back = prev,
        }
    }
}
