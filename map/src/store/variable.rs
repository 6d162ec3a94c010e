use super::{EntryRef, EntryStore};

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::time::Instant;

/// Position in the ordered index. The sequence number breaks ties between
/// equal instants in insertion order.
type OrderKey = (Instant, u64);

struct Slot<K, V> {
  entry: EntryRef<K, V>,
  order: OrderKey,
}

/// Store for maps where entries carry their own duration or policy.
///
/// Key lookup goes through a hash map; expiration order is kept in a
/// `BTreeMap` keyed by `(expected instant, sequence)`. Lookups are O(1),
/// `first` and `reorder` are O(log n).
pub(crate) struct VariableStore<K, V, H> {
  lookup: HashMap<K, Slot<K, V>, H>,
  order: BTreeMap<OrderKey, EntryRef<K, V>>,
  next_seq: u64,
}

impl<K, V, H> VariableStore<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub(crate) fn with_hasher(hasher: H) -> Self {
    Self {
      lookup: HashMap::with_hasher(hasher),
      order: BTreeMap::new(),
      next_seq: 0,
    }
  }

  fn next_order(&mut self, expected_at: Instant) -> OrderKey {
    let seq = self.next_seq;
    self.next_seq = self.next_seq.wrapping_add(1);
    (expected_at, seq)
  }
}

impl<K, V, H> EntryStore<K, V> for VariableStore<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
  H: BuildHasher + Send + Sync,
{
  fn get(&self, key: &K) -> Option<&EntryRef<K, V>> {
    self.lookup.get(key).map(|slot| &slot.entry)
  }

  fn insert(&mut self, entry: EntryRef<K, V>) -> Option<EntryRef<K, V>> {
    let order = self.next_order(entry.expected_at());
    self.order.insert(order, entry.clone());
    let old = self.lookup.insert(entry.key().clone(), Slot { entry, order });

    old.map(|slot| {
      self.order.remove(&slot.order);
      slot.entry
    })
  }

  fn remove(&mut self, key: &K) -> Option<EntryRef<K, V>> {
    let slot = self.lookup.remove(key)?;
    self.order.remove(&slot.order);
    Some(slot.entry)
  }

  fn first(&self) -> Option<&EntryRef<K, V>> {
    self.order.values().next()
  }

  fn reorder(&mut self, key: &K) {
    let Some(expected_at) = self.lookup.get(key).map(|slot| slot.entry.expected_at()) else {
      return;
    };
    let order = self.next_order(expected_at);
    if let Some(slot) = self.lookup.get_mut(key) {
      if let Some(entry) = self.order.remove(&slot.order) {
        self.order.insert(order, entry);
      }
      slot.order = order;
    }
  }

  fn iter(&self) -> Box<dyn Iterator<Item = &EntryRef<K, V>> + '_> {
    Box::new(self.order.values())
  }

  fn len(&self) -> usize {
    self.lookup.len()
  }

  fn clear(&mut self) {
    self.lookup.clear();
    self.order.clear();
  }
}
