//! Backing stores: the full key → entry association, kept in expiration order.

mod uniform;
mod variable;

pub(crate) use uniform::UniformStore;
pub(crate) use variable::VariableStore;

use crate::entry::ExpiringEntry;

use std::sync::Arc;

pub(crate) type EntryRef<K, V> = Arc<ExpiringEntry<K, V>>;

/// A key → entry map that can also report the entry expiring soonest.
///
/// All mutation happens under the owning map's write lock.
pub(crate) trait EntryStore<K, V>: Send + Sync {
  fn get(&self, key: &K) -> Option<&EntryRef<K, V>>;

  /// Inserts `entry` at the position given by its expected instant,
  /// replacing and returning any entry with the same key.
  fn insert(&mut self, entry: EntryRef<K, V>) -> Option<EntryRef<K, V>>;

  fn remove(&mut self, key: &K) -> Option<EntryRef<K, V>>;

  /// The entry with the earliest expected instant.
  fn first(&self) -> Option<&EntryRef<K, V>>;

  /// Re-seats an existing entry after its expected instant changed.
  fn reorder(&mut self, key: &K);

  /// All entries, soonest-expiring first.
  fn iter(&self) -> Box<dyn Iterator<Item = &EntryRef<K, V>> + '_>;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn clear(&mut self);

  #[inline]
  fn contains_key(&self, key: &K) -> bool {
    self.get(key).is_some()
  }
}
