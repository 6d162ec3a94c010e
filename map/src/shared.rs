use crate::entry::ExpiringEntry;
use crate::listener::ListenerRegistry;
use crate::loader::Loader;
use crate::metrics::Metrics;
use crate::policy::ExpirationPolicy;
use crate::scheduler::{deadline_after, Scheduler};
use crate::store::{EntryRef, EntryStore};
use crate::task::janitor;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Everything guarded by the map-wide lock.
pub(crate) struct MapState<K, V> {
  pub(crate) store: Box<dyn EntryStore<K, V>>,
  pub(crate) default_duration: Duration,
  pub(crate) default_policy: ExpirationPolicy,
}

impl<K, V> MapState<K, V> {
  #[inline]
  pub(crate) fn head(&self) -> Option<EntryRef<K, V>> {
    self.store.first().cloned()
  }

  /// The policy `entry` currently follows.
  #[inline]
  pub(crate) fn policy_of(&self, entry: &ExpiringEntry<K, V>) -> ExpirationPolicy {
    entry.policy_or(self.default_policy)
  }
}

/// The internal, thread-safe core of the map.
///
/// Timer callbacks only hold `Weak` references to it, so dropping the last
/// handle releases everything even while a timer is pending.
pub(crate) struct CacheShared<K, V> {
  pub(crate) state: RwLock<MapState<K, V>>,
  pub(crate) scheduler: Arc<dyn Scheduler>,
  pub(crate) listeners: ListenerRegistry<K, V>,
  pub(crate) loader: Option<Loader<K, V>>,
  pub(crate) variable: bool,
  pub(crate) metrics: Arc<Metrics>,
}

impl<K, V> fmt::Debug for CacheShared<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.read();
    f.debug_struct("CacheShared")
      .field("len", &state.store.len())
      .field("default_duration", &state.default_duration)
      .field("default_policy", &state.default_policy)
      .field("variable", &self.variable)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V> Drop for CacheShared<K, V> {
  fn drop(&mut self) {
    // Lets the scheduler discard the pending timer early.
    if let Some(head) = self.state.get_mut().store.first() {
      head.cancel();
    }
  }
}

impl<K, V> CacheShared<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Restores the single-armed-timer invariant after a mutation.
  ///
  /// `prev_head` is the head captured before the mutation. If the head has
  /// changed, the old head loses its timer. The current head is then armed,
  /// which does nothing when it already is.
  pub(crate) fn reconcile_head(self: &Arc<Self>, state: &MapState<K, V>, prev_head: Option<EntryRef<K, V>>) {
    let head = state.store.first();
    if let Some(prev) = prev_head {
      let unchanged = head.is_some_and(|current| Arc::ptr_eq(current, &prev));
      if !unchanged && prev.cancel() {
        tracing::trace!("cancelled timer of displaced head");
      }
    }
    if let Some(head) = head {
      janitor::schedule_entry(self, head);
    }
  }

  /// Creates an entry for a key that is not in the store.
  ///
  /// Variable maps snapshot the current defaults into the entry so later
  /// changes to the defaults leave it alone.
  pub(crate) fn insert_entry(
    self: &Arc<Self>,
    state: &mut MapState<K, V>,
    key: K,
    value: V,
    duration: Option<Duration>,
    policy: Option<ExpirationPolicy>,
    now: Instant,
  ) -> Arc<V> {
    let prev_head = state.head();
    let (duration, policy) = if self.variable {
      (
        Some(duration.unwrap_or(state.default_duration)),
        Some(policy.unwrap_or(state.default_policy)),
      )
    } else {
      (None, None)
    };
    let expected_at = deadline_after(now, duration.unwrap_or(state.default_duration));
    let entry = Arc::new(ExpiringEntry::new(key, value, duration, policy, expected_at));
    let value = entry.value();

    if let Some(displaced) = state.store.insert(entry) {
      displaced.cancel();
    }
    Metrics::incr(&self.metrics.inserts);
    self.reconcile_head(state, prev_head);
    value
  }

  /// Replaces the value of a live entry, applies any overrides, and restarts
  /// its countdown. Returns the previous value.
  pub(crate) fn update_entry(
    self: &Arc<Self>,
    state: &mut MapState<K, V>,
    entry: &EntryRef<K, V>,
    value: V,
    duration: Option<Duration>,
    policy: Option<ExpirationPolicy>,
    now: Instant,
  ) -> Arc<V> {
    let old = entry.replace_value(value);
    if let Some(duration) = duration {
      entry.set_duration(duration);
    }
    if let Some(policy) = policy {
      entry.set_policy(policy);
    }
    Metrics::incr(&self.metrics.updates);
    self.reset_entry(state, entry, now);
    old
  }

  /// Restarts `entry`'s countdown from `now` and re-seats it in the store.
  pub(crate) fn reset_entry(self: &Arc<Self>, state: &mut MapState<K, V>, entry: &EntryRef<K, V>, now: Instant) {
    let prev_head = state.head();
    entry.cancel();
    entry.reset_expected(now, state.default_duration);
    state.store.reorder(entry.key());
    Metrics::incr(&self.metrics.resets);
    self.reconcile_head(state, prev_head);
  }

  /// Removes `key` without notifying listeners.
  pub(crate) fn remove_entry(self: &Arc<Self>, state: &mut MapState<K, V>, key: &K) -> Option<EntryRef<K, V>> {
    let prev_head = state.head();
    let removed = state.store.remove(key)?;
    removed.cancel();
    Metrics::incr(&self.metrics.removals);
    self.reconcile_head(state, prev_head);
    Some(removed)
  }

  /// Empties the store without notifying listeners.
  pub(crate) fn clear(&self, state: &mut MapState<K, V>) {
    for entry in state.store.iter() {
      entry.cancel();
    }
    state.store.clear();
  }

  /// Number of entries that currently own a timer.
  #[cfg(test)]
  pub(crate) fn scheduled_count(&self) -> usize {
    self
      .state
      .read()
      .store
      .iter()
      .filter(|entry| entry.is_scheduled())
      .count()
  }
}
