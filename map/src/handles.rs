use crate::builder::ExpiringMapBuilder;
use crate::error::{MapError, Result};
use crate::listener::{ExpirationListener, ListenerId};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::{ExpirationPolicy, ExpiringValue};
use crate::shared::{CacheShared, MapState};

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A thread-safe map whose entries remove themselves after a time-to-live.
///
/// Handles are cheap to clone and all refer to the same map. Expiration is
/// driven by a single pending timer per map, armed for whichever entry will
/// expire next.
///
/// Per-entry durations and policies are only available on maps built with
/// [`variable_expiration`](ExpiringMapBuilder::variable_expiration); on other
/// maps those methods return [`MapError::UnsupportedOperation`].
pub struct ExpiringMap<K, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V>>,
  pub(crate) _hasher: PhantomData<fn() -> H>,
}

impl<K, V, H> Clone for ExpiringMap<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
      _hasher: PhantomData,
    }
  }
}

impl<K, V, H> fmt::Debug for ExpiringMap<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiringMap")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<K, V> ExpiringMap<K, V, ahash::RandomState>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Starts configuring a map that uses the default hasher.
  pub fn builder() -> ExpiringMapBuilder<K, V> {
    ExpiringMapBuilder::new()
  }
}

fn check_duration(duration: Duration) -> Result<()> {
  if duration.is_zero() {
    return Err(MapError::InvalidArgument("expiration duration must be greater than zero"));
  }
  Ok(())
}

impl<K, V, H> ExpiringMap<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn ensure_variable(&self, operation: &'static str) -> Result<()> {
    if self.shared.variable {
      Ok(())
    } else {
      Err(MapError::UnsupportedOperation(operation))
    }
  }

  #[inline]
  fn now(&self) -> Instant {
    self.shared.scheduler.now()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Returns the value for `key`.
  ///
  /// Reading an entry under [`ExpirationPolicy::Accessed`] restarts its
  /// countdown. On a miss, a configured entry loader computes the value on
  /// the calling thread (no lock held). If another writer stored the key in
  /// the meantime, that value wins and is returned; otherwise the loaded
  /// value is stored and returned. A panicking loader unwinds through this
  /// call and leaves the map as it was.
  pub fn get(&self, key: &K) -> Option<Arc<V>> {
    let hit = {
      let state = self.shared.state.read();
      state
        .store
        .get(key)
        .map(|entry| (entry.value(), state.policy_of(entry)))
    };

    let Some((value, policy)) = hit else {
      Metrics::incr(&self.shared.metrics.misses);
      return self.load(key);
    };
    Metrics::incr(&self.shared.metrics.hits);

    if policy == ExpirationPolicy::Created {
      return Some(value);
    }
    // The entry may have expired or been replaced since the read lock.
    match self.access(key) {
      Some(current) => Some(current),
      None => self.load(key),
    }
  }

  /// Looks `key` up under the write lock, restarting the countdown of an
  /// `Accessed` entry. Returns the value live at that moment.
  fn access(&self, key: &K) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    let entry = state.store.get(key).cloned()?;
    if state.policy_of(&entry) == ExpirationPolicy::Accessed {
      let now = self.now();
      self.shared.reset_entry(&mut state, &entry, now);
    }
    Some(entry.value())
  }

  fn load(&self, key: &K) -> Option<Arc<V>> {
    let loader = self.shared.loader.as_ref()?;
    let ExpiringValue {
      value,
      policy,
      duration,
    } = loader.load(key);
    Metrics::incr(&self.shared.metrics.loads);

    let mut state = self.shared.state.write();
    if let Some(existing) = state.store.get(key) {
      return Some(existing.value());
    }
    let now = self.now();
    Some(
      self
        .shared
        .insert_entry(&mut state, key.clone(), value, duration, policy, now),
    )
  }

  /// Inserts or overwrites unconditionally. Returns the previous and the
  /// current value.
  fn write_value(
    &self,
    state: &mut MapState<K, V>,
    key: K,
    item: ExpiringValue<V>,
    now: Instant,
  ) -> (Option<Arc<V>>, Arc<V>) {
    let ExpiringValue {
      value,
      policy,
      duration,
    } = item;
    match state.store.get(&key).cloned() {
      Some(entry) => {
        let old = self
          .shared
          .update_entry(state, &entry, value, duration, policy, now);
        (Some(old), entry.value())
      }
      None => (
        None,
        self
          .shared
          .insert_entry(state, key, value, duration, policy, now),
      ),
    }
  }

  /// Inserts `value` only if `key` is absent.
  ///
  /// Returns the value already present, or `None` if the new value was
  /// inserted.
  pub fn put_if_absent(&self, key: K, value: V) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    if let Some(existing) = state.store.get(&key) {
      return Some(existing.value());
    }
    let now = self.now();
    self
      .shared
      .insert_entry(&mut state, key, value, None, None, now);
    None
  }

  /// Removes `key` and returns its value. Listeners are not notified.
  pub fn remove(&self, key: &K) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    self
      .shared
      .remove_entry(&mut state, key)
      .map(|entry| entry.value())
  }

  /// Restarts the countdown of `key` as if it had just been written.
  pub fn reset_expiration(&self, key: &K) {
    let mut state = self.shared.state.write();
    if let Some(entry) = state.store.get(key).cloned() {
      let now = self.now();
      self.shared.reset_entry(&mut state, &entry, now);
    }
  }

  /// Gives `key` its own duration and restarts its countdown.
  ///
  /// A missing key is ignored. Requires a variable-expiration map.
  pub fn set_entry_expiration(&self, key: &K, duration: Duration) -> Result<()> {
    self.ensure_variable("set_entry_expiration")?;
    check_duration(duration)?;

    let mut state = self.shared.state.write();
    if let Some(entry) = state.store.get(key).cloned() {
      entry.set_duration(duration);
      let now = self.now();
      self.shared.reset_entry(&mut state, &entry, now);
    }
    Ok(())
  }

  /// Gives `key` its own policy and restarts its countdown.
  ///
  /// A missing key is ignored. Requires a variable-expiration map.
  pub fn set_entry_expiration_policy(&self, key: &K, policy: ExpirationPolicy) -> Result<()> {
    self.ensure_variable("set_entry_expiration_policy")?;

    let mut state = self.shared.state.write();
    if let Some(entry) = state.store.get(key).cloned() {
      entry.set_policy(policy);
      let now = self.now();
      self.shared.reset_entry(&mut state, &entry, now);
    }
    Ok(())
  }

  /// Changes the default duration for entries created from now on.
  ///
  /// Requires a variable-expiration map; existing entries keep the duration
  /// they were created with.
  pub fn set_expiration(&self, duration: Duration) -> Result<()> {
    self.ensure_variable("set_expiration")?;
    check_duration(duration)?;
    self.shared.state.write().default_duration = duration;
    Ok(())
  }

  /// Changes the default policy.
  ///
  /// On a uniform map every entry follows the new policy on its next access.
  /// On a variable map only entries created afterwards use it.
  pub fn set_expiration_policy(&self, policy: ExpirationPolicy) {
    self.shared.state.write().default_policy = policy;
  }

  // --- Queries ---

  pub fn len(&self) -> usize {
    self.shared.state.read().store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.state.read().store.is_empty()
  }

  pub fn contains_key(&self, key: &K) -> bool {
    self.shared.state.read().store.contains_key(key)
  }

  /// The keys, soonest-expiring first.
  pub fn keys(&self) -> Vec<K> {
    let state = self.shared.state.read();
    state.store.iter().map(|entry| entry.key().clone()).collect()
  }

  /// The values, soonest-expiring first.
  pub fn values(&self) -> Vec<Arc<V>> {
    let state = self.shared.state.read();
    state.store.iter().map(|entry| entry.value()).collect()
  }

  /// Key/value pairs, soonest-expiring first.
  pub fn entries(&self) -> Vec<(K, Arc<V>)> {
    let state = self.shared.state.read();
    state
      .store
      .iter()
      .map(|entry| (entry.key().clone(), entry.value()))
      .collect()
  }

  /// Removes every entry. Listeners are not notified.
  pub fn clear(&self) {
    let mut state = self.shared.state.write();
    self.shared.clear(&mut state);
  }

  // --- Introspection ---

  /// The map's default duration.
  pub fn expiration(&self) -> Duration {
    self.shared.state.read().default_duration
  }

  /// The map's default policy.
  pub fn expiration_policy(&self) -> ExpirationPolicy {
    self.shared.state.read().default_policy
  }

  /// The duration `key` currently expires after.
  pub fn entry_expiration(&self, key: &K) -> Option<Duration> {
    let state = self.shared.state.read();
    state
      .store
      .get(key)
      .map(|entry| entry.duration_or(state.default_duration))
  }

  /// The policy `key` currently follows.
  pub fn entry_expiration_policy(&self, key: &K) -> Option<ExpirationPolicy> {
    let state = self.shared.state.read();
    state.store.get(key).map(|entry| state.policy_of(entry))
  }

  /// Time left before `key` expires, or `None` if it is not in the map.
  pub fn expected_expiration(&self, key: &K) -> Option<Duration> {
    let state = self.shared.state.read();
    let entry = state.store.get(key)?;
    Some(entry.expected_at().saturating_duration_since(self.now()))
  }

  pub fn is_variable_expiration(&self) -> bool {
    self.shared.variable
  }

  // --- Listeners ---

  /// Registers a listener called on the evicting thread, under the map lock.
  pub fn add_expiration_listener<L>(&self, listener: L) -> ListenerId
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.shared.listeners.add(Arc::new(listener), false)
  }

  /// Registers a listener run on the listener executor after the map lock is
  /// released.
  pub fn add_async_expiration_listener<L>(&self, listener: L) -> ListenerId
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.shared.listeners.add(Arc::new(listener), true)
  }

  /// Unregisters a listener. Returns `false` if it was not registered.
  pub fn remove_expiration_listener(&self, id: ListenerId) -> bool {
    self.shared.listeners.remove(id)
  }
}

// --- Writes that compare values ---
// Overwriting an equal value is a no-op for entries under the `Created`
// policy, which needs `V: PartialEq`.
impl<K, V, H> ExpiringMap<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: PartialEq + Send + Sync + 'static,
{
  fn put_locked(&self, state: &mut MapState<K, V>, key: K, item: ExpiringValue<V>) -> Option<Arc<V>> {
    if let Some(entry) = state.store.get(&key) {
      let unchanged = !item.has_overrides()
        && state.policy_of(entry) == ExpirationPolicy::Created
        && entry.value_eq(&item.value);
      if unchanged {
        return Some(entry.value());
      }
    }
    let now = self.now();
    self.write_value(state, key, item, now).0
  }

  fn put_item(&self, key: K, item: ExpiringValue<V>) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    self.put_locked(&mut state, key, item)
  }

  /// Inserts or overwrites `key`, returning the previous value.
  ///
  /// Writing a value equal to the current one leaves a `Created` entry
  /// untouched, including its expiration instant. Any other write restarts
  /// the countdown.
  pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
    self.put_item(key, ExpiringValue::new(value))
  }

  /// Like [`put`](Self::put), with a policy for this entry only.
  pub fn put_with_policy(&self, key: K, value: V, policy: ExpirationPolicy) -> Result<Option<Arc<V>>> {
    self.ensure_variable("put_with_policy")?;
    Ok(self.put_item(key, ExpiringValue::new(value).with_policy(policy)))
  }

  /// Like [`put`](Self::put), with a duration for this entry only.
  pub fn put_with_expiration(&self, key: K, value: V, duration: Duration) -> Result<Option<Arc<V>>> {
    self.ensure_variable("put_with_expiration")?;
    check_duration(duration)?;
    Ok(self.put_item(key, ExpiringValue::new(value).with_duration(duration)))
  }

  /// Like [`put`](Self::put), with a policy and duration for this entry only.
  pub fn put_with(
    &self,
    key: K,
    value: V,
    policy: ExpirationPolicy,
    duration: Duration,
  ) -> Result<Option<Arc<V>>> {
    self.ensure_variable("put_with")?;
    check_duration(duration)?;
    let item = ExpiringValue::new(value)
      .with_policy(policy)
      .with_duration(duration);
    Ok(self.put_item(key, item))
  }

  /// Stores an [`ExpiringValue`]. Overrides it carries require a
  /// variable-expiration map; a plain value behaves like [`put`](Self::put).
  pub fn put_expiring(&self, key: K, item: ExpiringValue<V>) -> Result<Option<Arc<V>>> {
    if item.has_overrides() {
      self.ensure_variable("put_expiring")?;
    }
    if let Some(duration) = item.duration {
      check_duration(duration)?;
    }
    Ok(self.put_item(key, item))
  }

  /// Puts every pair under a single acquisition of the map lock.
  pub fn put_all<I>(&self, items: I)
  where
    I: IntoIterator<Item = (K, V)>,
  {
    let mut state = self.shared.state.write();
    for (key, value) in items {
      self.put_locked(&mut state, key, ExpiringValue::new(value));
    }
  }

  /// Overwrites `key` only if it is present. Returns the previous value.
  pub fn replace(&self, key: K, value: V) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    if !state.store.contains_key(&key) {
      return None;
    }
    self.put_locked(&mut state, key, ExpiringValue::new(value))
  }

  /// Overwrites `key` only if its current value equals `old`.
  pub fn replace_if(&self, key: K, old: &V, new: V) -> bool {
    let mut state = self.shared.state.write();
    let matches = state
      .store
      .get(&key)
      .is_some_and(|entry| entry.value_eq(old));
    if matches {
      self.put_locked(&mut state, key, ExpiringValue::new(new));
    }
    matches
  }

  /// Removes `key` only if its current value equals `value`.
  pub fn remove_if(&self, key: &K, value: &V) -> bool {
    let mut state = self.shared.state.write();
    let matches = state
      .store
      .get(key)
      .is_some_and(|entry| entry.value_eq(value));
    if matches {
      self.shared.remove_entry(&mut state, key);
    }
    matches
  }

  pub fn contains_value(&self, value: &V) -> bool {
    let state = self.shared.state.read();
    let found = state.store.iter().any(|entry| entry.value_eq(value));
    found
  }
}
