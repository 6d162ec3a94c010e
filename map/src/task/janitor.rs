//! The scheduling chain that drives expiration.
//!
//! Exactly one entry per map owns a timer: the head of the store. When that
//! timer fires, the callback evicts everything that is due and arms a timer
//! for the new head, so the chain keeps itself going with no periodic work.

use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::store::EntryRef;

use std::hash::Hash;
use std::sync::Arc;

/// Arms a timer for `entry` unless it already owns one.
///
/// Called with the map's write lock held. The callback keeps only `Weak`
/// references to the map and the entry.
pub(crate) fn schedule_entry<K, V>(shared: &Arc<CacheShared<K, V>>, entry: &EntryRef<K, V>)
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  let delay = entry
    .expected_at()
    .saturating_duration_since(shared.scheduler.now());
  let weak_shared = Arc::downgrade(shared);
  let weak_entry = Arc::downgrade(entry);

  let armed = entry.schedule_with(move |ticket| {
    shared.scheduler.schedule(
      delay,
      Box::new(move || {
        let (Some(shared), Some(entry)) = (weak_shared.upgrade(), weak_entry.upgrade()) else {
          return;
        };
        expire_due(&shared, &entry, ticket);
      }),
    )
  });

  if armed {
    Metrics::incr(&shared.metrics.timers_armed);
    tracing::trace!(?delay, "armed expiration timer");
  }
}

/// Timer callback: evicts the fired entry and every other due entry, then
/// re-arms for the first entry still in the future.
///
/// Synchronous listeners are called before the write lock is released;
/// asynchronous listeners are handed off after.
fn expire_due<K, V>(shared: &Arc<CacheShared<K, V>>, fired: &EntryRef<K, V>, ticket: u64)
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  let mut expired: Vec<(K, Arc<V>)> = Vec::new();
  {
    let mut state = shared.state.write();
    if !fired.claim_fired(ticket) {
      // Cancelled or superseded while waiting for the lock.
      return;
    }

    let now = shared.scheduler.now();
    let present = state
      .store
      .get(fired.key())
      .is_some_and(|current| Arc::ptr_eq(current, fired));
    if present {
      state.store.remove(fired.key());
      expired.push((fired.key().clone(), fired.value()));
    }

    while let Some(head) = state.head() {
      if !head.is_due(now) {
        schedule_entry(shared, &head);
        break;
      }
      head.cancel();
      state.store.remove(head.key());
      expired.push((head.key().clone(), head.value()));
    }

    Metrics::add(&shared.metrics.expirations, expired.len() as u64);
    tracing::debug!(
      expired = expired.len(),
      remaining = state.store.len(),
      "expiration pass finished"
    );

    for (key, value) in &expired {
      shared.listeners.notify_sync(key, value);
    }
  }

  shared.listeners.dispatch_async(expired);
}
