use crate::policy::ExpirationPolicy;
use crate::scheduler::{deadline_after, TimerHandle};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

/// Expiration settings of one entry. `None` means "follow the map default".
#[derive(Debug, Clone, Copy)]
struct Expiration {
  duration: Option<Duration>,
  policy: Option<ExpirationPolicy>,
  expected_at: Instant,
}

/// Timer ownership of one entry.
///
/// `ticket` changes every time the entry is armed, so a callback from an
/// earlier, cancelled timer can tell that it no longer owns the entry.
#[derive(Debug, Default)]
struct ScheduleState {
  scheduled: bool,
  ticket: u64,
  handle: Option<TimerHandle>,
}

/// A key/value pair plus its expiration bookkeeping.
///
/// Shared as `Arc<ExpiringEntry>` between the store and (weakly) the pending
/// timer callback. Lock order is always map lock first, then any of the
/// entry-local locks below.
pub(crate) struct ExpiringEntry<K, V> {
  key: K,
  value: RwLock<Arc<V>>,
  expiration: Mutex<Expiration>,
  schedule: Mutex<ScheduleState>,
}

impl<K, V> ExpiringEntry<K, V> {
  pub(crate) fn new(
    key: K,
    value: V,
    duration: Option<Duration>,
    policy: Option<ExpirationPolicy>,
    expected_at: Instant,
  ) -> Self {
    Self {
      key,
      value: RwLock::new(Arc::new(value)),
      expiration: Mutex::new(Expiration {
        duration,
        policy,
        expected_at,
      }),
      schedule: Mutex::new(ScheduleState::default()),
    }
  }

  #[inline]
  pub(crate) fn key(&self) -> &K {
    &self.key
  }

  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.read().clone()
  }

  /// Swaps in a new value and returns the previous one.
  pub(crate) fn replace_value(&self, value: V) -> Arc<V> {
    std::mem::replace(&mut *self.value.write(), Arc::new(value))
  }

  pub(crate) fn value_eq(&self, other: &V) -> bool
  where
    V: PartialEq,
  {
    **self.value.read() == *other
  }

  // --- Expiration settings ---

  pub(crate) fn own_duration(&self) -> Option<Duration> {
    self.expiration.lock().duration
  }

  pub(crate) fn own_policy(&self) -> Option<ExpirationPolicy> {
    self.expiration.lock().policy
  }

  pub(crate) fn duration_or(&self, default: Duration) -> Duration {
    self.own_duration().unwrap_or(default)
  }

  pub(crate) fn policy_or(&self, default: ExpirationPolicy) -> ExpirationPolicy {
    self.own_policy().unwrap_or(default)
  }

  pub(crate) fn set_duration(&self, duration: Duration) {
    self.expiration.lock().duration = Some(duration);
  }

  pub(crate) fn set_policy(&self, policy: ExpirationPolicy) {
    self.expiration.lock().policy = Some(policy);
  }

  #[inline]
  pub(crate) fn expected_at(&self) -> Instant {
    self.expiration.lock().expected_at
  }

  /// Restarts the countdown from `now`. The caller must re-seat the entry in
  /// its store afterwards.
  pub(crate) fn reset_expected(&self, now: Instant, default_duration: Duration) {
    let mut expiration = self.expiration.lock();
    expiration.expected_at = deadline_after(now, expiration.duration.unwrap_or(default_duration));
  }

  #[inline]
  pub(crate) fn is_due(&self, now: Instant) -> bool {
    self.expected_at() <= now
  }

  // --- Scheduling state ---

  pub(crate) fn is_scheduled(&self) -> bool {
    self.schedule.lock().scheduled
  }

  /// Arms a timer for this entry unless one is already pending.
  ///
  /// `arm` receives the new ticket and must return the handle of the timer
  /// it submitted. Returns `false` when the entry was already scheduled.
  pub(crate) fn schedule_with<F>(&self, arm: F) -> bool
  where
    F: FnOnce(u64) -> TimerHandle,
  {
    let mut state = self.schedule.lock();
    if state.scheduled {
      return false;
    }
    state.ticket = state.ticket.wrapping_add(1);
    let handle = arm(state.ticket);
    state.scheduled = true;
    state.handle = Some(handle);
    true
  }

  /// Cancels the pending timer, if any. Returns whether one was pending.
  pub(crate) fn cancel(&self) -> bool {
    let mut state = self.schedule.lock();
    if !state.scheduled {
      return false;
    }
    if let Some(handle) = state.handle.take() {
      handle.cancel();
    }
    state.scheduled = false;
    true
  }

  /// Called from a fired timer. Clears the scheduling state and returns
  /// `true` only if the timer with `ticket` still owns this entry.
  pub(crate) fn claim_fired(&self, ticket: u64) -> bool {
    let mut state = self.schedule.lock();
    if !state.scheduled || state.ticket != ticket {
      return false;
    }
    state.scheduled = false;
    state.handle = None;
    true
  }
}

impl<K: fmt::Debug, V> fmt::Debug for ExpiringEntry<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiringEntry")
      .field("key", &self.key)
      .field("expected_at", &self.expected_at())
      .field("scheduled", &self.is_scheduled())
      .finish_non_exhaustive()
  }
}
