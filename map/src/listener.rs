//! Expiration listeners and the registry that notifies them.
//!
//! Listeners only hear about entries removed because they expired. Explicit
//! `remove`, `replace` and `clear` never notify.
//!
//! # Example
//! ```
//! use expiring_map::ExpiringMap;
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! let expired: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
//! let log = Arc::clone(&expired);
//!
//! let map: ExpiringMap<u64, String> = ExpiringMap::builder()
//!   .expiration(Duration::from_secs(30))
//!   .on_expiry(move |key: &u64, _value: &Arc<String>| {
//!     log.lock().unwrap().push(*key);
//!   })
//!   .build()
//!   .unwrap();
//!
//! map.put(1, "one".to_string());
//! ```

use crate::error::ListenerFailure;
use crate::metrics::Metrics;
use crate::runtime::TaskExecutor;
use crate::task::notifier::{InlineExecutor, Notifier};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

/// A callback invoked each time an entry expires.
///
/// Synchronous listeners run on the thread that evicts the entry (normally
/// the scheduler thread) while the map's write lock is held, so they must be
/// fast and must not call back into the same map. Register a listener as
/// asynchronous to run it on the listener executor instead.
pub trait ExpirationListener<K, V>: Send + Sync {
  fn expired(&self, key: &K, value: &Arc<V>);
}

/// An [`ExpirationListener`] backed by a closure.
pub struct FnListener<F>(pub F);

impl<K, V, F> ExpirationListener<K, V> for FnListener<F>
where
  F: Fn(&K, &Arc<V>) + Send + Sync,
{
  fn expired(&self, key: &K, value: &Arc<V>) {
    (self.0)(key, value)
  }
}

/// Identifies a registered listener so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type ErrorHook = Arc<dyn Fn(&ListenerFailure) + Send + Sync>;

type Registered<K, V> = (ListenerId, Arc<dyn ExpirationListener<K, V>>);

/// Where listener panics end up.
#[derive(Clone)]
struct FailureSink {
  hook: Option<ErrorHook>,
  metrics: Arc<Metrics>,
}

impl FailureSink {
  fn invoke<K, V>(&self, listener: &dyn ExpirationListener<K, V>, key: &K, value: &Arc<V>, asynchronous: bool) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.expired(key, value)));
    if let Err(payload) = outcome {
      let failure = ListenerFailure::from_panic(payload.as_ref(), asynchronous);
      Metrics::incr(&self.metrics.listener_failures);
      tracing::warn!(asynchronous, message = %failure.message, "expiration listener panicked");
      if let Some(hook) = &self.hook {
        hook(&failure);
      }
    }
  }
}

/// Ordered, copy-on-write lists of synchronous and asynchronous listeners.
///
/// Notification iterates a snapshot, so a listener may register or remove
/// listeners without deadlocking the registry.
pub(crate) struct ListenerRegistry<K, V> {
  next_id: AtomicU64,
  sync_listeners: RwLock<Arc<Vec<Registered<K, V>>>>,
  async_listeners: RwLock<Arc<Vec<Registered<K, V>>>>,
  executor: OnceCell<Arc<dyn TaskExecutor>>,
  failures: FailureSink,
}

impl<K, V> ListenerRegistry<K, V> {
  pub(crate) fn new(
    executor: Option<Arc<dyn TaskExecutor>>,
    hook: Option<ErrorHook>,
    metrics: Arc<Metrics>,
  ) -> Self {
    let cell = OnceCell::new();
    if let Some(executor) = executor {
      let _ = cell.set(executor);
    }
    Self {
      next_id: AtomicU64::new(0),
      sync_listeners: RwLock::new(Arc::new(Vec::new())),
      async_listeners: RwLock::new(Arc::new(Vec::new())),
      executor: cell,
      failures: FailureSink { hook, metrics },
    }
  }

  pub(crate) fn add(&self, listener: Arc<dyn ExpirationListener<K, V>>, asynchronous: bool) -> ListenerId {
    let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let list = if asynchronous {
      &self.async_listeners
    } else {
      &self.sync_listeners
    };
    Arc::make_mut(&mut *list.write()).push((id, listener));
    id
  }

  pub(crate) fn remove(&self, id: ListenerId) -> bool {
    for list in [&self.sync_listeners, &self.async_listeners] {
      let mut guard = list.write();
      if let Some(pos) = guard.iter().position(|(registered, _)| *registered == id) {
        Arc::make_mut(&mut *guard).remove(pos);
        return true;
      }
    }
    false
  }

  #[cfg(test)]
  pub(crate) fn has_async(&self) -> bool {
    !self.async_listeners.read().is_empty()
  }

  /// Calls every synchronous listener, in registration order, on this thread.
  pub(crate) fn notify_sync(&self, key: &K, value: &Arc<V>) {
    let listeners = self.sync_listeners.read().clone();
    for (_, listener) in listeners.iter() {
      self.failures.invoke(listener.as_ref(), key, value, false);
    }
  }

  fn executor(&self) -> &Arc<dyn TaskExecutor> {
    self.executor.get_or_init(|| match Notifier::spawn() {
      Ok(notifier) => Arc::new(notifier),
      Err(err) => {
        tracing::warn!(error = %err, "failed to spawn notifier thread; async listeners will run inline");
        Arc::new(InlineExecutor)
      }
    })
  }
}

impl<K, V> ListenerRegistry<K, V>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Hands each expired entry to the executor, which calls every
  /// asynchronous listener for it. Must be called without the map lock held.
  pub(crate) fn dispatch_async(&self, expired: Vec<(K, Arc<V>)>) {
    if expired.is_empty() {
      return;
    }
    let listeners = self.async_listeners.read().clone();
    if listeners.is_empty() {
      return;
    }

    let executor = self.executor();
    for (key, value) in expired {
      let listeners = listeners.clone();
      let failures = self.failures.clone();
      executor.execute(Box::new(move || {
        for (_, listener) in listeners.iter() {
          failures.invoke(listener.as_ref(), &key, &value, true);
        }
      }));
    }
  }
}
