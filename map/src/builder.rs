use crate::error::{BuildError, ListenerFailure};
use crate::handles::ExpiringMap;
use crate::listener::{ErrorHook, ExpirationListener, FnListener, ListenerRegistry};
use crate::loader::Loader;
use crate::metrics::Metrics;
use crate::policy::{ExpirationPolicy, ExpiringValue};
use crate::runtime::TaskExecutor;
use crate::scheduler::{Scheduler, ThreadScheduler};
use crate::shared::{CacheShared, MapState};
use crate::store::{EntryStore, UniformStore, VariableStore};

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// Default time-to-live when none is configured.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(60);

/// A builder for creating [`ExpiringMap`] instances.
///
/// # Example
/// ```
/// use expiring_map::{ExpirationPolicy, ExpiringMap};
/// use std::time::Duration;
///
/// let map: ExpiringMap<String, u32> = ExpiringMap::builder()
///   .expiration(Duration::from_secs(30))
///   .expiration_policy(ExpirationPolicy::Accessed)
///   .build()
///   .unwrap();
/// map.put("answer".to_string(), 42);
/// ```
pub struct ExpiringMapBuilder<K, V, H = ahash::RandomState> {
  expiration: Duration,
  policy: ExpirationPolicy,
  variable: bool,
  hasher: H,
  loader: Option<Loader<K, V>>,
  conflicting_loaders: bool,
  listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
  async_listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
  scheduler: Option<Arc<dyn Scheduler>>,
  executor: Option<Arc<dyn TaskExecutor>>,
  error_hook: Option<ErrorHook>,
  _marker: PhantomData<fn() -> (K, V)>,
}

// Manual Debug implementation for ExpiringMapBuilder.
impl<K, V, H> fmt::Debug for ExpiringMapBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiringMapBuilder")
      .field("expiration", &self.expiration)
      .field("policy", &self.policy)
      .field("variable", &self.variable)
      .field("has_loader", &self.loader.is_some())
      .field("listeners", &self.listeners.len())
      .field("async_listeners", &self.async_listeners.len())
      .field("has_scheduler", &self.scheduler.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> ExpiringMapBuilder<K, V, H> {
  /// Sets the default time-to-live. Defaults to 60 seconds.
  pub fn expiration(mut self, duration: Duration) -> Self {
    self.expiration = duration;
    self
  }

  /// Sets the default expiration policy. Defaults to
  /// [`ExpirationPolicy::Created`].
  pub fn expiration_policy(mut self, policy: ExpirationPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Lets entries carry their own duration and policy.
  ///
  /// Variable maps keep entries in a sorted index, so writes cost O(log n)
  /// instead of O(1).
  pub fn variable_expiration(mut self) -> Self {
    self.variable = true;
    self
  }

  /// Computes values for missing keys on `get`.
  pub fn entry_loader(mut self, f: impl Fn(&K) -> V + Send + Sync + 'static) -> Self {
    self.set_loader(Loader::Plain(Arc::new(f)));
    self
  }

  /// Computes values, together with their own expiration settings, for
  /// missing keys on `get`. Implies [`variable_expiration`](Self::variable_expiration).
  pub fn expiring_entry_loader(mut self, f: impl Fn(&K) -> ExpiringValue<V> + Send + Sync + 'static) -> Self {
    self.set_loader(Loader::Expiring(Arc::new(f)));
    self.variable = true;
    self
  }

  fn set_loader(&mut self, loader: Loader<K, V>) {
    let mixed = matches!(
      (&self.loader, &loader),
      (Some(Loader::Plain(_)), Loader::Expiring(_)) | (Some(Loader::Expiring(_)), Loader::Plain(_))
    );
    if mixed {
      self.conflicting_loaders = true;
    }
    self.loader = Some(loader);
  }

  /// Adds a synchronous expiration listener.
  pub fn expiration_listener<L>(mut self, listener: L) -> Self
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.listeners.push(Arc::new(listener));
    self
  }

  /// Adds a synchronous expiration listener backed by a closure.
  pub fn on_expiry<F>(self, f: F) -> Self
  where
    F: Fn(&K, &Arc<V>) + Send + Sync + 'static,
  {
    self.expiration_listener(FnListener(f))
  }

  /// Adds an expiration listener that runs on the listener executor.
  pub fn async_expiration_listener<L>(mut self, listener: L) -> Self
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.async_listeners.push(Arc::new(listener));
    self
  }

  /// Adds an asynchronous expiration listener backed by a closure.
  pub fn on_expiry_async<F>(self, f: F) -> Self
  where
    F: Fn(&K, &Arc<V>) + Send + Sync + 'static,
  {
    self.async_expiration_listener(FnListener(f))
  }

  /// Drives expiration with `scheduler` instead of a dedicated thread.
  ///
  /// One scheduler can be shared by many maps.
  pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
    self.scheduler = Some(scheduler);
    self
  }

  /// Runs asynchronous listeners on `executor`. Without one, a notifier
  /// thread is spawned the first time an asynchronous listener is due.
  pub fn listener_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
    self.executor = Some(executor);
    self
  }

  /// Called with every listener panic, after it is logged.
  pub fn listener_error_hook(mut self, hook: impl Fn(&ListenerFailure) + Send + Sync + 'static) -> Self {
    self.error_hook = Some(Arc::new(hook));
    self
  }

  /// Sets the hasher used for key lookups. The hasher may be of a different
  /// type than the current one; the built map carries the new type.
  pub fn hasher<H2>(self, hasher: H2) -> ExpiringMapBuilder<K, V, H2> {
    ExpiringMapBuilder {
      expiration: self.expiration,
      policy: self.policy,
      variable: self.variable,
      hasher,
      loader: self.loader,
      conflicting_loaders: self.conflicting_loaders,
      listeners: self.listeners,
      async_listeners: self.async_listeners,
      scheduler: self.scheduler,
      executor: self.executor,
      error_hook: self.error_hook,
      _marker: PhantomData,
    }
  }
}

// --- Default Constructor ---
impl<K, V, H: BuildHasher + Default> ExpiringMapBuilder<K, V, H> {
  /// Creates a new `ExpiringMapBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      expiration: DEFAULT_EXPIRATION,
      policy: ExpirationPolicy::default(),
      variable: false,
      hasher: H::default(),
      loader: None,
      conflicting_loaders: false,
      listeners: Vec::new(),
      async_listeners: Vec::new(),
      scheduler: None,
      executor: None,
      error_hook: None,
      _marker: PhantomData,
    }
  }
}

impl<K, V> Default for ExpiringMapBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> ExpiringMapBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Builds the map.
  ///
  /// Without an injected scheduler this spawns a dedicated scheduler thread,
  /// which stops when the map is dropped.
  pub fn build(self) -> Result<ExpiringMap<K, V, H>, BuildError> {
    self.validate()?;

    let scheduler: Arc<dyn Scheduler> = match self.scheduler {
      Some(scheduler) => scheduler,
      None => Arc::new(ThreadScheduler::new().map_err(|e| BuildError::SchedulerSpawn(e.to_string()))?),
    };

    let store: Box<dyn EntryStore<K, V>> = if self.variable {
      Box::new(VariableStore::with_hasher(self.hasher))
    } else {
      Box::new(UniformStore::with_hasher(self.hasher))
    };

    let metrics = Arc::new(Metrics::new());
    let listeners = ListenerRegistry::new(self.executor, self.error_hook, metrics.clone());
    for listener in self.listeners {
      listeners.add(listener, false);
    }
    for listener in self.async_listeners {
      listeners.add(listener, true);
    }

    tracing::debug!(
      expiration = ?self.expiration,
      policy = %self.policy,
      variable = self.variable,
      "building expiring map"
    );

    let shared = Arc::new(CacheShared {
      state: RwLock::new(MapState {
        store,
        default_duration: self.expiration,
        default_policy: self.policy,
      }),
      scheduler,
      listeners,
      loader: self.loader,
      variable: self.variable,
      metrics,
    });

    Ok(ExpiringMap {
      shared,
      _hasher: PhantomData,
    })
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.expiration.is_zero() {
      return Err(BuildError::ZeroExpiration);
    }
    if self.conflicting_loaders {
      return Err(BuildError::ConflictingLoaders);
    }
    Ok(())
  }
}
