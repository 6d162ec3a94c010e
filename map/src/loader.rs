use crate::policy::ExpiringValue;

use std::sync::Arc;

/// Computes the value for a key that is missing from the map.
///
/// Loaders run on the calling thread with no map lock held. A panic inside
/// a loader unwinds through the `get` that triggered it.
pub(crate) enum Loader<K, V> {
  Plain(Arc<dyn Fn(&K) -> V + Send + Sync>),
  /// Produces a value together with its own expiration settings. Only
  /// available on variable-expiration maps.
  Expiring(Arc<dyn Fn(&K) -> ExpiringValue<V> + Send + Sync>),
}

impl<K, V> Loader<K, V> {
  pub(crate) fn load(&self, key: &K) -> ExpiringValue<V> {
    match self {
      Loader::Plain(f) => ExpiringValue::new(f(key)),
      Loader::Expiring(f) => f(key),
    }
  }
}

impl<K, V> Clone for Loader<K, V> {
  fn clone(&self) -> Self {
    match self {
      Loader::Plain(f) => Loader::Plain(f.clone()),
      Loader::Expiring(f) => Loader::Expiring(f.clone()),
    }
  }
}
