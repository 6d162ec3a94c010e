use thiserror::Error;

/// Errors returned by operations on an [`ExpiringMap`](crate::ExpiringMap).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
  /// The operation needs per-entry expiration settings, which are only
  /// available when the map was built with `variable_expiration()`.
  #[error("unsupported operation: {0}")]
  UnsupportedOperation(&'static str),

  /// An argument failed validation at the API boundary.
  #[error("invalid argument: {0}")]
  InvalidArgument(&'static str),
}

/// Errors that can occur when building a map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The default expiration duration was zero.
  #[error("expiration duration cannot be zero")]
  ZeroExpiration,

  /// Both an `entry_loader` and an `expiring_entry_loader` were configured.
  #[error("either an entry loader or an expiring entry loader may be set, not both")]
  ConflictingLoaders,

  /// No scheduler was supplied and the dedicated scheduler thread could not
  /// be spawned.
  #[error("failed to spawn the scheduler thread: {0}")]
  SchedulerSpawn(String),
}

/// Describes an expiration listener that panicked while being notified.
///
/// Failures never reach the thread that triggered the eviction. They are
/// logged, counted, and handed to the hook installed with
/// [`ExpiringMapBuilder::listener_error_hook`](crate::ExpiringMapBuilder::listener_error_hook).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
  /// Whether the listener was registered as asynchronous.
  pub asynchronous: bool,
  /// The panic message, if the payload was a string.
  pub message: String,
}

impl ListenerFailure {
  pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send), asynchronous: bool) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "listener panicked with a non-string payload".to_string()
    };
    Self {
      asynchronous,
      message,
    }
  }
}

impl std::fmt::Display for ListenerFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let kind = if self.asynchronous { "async" } else { "sync" };
    write!(f, "{kind} expiration listener panicked: {}", self.message)
  }
}

/// A specialized `Result` type for map operations.
pub type Result<T, E = MapError> = std::result::Result<T, E>;
