use std::fmt;
use std::time::Duration;

/// Determines when an entry's expiration countdown restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpirationPolicy {
  /// The entry expires a fixed duration after it was created or its value
  /// was replaced. Reads do not extend its life.
  #[default]
  Created,
  /// The entry expires a fixed duration after it was last read or written.
  Accessed,
}

impl fmt::Display for ExpirationPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExpirationPolicy::Created => write!(f, "expires after creation"),
      ExpirationPolicy::Accessed => write!(f, "expires after last access"),
    }
  }
}

/// A value paired with optional expiration overrides.
///
/// Returned by an expiring entry loader, or passed to
/// [`ExpiringMap::put_expiring`](crate::ExpiringMap::put_expiring). Any
/// setting left as `None` falls back to the map's default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringValue<V> {
  pub value: V,
  pub policy: Option<ExpirationPolicy>,
  pub duration: Option<Duration>,
}

impl<V> ExpiringValue<V> {
  /// A value that uses the map's default duration and policy.
  pub fn new(value: V) -> Self {
    Self {
      value,
      policy: None,
      duration: None,
    }
  }

  pub fn with_policy(mut self, policy: ExpirationPolicy) -> Self {
    self.policy = Some(policy);
    self
  }

  pub fn with_duration(mut self, duration: Duration) -> Self {
    self.duration = Some(duration);
    self
  }

  pub(crate) fn has_overrides(&self) -> bool {
    self.policy.is_some() || self.duration.is_some()
  }
}

impl<V> From<V> for ExpiringValue<V> {
  fn from(value: V) -> Self {
    Self::new(value)
  }
}
