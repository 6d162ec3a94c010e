/// A type-erased unit of work handed to a [`TaskExecutor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs callbacks off the thread that evicted the entry.
///
/// Used to deliver notifications to asynchronous expiration listeners. When
/// none is configured, the map lazily spawns a dedicated notifier thread.
pub trait TaskExecutor: Send + Sync + 'static {
  fn execute(&self, task: Task);
}

#[cfg(feature = "tokio")]
pub struct TokioExecutor(tokio::runtime::Handle);

#[cfg(feature = "tokio")]
impl TokioExecutor {
  /// Creates an executor that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self(tokio::runtime::Handle::current())
  }

  pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }
}

#[cfg(feature = "tokio")]
impl TaskExecutor for TokioExecutor {
  fn execute(&self, task: Task) {
    // Listeners are plain blocking callbacks.
    self.0.spawn_blocking(task);
  }
}
