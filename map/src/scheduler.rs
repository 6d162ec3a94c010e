//! One-shot delay scheduling used to drive expiration.
//!
//! A map never owns a timer per entry. It asks its [`Scheduler`] for a single
//! one-shot callback for the soonest-expiring entry and re-arms it from inside
//! that callback. Any executor able to "run this once after a delay" can back
//! a map; two are provided:
//!
//! - [`ThreadScheduler`]: a background thread sleeping on the earliest deadline.
//!   It can be shared by many maps.
//! - [`ManualScheduler`]: a virtual clock that only moves when told to, for
//!   deterministic tests.

mod manual;
mod thread;

pub use manual::ManualScheduler;
pub use thread::ThreadScheduler;

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on how far ahead a deadline is placed. Durations beyond it,
/// such as `Duration::MAX`, mean "practically never".
pub(crate) const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + delay`, clamped to [`FAR_FUTURE`] instead of overflowing.
#[inline]
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
  now
    .checked_add(delay.min(FAR_FUTURE))
    .unwrap_or(now)
}

/// A type-erased callback run once by a scheduler.
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// A cancellable handle to a scheduled task.
///
/// Cancellation is best-effort: a task that has already started running is
/// not interrupted.
#[derive(Clone, Default)]
pub struct TimerHandle {
  cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
  pub fn new() -> Self {
    Self::default()
  }

  /// Prevents the task from running if it has not started yet.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }
}

impl fmt::Debug for TimerHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TimerHandle")
      .field("cancelled", &self.is_cancelled())
      .finish()
  }
}

/// Runs callbacks once after a delay.
///
/// `now` is the clock every expiration instant is computed against, so a
/// scheduler with a virtual clock makes the whole map run on virtual time.
///
/// Implementations must not hold internal locks while running a task: tasks
/// take the owning map's write lock, and the map arms new timers while
/// holding that same lock.
pub trait Scheduler: Send + Sync + 'static {
  /// The current instant on this scheduler's clock.
  fn now(&self) -> Instant;

  /// Schedules `task` to run once, no earlier than `delay` from `now()`.
  fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle;
}

/// A queued task, ordered so that a `BinaryHeap` pops the earliest deadline
/// first. Ties are broken by submission order.
pub(crate) struct Timer {
  pub(crate) deadline: Instant,
  pub(crate) seq: u64,
  pub(crate) handle: TimerHandle,
  pub(crate) task: ScheduledTask,
}

impl PartialEq for Timer {
  fn eq(&self, other: &Self) -> bool {
    self.deadline == other.deadline && self.seq == other.seq
  }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
  fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
    Some(self.cmp(other))
  }
}

impl Ord for Timer {
  fn cmp(&self, other: &Self) -> CmpOrdering {
    // Reversed: BinaryHeap is a max-heap.
    other
      .deadline
      .cmp(&self.deadline)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}
