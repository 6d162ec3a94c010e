use super::{deadline_after, ScheduledTask, Scheduler, Timer, TimerHandle};

use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct State {
  origin: Instant,
  elapsed: Duration,
  timers: BinaryHeap<Timer>,
  next_seq: u64,
}

/// A scheduler driven by a virtual clock.
///
/// Time only moves when [`advance`](ManualScheduler::advance) is called. Due
/// tasks run on the calling thread, in deadline order, with the clock set to
/// each task's deadline while it runs. Tasks scheduled by a running task are
/// picked up within the same `advance` call if they fall inside the window.
pub struct ManualScheduler {
  state: Mutex<State>,
}

impl ManualScheduler {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(State {
        origin: Instant::now(),
        elapsed: Duration::ZERO,
        timers: BinaryHeap::new(),
        next_seq: 0,
      }),
    }
  }

  /// Moves the clock forward by `by`, running every task that becomes due.
  pub fn advance(&self, by: Duration) {
    let target = {
      let state = self.state.lock();
      deadline_after(state.origin + state.elapsed, by)
    };

    loop {
      let task = {
        let mut state = self.state.lock();
        let due = state
          .timers
          .peek()
          .is_some_and(|timer| timer.deadline <= target);
        if !due {
          state.elapsed = target - state.origin;
          break;
        }
        let Some(timer) = state.timers.pop() else {
          break;
        };
        let at = timer.deadline - state.origin;
        if at > state.elapsed {
          state.elapsed = at;
        }
        if timer.handle.is_cancelled() {
          continue;
        }
        timer.task
      };
      task();
    }
  }

  /// Time elapsed on the virtual clock since creation.
  pub fn elapsed(&self) -> Duration {
    self.state.lock().elapsed
  }

  /// Number of queued tasks that have not been cancelled.
  pub fn pending_timers(&self) -> usize {
    self
      .state
      .lock()
      .timers
      .iter()
      .filter(|timer| !timer.handle.is_cancelled())
      .count()
  }

  /// Remaining delay until the next live task is due, if any.
  pub fn next_due_in(&self) -> Option<Duration> {
    let state = self.state.lock();
    let now = state.origin + state.elapsed;
    state
      .timers
      .iter()
      .filter(|timer| !timer.handle.is_cancelled())
      .map(|timer| timer.deadline.saturating_duration_since(now))
      .min()
  }
}

impl Default for ManualScheduler {
  fn default() -> Self {
    Self::new()
  }
}

impl Scheduler for ManualScheduler {
  fn now(&self) -> Instant {
    let state = self.state.lock();
    state.origin + state.elapsed
  }

  fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle {
    let handle = TimerHandle::new();
    let mut state = self.state.lock();
    let deadline = deadline_after(state.origin + state.elapsed, delay);
    let seq = state.next_seq;
    state.next_seq += 1;
    state.timers.push(Timer {
      deadline,
      seq,
      handle: handle.clone(),
      task,
    });
    handle
  }
}

impl std::fmt::Debug for ManualScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ManualScheduler")
      .field("elapsed", &self.elapsed())
      .field("pending_timers", &self.pending_timers())
      .finish()
  }
}
