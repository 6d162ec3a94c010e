use super::{deadline_after, ScheduledTask, Scheduler, Timer, TimerHandle};

use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

/// Heap size below which cancelled timers are never compacted away.
const MIN_COMPACT_THRESHOLD: usize = 64;

struct Queue {
  timers: BinaryHeap<Timer>,
  next_seq: u64,
  compact_threshold: usize,
  shutdown: bool,
}

struct Inner {
  queue: Mutex<Queue>,
  wakeup: Condvar,
}

/// A scheduler backed by one background thread.
///
/// Tasks run on that thread in deadline order. Cancelled tasks are discarded
/// lazily when they reach the front of the queue, or in bulk when the queue
/// grows past a threshold. Dropping the scheduler stops the thread; tasks
/// still queued at that point never run.
pub struct ThreadScheduler {
  inner: Arc<Inner>,
}

impl ThreadScheduler {
  /// Spawns a scheduler thread with the default name.
  pub fn new() -> std::io::Result<Self> {
    Self::with_thread_name("expiring-map-scheduler")
  }

  /// Spawns a scheduler thread with the given name.
  pub fn with_thread_name(name: impl Into<String>) -> std::io::Result<Self> {
    let inner = Arc::new(Inner {
      queue: Mutex::new(Queue {
        timers: BinaryHeap::new(),
        next_seq: 0,
        compact_threshold: MIN_COMPACT_THRESHOLD,
        shutdown: false,
      }),
      wakeup: Condvar::new(),
    });

    let worker = inner.clone();
    thread::Builder::new()
      .name(name.into())
      .spawn(move || Self::run(worker))?;

    Ok(Self { inner })
  }

  /// Number of queued timers, including cancelled ones not yet discarded.
  pub fn queued(&self) -> usize {
    self.inner.queue.lock().timers.len()
  }

  fn run(inner: Arc<Inner>) {
    let mut queue = inner.queue.lock();
    loop {
      if queue.shutdown {
        break;
      }

      let next_deadline = queue.timers.peek().map(|timer| timer.deadline);
      match next_deadline {
        None => {
          inner.wakeup.wait(&mut queue);
        }
        Some(deadline) if deadline > Instant::now() => {
          inner.wakeup.wait_until(&mut queue, deadline);
        }
        Some(_) => {
          let Some(timer) = queue.timers.pop() else {
            continue;
          };
          if timer.handle.is_cancelled() {
            continue;
          }
          // Never run a task with the queue locked: tasks schedule new timers.
          MutexGuard::unlocked(&mut queue, || Self::run_task(timer.task));
        }
      }
    }
    tracing::trace!("scheduler thread stopped");
  }

  fn run_task(task: ScheduledTask) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
      tracing::warn!("scheduled task panicked; scheduler thread keeps running");
    }
  }
}

impl Scheduler for ThreadScheduler {
  fn now(&self) -> Instant {
    Instant::now()
  }

  fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle {
    let handle = TimerHandle::new();
    let deadline = deadline_after(Instant::now(), delay);

    let mut queue = self.inner.queue.lock();
    if queue.timers.len() >= queue.compact_threshold {
      queue.timers.retain(|timer| !timer.handle.is_cancelled());
      queue.compact_threshold = (queue.timers.len() * 2).max(MIN_COMPACT_THRESHOLD);
    }

    let seq = queue.next_seq;
    queue.next_seq += 1;
    let becomes_first = queue
      .timers
      .peek()
      .map_or(true, |first| deadline < first.deadline);
    queue.timers.push(Timer {
      deadline,
      seq,
      handle: handle.clone(),
      task,
    });
    drop(queue);

    if becomes_first {
      self.inner.wakeup.notify_one();
    }
    handle
  }
}

impl Drop for ThreadScheduler {
  fn drop(&mut self) {
    // Not joined: the last owner may be dropped from a task on the scheduler
    // thread itself.
    self.inner.queue.lock().shutdown = true;
    self.inner.wakeup.notify_one();
  }
}

impl std::fmt::Debug for ThreadScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ThreadScheduler")
      .field("queued", &self.queued())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc;

  #[test]
  fn test_runs_tasks_in_deadline_order() {
    let scheduler = ThreadScheduler::new().unwrap();
    let (tx, rx) = mpsc::channel();

    for (label, delay_ms) in [(3, 60), (1, 20), (2, 40)] {
      let tx = tx.clone();
      scheduler.schedule(
        Duration::from_millis(delay_ms),
        Box::new(move || tx.send(label).unwrap()),
      );
    }

    let order: Vec<i32> = (0..3)
      .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
      .collect();
    assert_eq!(order, vec![1, 2, 3]);
  }

  #[test]
  fn test_cancelled_task_does_not_run() {
    let scheduler = ThreadScheduler::new().unwrap();
    let (tx, rx) = mpsc::channel();

    let handle = scheduler.schedule(
      Duration::from_millis(30),
      Box::new(move || tx.send(()).unwrap()),
    );
    handle.cancel();

    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
  }

  #[test]
  fn test_panicking_task_does_not_stop_the_thread() {
    let scheduler = ThreadScheduler::new().unwrap();
    let (tx, rx) = mpsc::channel();

    scheduler.schedule(Duration::from_millis(5), Box::new(|| panic!("boom")));
    scheduler.schedule(
      Duration::from_millis(20),
      Box::new(move || tx.send("still alive").unwrap()),
    );

    assert_eq!(
      rx.recv_timeout(Duration::from_secs(2)).unwrap(),
      "still alive"
    );
  }

  #[test]
  fn test_cancelled_timers_are_compacted() {
    let scheduler = ThreadScheduler::new().unwrap();
    for _ in 0..(MIN_COMPACT_THRESHOLD * 4) {
      scheduler
        .schedule(Duration::from_secs(3600), Box::new(|| {}))
        .cancel();
    }
    assert!(scheduler.queued() <= MIN_COMPACT_THRESHOLD * 2);
  }

  #[test]
  fn test_never_expiring_delay_does_not_overflow() {
    let scheduler = ThreadScheduler::new().unwrap();
    let handle = scheduler.schedule(Duration::MAX, Box::new(|| {}));
    assert_eq!(scheduler.queued(), 1);
    handle.cancel();
  }
}
