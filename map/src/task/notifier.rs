use crate::runtime::{Task, TaskExecutor};

use std::thread;

use fibre::mpsc;

/// Queue depth between evicting threads and the notifier thread. Senders
/// block when it is full; they never hold the map lock while sending.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// The default executor for asynchronous expiration listeners: one thread
/// draining a bounded channel of tasks.
///
/// The thread exits once the notifier is dropped and the queue is drained.
pub(crate) struct Notifier {
  sender: mpsc::BoundedSender<Task>,
}

impl Notifier {
  pub(crate) fn spawn() -> std::io::Result<Self> {
    let (tx, rx): (mpsc::BoundedSender<Task>, mpsc::BoundedReceiver<Task>) =
      mpsc::bounded(NOTIFICATION_CHANNEL_CAPACITY);

    thread::Builder::new()
      .name("expiring-map-notifier".into())
      .spawn(move || {
        // Ends when every sender is gone.
        while let Ok(task) = rx.recv() {
          task();
        }
        tracing::trace!("notifier thread stopped");
      })?;

    Ok(Self { sender: tx })
  }
}

impl TaskExecutor for Notifier {
  fn execute(&self, task: Task) {
    if self.sender.send(task).is_err() {
      tracing::warn!("notifier thread is gone; dropping expiration notification");
    }
  }
}

/// Runs tasks on the calling thread. Used when the notifier thread cannot be
/// spawned.
pub(crate) struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
  fn execute(&self, task: Task) {
    task();
  }
}
