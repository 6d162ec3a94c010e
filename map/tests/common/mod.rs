#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use expiring_map::{ExpirationListener, ExpiringMap, ExpiringMapBuilder, ManualScheduler};

pub const TTL: Duration = Duration::from_millis(100);

// Maps driven by a virtual clock. Nothing expires until the test calls
// `scheduler.advance(..)`, and expirations then run on the test thread.
pub fn manual_builder() -> (ExpiringMapBuilder<i32, String>, Arc<ManualScheduler>) {
  let scheduler = Arc::new(ManualScheduler::new());
  let builder = ExpiringMap::builder()
    .expiration(TTL)
    .scheduler(scheduler.clone());
  (builder, scheduler)
}

pub fn manual_map() -> (ExpiringMap<i32, String>, Arc<ManualScheduler>) {
  let (builder, scheduler) = manual_builder();
  (builder.build().unwrap(), scheduler)
}

pub fn manual_variable_map() -> (ExpiringMap<i32, String>, Arc<ManualScheduler>) {
  let (builder, scheduler) = manual_builder();
  (builder.variable_expiration().build().unwrap(), scheduler)
}

pub fn ms(millis: u64) -> Duration {
  Duration::from_millis(millis)
}

// Records every expiration it is told about, in order.
#[derive(Clone, Default)]
pub struct Recorder {
  events: Arc<Mutex<Vec<(i32, String)>>>,
}

impl Recorder {
  pub fn events(&self) -> Vec<(i32, String)> {
    self.events.lock().unwrap().clone()
  }

  pub fn keys(&self) -> Vec<i32> {
    self.events().into_iter().map(|(key, _)| key).collect()
  }
}

impl ExpirationListener<i32, String> for Recorder {
  fn expired(&self, key: &i32, value: &Arc<String>) {
    self
      .events
      .lock()
      .unwrap()
      .push((*key, value.to_string()));
  }
}
