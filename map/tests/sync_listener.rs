mod common;

use common::{manual_builder, ms, Recorder};
use expiring_map::{FnListener, ListenerFailure, TaskExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_listener_fires_once_after_expiry() {
  let (builder, scheduler) = manual_builder();
  let recorder = Recorder::default();
  let map = builder.expiration_listener(recorder.clone()).build().unwrap();

  map.put(1, "one".to_string());
  scheduler.advance(ms(99));
  assert!(recorder.events().is_empty());

  scheduler.advance(ms(1));
  assert_eq!(recorder.events(), vec![(1, "one".to_string())]);

  scheduler.advance(ms(500));
  assert_eq!(recorder.events().len(), 1);
}

#[test]
fn test_no_notification_for_explicit_removal() {
  let (builder, scheduler) = manual_builder();
  let recorder = Recorder::default();
  let map = builder.expiration_listener(recorder.clone()).build().unwrap();

  map.put(1, "one".to_string());
  map.put(2, "two".to_string());
  map.remove(&1);
  map.replace(2, "zwei".to_string());
  scheduler.advance(ms(100));

  assert_eq!(recorder.events(), vec![(2, "zwei".to_string())]);
}

#[test]
fn test_listeners_run_in_registration_order() {
  let (builder, scheduler) = manual_builder();
  let order = Arc::new(Mutex::new(Vec::new()));
  let (first, second) = (order.clone(), order.clone());
  let map = builder
    .on_expiry(move |key: &i32, _: &Arc<String>| first.lock().unwrap().push(("first", *key)))
    .on_expiry(move |key: &i32, _: &Arc<String>| second.lock().unwrap().push(("second", *key)))
    .build()
    .unwrap();

  map.put(7, "seven".to_string());
  scheduler.advance(ms(100));
  assert_eq!(*order.lock().unwrap(), vec![("first", 7), ("second", 7)]);
}

#[test]
fn test_panicking_listener_is_isolated() {
  let (builder, scheduler) = manual_builder();
  let recorder = Recorder::default();
  let failures = Arc::new(Mutex::new(Vec::<ListenerFailure>::new()));
  let hook_failures = failures.clone();
  let map = builder
    .on_expiry(|_: &i32, _: &Arc<String>| panic!("listener exploded"))
    .expiration_listener(recorder.clone())
    .listener_error_hook(move |failure: &ListenerFailure| {
      hook_failures.lock().unwrap().push(failure.clone());
    })
    .build()
    .unwrap();

  map.put(1, "one".to_string());
  scheduler.advance(ms(50));
  map.put(2, "two".to_string());

  scheduler.advance(ms(50));
  assert_eq!(recorder.keys(), vec![1]);
  assert_eq!(map.keys(), vec![2], "the store must stay consistent");

  // Later evictions keep working.
  scheduler.advance(ms(50));
  assert_eq!(recorder.keys(), vec![1, 2]);
  assert!(map.is_empty());

  let failures = failures.lock().unwrap();
  assert_eq!(failures.len(), 2);
  assert_eq!(failures[0].message, "listener exploded");
  assert!(!failures[0].asynchronous);
  assert_eq!(map.metrics().listener_failures, 2);
}

#[test]
fn test_removed_listener_is_not_notified() {
  let (builder, scheduler) = manual_builder();
  let map = builder.build().unwrap();
  let recorder = Recorder::default();
  let kept = Recorder::default();

  let id = map.add_expiration_listener(recorder.clone());
  map.add_expiration_listener(kept.clone());
  assert!(map.remove_expiration_listener(id));
  assert!(!map.remove_expiration_listener(id));

  map.put(1, "one".to_string());
  scheduler.advance(ms(100));
  assert!(recorder.events().is_empty());
  assert_eq!(kept.keys(), vec![1]);
}

#[test]
fn test_async_listener_runs_on_notifier_thread() {
  let (builder, scheduler) = manual_builder();
  let (tx, rx) = mpsc::channel();
  let map = builder
    .on_expiry_async(move |key: &i32, value: &Arc<String>| {
      let name = thread::current().name().map(str::to_owned);
      tx.send((*key, value.to_string(), name)).unwrap();
    })
    .build()
    .unwrap();

  map.put(1, "one".to_string());
  scheduler.advance(ms(100));

  let (key, value, thread_name) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!((key, value.as_str()), (1, "one"));
  assert_eq!(thread_name.as_deref(), Some("expiring-map-notifier"));
  assert_ne!(thread_name.as_deref(), thread::current().name());
}

#[test]
fn test_async_listener_may_call_back_into_the_map() {
  let (builder, scheduler) = manual_builder();
  let map = builder.build().unwrap();
  let (tx, rx) = mpsc::channel();

  let handle = map.clone();
  let id = map.add_async_expiration_listener(FnListener(move |key: &i32, _: &Arc<String>| {
    // The map lock is released before asynchronous listeners run.
    handle.put(key + 100, "reborn".to_string());
    tx.send(()).unwrap();
  }));

  map.put(1, "one".to_string());
  scheduler.advance(ms(100));
  rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert!(map.contains_key(&101));

  // The listener owns a handle to the map; unregistering it breaks the cycle.
  assert!(map.remove_expiration_listener(id));
}

struct CountingExecutor {
  runs: AtomicUsize,
}

impl TaskExecutor for CountingExecutor {
  fn execute(&self, task: expiring_map::Task) {
    self.runs.fetch_add(1, Ordering::SeqCst);
    task();
  }
}

#[test]
fn test_custom_executor_and_async_panics() {
  let (builder, scheduler) = manual_builder();
  let executor = Arc::new(CountingExecutor {
    runs: AtomicUsize::new(0),
  });
  let failures = Arc::new(Mutex::new(Vec::<ListenerFailure>::new()));
  let hook_failures = failures.clone();
  let recorder = Recorder::default();
  let map = builder
    .listener_executor(executor.clone())
    .async_expiration_listener(FnListener(|_: &i32, _: &Arc<String>| {
      panic!("async listener exploded")
    }))
    .async_expiration_listener(recorder.clone())
    .listener_error_hook(move |failure: &ListenerFailure| {
      hook_failures.lock().unwrap().push(failure.clone());
    })
    .build()
    .unwrap();

  map.put(1, "one".to_string());
  map.put(2, "two".to_string());
  scheduler.advance(ms(100));

  assert_eq!(executor.runs.load(Ordering::SeqCst), 2);
  assert_eq!(recorder.keys(), vec![1, 2]);
  let failures = failures.lock().unwrap();
  assert_eq!(failures.len(), 2);
  assert!(failures.iter().all(|failure| failure.asynchronous));
}
