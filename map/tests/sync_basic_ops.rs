mod common;

use common::{manual_map, ms, Recorder};

#[test]
fn test_put_and_get() {
  let (map, _scheduler) = manual_map();

  assert!(map.put(1, "one".to_string()).is_none());
  assert_eq!(map.get(&1).as_deref(), Some(&"one".to_string()));
  assert!(map.get(&2).is_none());
  assert_eq!(map.len(), 1);
  assert!(!map.is_empty());
}

#[test]
fn test_put_returns_previous_value() {
  let (map, _scheduler) = manual_map();
  map.put(1, "one".to_string());

  let old = map.put(1, "uno".to_string());
  assert_eq!(old.as_deref(), Some(&"one".to_string()));
  assert_eq!(*map.get(&1).unwrap(), "uno");
  assert_eq!(map.len(), 1);
}

#[test]
fn test_put_if_absent() {
  let (map, _scheduler) = manual_map();

  assert!(map.put_if_absent(1, "one".to_string()).is_none());
  let existing = map.put_if_absent(1, "other".to_string());
  assert_eq!(existing.as_deref(), Some(&"one".to_string()));
  assert_eq!(*map.get(&1).unwrap(), "one");
}

#[test]
fn test_replace_only_touches_present_keys() {
  let (map, _scheduler) = manual_map();

  assert!(map.replace(1, "one".to_string()).is_none());
  assert!(!map.contains_key(&1));

  map.put(1, "one".to_string());
  let old = map.replace(1, "uno".to_string());
  assert_eq!(old.as_deref(), Some(&"one".to_string()));
  assert_eq!(*map.get(&1).unwrap(), "uno");
}

#[test]
fn test_replace_if_compares_current_value() {
  let (map, _scheduler) = manual_map();
  map.put(1, "one".to_string());

  assert!(!map.replace_if(1, &"two".to_string(), "three".to_string()));
  assert_eq!(*map.get(&1).unwrap(), "one");

  assert!(map.replace_if(1, &"one".to_string(), "three".to_string()));
  assert_eq!(*map.get(&1).unwrap(), "three");

  assert!(!map.replace_if(9, &"one".to_string(), "nine".to_string()));
  assert!(!map.contains_key(&9));
}

#[test]
fn test_remove_and_remove_if() {
  let (map, _scheduler) = manual_map();
  map.put(1, "one".to_string());
  map.put(2, "two".to_string());

  assert_eq!(map.remove(&1).as_deref(), Some(&"one".to_string()));
  assert!(map.remove(&1).is_none());

  assert!(!map.remove_if(&2, &"zwei".to_string()));
  assert!(map.contains_key(&2));
  assert!(map.remove_if(&2, &"two".to_string()));
  assert!(map.is_empty());
}

#[test]
fn test_contains_key_and_value() {
  let (map, _scheduler) = manual_map();
  map.put(1, "one".to_string());

  assert!(map.contains_key(&1));
  assert!(!map.contains_key(&2));
  assert!(map.contains_value(&"one".to_string()));
  assert!(!map.contains_value(&"two".to_string()));
}

#[test]
fn test_snapshots_follow_expiration_order() {
  let (map, scheduler) = manual_map();
  map.put(3, "three".to_string());
  scheduler.advance(ms(1));
  map.put(1, "one".to_string());
  scheduler.advance(ms(1));
  map.put(2, "two".to_string());

  assert_eq!(map.keys(), vec![3, 1, 2]);
  let values: Vec<String> = map.values().iter().map(|v| v.to_string()).collect();
  assert_eq!(values, vec!["three", "one", "two"]);

  // Overwriting with a new value restarts the countdown.
  map.put(3, "drei".to_string());
  let entries: Vec<(i32, String)> = map
    .entries()
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect();
  assert_eq!(
    entries,
    vec![
      (1, "one".to_string()),
      (2, "two".to_string()),
      (3, "drei".to_string())
    ]
  );
}

#[test]
fn test_put_all() {
  let (map, _scheduler) = manual_map();
  map.put_all((0..5).map(|i| (i, i.to_string())));

  assert_eq!(map.len(), 5);
  assert_eq!(map.keys(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_clear_does_not_notify() {
  let (builder, scheduler) = common::manual_builder();
  let recorder = Recorder::default();
  let map = builder.expiration_listener(recorder.clone()).build().unwrap();

  map.put(1, "one".to_string());
  map.put(2, "two".to_string());
  map.clear();
  assert!(map.is_empty());
  assert_eq!(scheduler.pending_timers(), 0);

  scheduler.advance(ms(500));
  assert!(recorder.events().is_empty());
}

#[test]
fn test_clones_share_the_map() {
  let (map, _scheduler) = manual_map();
  let other = map.clone();

  map.put(1, "one".to_string());
  assert_eq!(*other.get(&1).unwrap(), "one");
  other.remove(&1);
  assert!(map.is_empty());
}

#[test]
fn test_metrics() {
  let (map, scheduler) = manual_map();
  map.put(1, "one".to_string());
  map.put(1, "uno".to_string());
  map.get(&1);
  map.get(&2);
  map.put(2, "two".to_string());
  map.remove(&2);
  scheduler.advance(ms(200));

  let metrics = map.metrics();
  assert_eq!(metrics.inserts, 2);
  assert_eq!(metrics.updates, 1);
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.removals, 1);
  assert_eq!(metrics.expirations, 1);
  assert!((metrics.hit_ratio - 0.5).abs() < f64::EPSILON);
}
