use expiring_map::builder::DEFAULT_EXPIRATION;
use expiring_map::{BuildError, ExpirationPolicy, ExpiringMap, ExpiringMapBuilder, ExpiringValue};
use std::time::Duration;

#[test]
fn test_defaults() {
  let map: ExpiringMap<i32, i32> = ExpiringMap::builder().build().unwrap();

  assert_eq!(map.expiration(), DEFAULT_EXPIRATION);
  assert_eq!(map.expiration(), Duration::from_secs(60));
  assert_eq!(map.expiration_policy(), ExpirationPolicy::Created);
  assert!(!map.is_variable_expiration());
  assert!(map.is_empty());
}

#[test]
fn test_default_builder_matches_new() {
  let map: ExpiringMap<i32, i32> = ExpiringMapBuilder::default()
    .expiration(Duration::from_secs(5))
    .expiration_policy(ExpirationPolicy::Accessed)
    .variable_expiration()
    .build()
    .unwrap();

  assert_eq!(map.expiration(), Duration::from_secs(5));
  assert_eq!(map.expiration_policy(), ExpirationPolicy::Accessed);
  assert!(map.is_variable_expiration());
}

#[test]
fn test_zero_expiration_is_rejected() {
  let result = ExpiringMap::<i32, i32>::builder()
    .expiration(Duration::ZERO)
    .build();
  assert!(matches!(result, Err(BuildError::ZeroExpiration)));
}

#[test]
fn test_conflicting_loaders_are_rejected() {
  let result = ExpiringMap::<i32, i32>::builder()
    .entry_loader(|key: &i32| *key)
    .expiring_entry_loader(|key: &i32| ExpiringValue::new(*key))
    .build();
  assert!(matches!(result, Err(BuildError::ConflictingLoaders)));

  let result = ExpiringMap::<i32, i32>::builder()
    .expiring_entry_loader(|key: &i32| ExpiringValue::new(*key))
    .entry_loader(|key: &i32| *key)
    .build();
  assert!(matches!(result, Err(BuildError::ConflictingLoaders)));
}

#[test]
fn test_setting_the_same_loader_kind_twice_keeps_the_last() {
  let map = ExpiringMap::<i32, i32>::builder()
    .entry_loader(|key: &i32| *key)
    .entry_loader(|key: &i32| key * 10)
    .build()
    .unwrap();
  assert_eq!(*map.get(&4).unwrap(), 40);
}

#[test]
fn test_expiring_loader_implies_variable_expiration() {
  let map = ExpiringMap::<i32, i32>::builder()
    .expiring_entry_loader(|key: &i32| ExpiringValue::new(*key))
    .build()
    .unwrap();
  assert!(map.is_variable_expiration());
}

#[test]
fn test_build_error_messages() {
  assert_eq!(
    BuildError::ZeroExpiration.to_string(),
    "expiration duration cannot be zero"
  );
  assert!(BuildError::ConflictingLoaders
    .to_string()
    .contains("not both"));
}

#[test]
fn test_huge_default_expiration_does_not_overflow() {
  let map: ExpiringMap<i32, i32> = ExpiringMap::builder()
    .expiration(Duration::MAX)
    .expiration_policy(ExpirationPolicy::Accessed)
    .build()
    .unwrap();

  map.put(1, 1);
  assert_eq!(map.get(&1).as_deref(), Some(&1));
  map.reset_expiration(&1);
  assert_eq!(map.len(), 1);
}

#[test]
fn test_hasher_changes_the_hasher_type() {
  use std::collections::hash_map::RandomState;

  let map: ExpiringMap<i32, i32, RandomState> = ExpiringMap::builder()
    .hasher(RandomState::new())
    .variable_expiration()
    .build()
    .unwrap();

  map.put(1, 10);
  map.put_with_expiration(2, 20, Duration::from_secs(5)).unwrap();
  assert_eq!(map.get(&1).as_deref(), Some(&10));
  assert_eq!(map.len(), 2);
}
