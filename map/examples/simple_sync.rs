use expiring_map::ExpiringMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
  println!("--- Simple Sync Example ---");

  // 1. Build a map whose entries live for two seconds after they are written.
  let map: ExpiringMap<String, i32> = ExpiringMap::builder()
    .expiration(Duration::from_secs(2))
    .on_expiry(|key: &String, value: &Arc<i32>| {
      println!("[listener] '{}' expired with value {}", key, value);
    })
    .build()
    .expect("Failed to build map");

  println!("Map built with a {:?} TTL.", map.expiration());

  // 2. Insert a few entries.
  map.put("apple".to_string(), 10);
  map.put("banana".to_string(), 20);
  println!("Inserted 'apple' and 'banana'. Map length: {}", map.len());

  // 3. Read them back.
  if let Some(value) = map.get(&"apple".to_string()) {
    println!("Got value for 'apple': {}", value);
  }
  if map.get(&"cherry".to_string()).is_none() {
    println!("'cherry' is not in the map, as expected.");
  }

  // 4. Remove an entry. Removals never reach the listener.
  if let Some(value) = map.remove(&"banana".to_string()) {
    println!("Removed 'banana' with value: {}", value);
  }

  println!(
    "'apple' expires in roughly {:?}",
    map.expected_expiration(&"apple".to_string())
  );

  // 5. Metrics after the basic operations.
  println!("\n--- Metrics ---");
  println!("{:#?}", map.metrics());

  // 6. Wait for the TTL to pass.
  println!("\nSleeping for 3 seconds to let 'apple' expire...");
  thread::sleep(Duration::from_secs(3));

  match map.get(&"apple".to_string()) {
    Some(value) => println!("'apple' is unexpectedly still present: {}", value),
    None => println!("'apple' expired and is gone."),
  }

  println!("\n--- Final Metrics ---");
  println!("{:#?}", map.metrics());
}
