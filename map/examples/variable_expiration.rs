use expiring_map::{ExpirationPolicy, ExpiringMap, ExpiringValue};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
  // RUST_LOG=expiring_map=debug shows the eviction passes.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  println!("--- Variable Expiration Example ---");

  // Sessions load on demand. Guests get a short, access-refreshed lifetime,
  // everyone else keeps the map default.
  let sessions: ExpiringMap<String, String> = ExpiringMap::builder()
    .expiration(Duration::from_secs(3))
    .expiring_entry_loader(|user: &String| {
      println!("[loader] opening a session for '{}'", user);
      let session = ExpiringValue::new(format!("session-of-{}", user));
      if user.starts_with("guest") {
        session
          .with_duration(Duration::from_secs(1))
          .with_policy(ExpirationPolicy::Accessed)
      } else {
        session
      }
    })
    .on_expiry(|user: &String, session: &Arc<String>| {
      println!("[listener] '{}' closed ({})", user, session);
    })
    .build()
    .expect("Failed to build map");

  println!("Variable expiration enabled: {}", sessions.is_variable_expiration());

  sessions.get(&"alice".to_string());
  sessions.get(&"guest-42".to_string());

  // An explicit per-entry duration on a plain put.
  sessions
    .put_with_expiration("bob".to_string(), "session-of-bob".to_string(), Duration::from_millis(1500))
    .expect("variable maps accept per-entry durations");

  for (user, _) in sessions.entries() {
    println!(
      "'{}' expires after {:?} under {:?}",
      user,
      sessions.entry_expiration(&user).unwrap_or_default(),
      sessions.entry_expiration_policy(&user).unwrap_or_default()
    );
  }

  // Keep the guest alive by touching it more often than its one-second TTL.
  for _ in 0..4 {
    thread::sleep(Duration::from_millis(600));
    sessions.get(&"guest-42".to_string());
  }

  println!("\nAfter 2.4s the remaining sessions are: {:?}", sessions.keys());

  thread::sleep(Duration::from_secs(2));
  println!("After 4.4s the remaining sessions are: {:?}", sessions.keys());

  println!("\n--- Metrics ---");
  println!("{:#?}", sessions.metrics());
}
