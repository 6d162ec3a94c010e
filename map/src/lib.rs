//! A concurrent key/value map whose entries expire on their own.
//!
//! Entries are removed a fixed duration after they were written
//! ([`ExpirationPolicy::Created`]) or last accessed
//! ([`ExpirationPolicy::Accessed`]). Instead of a timer per entry, each map
//! keeps exactly one pending timer, armed for the entry that will expire
//! next, and re-arms it from inside the timer callback.
//!
//! # Features
//! - **Uniform or variable expiration**: one duration and policy for the
//!   whole map (O(1) writes), or per-entry settings (O(log n) writes).
//! - **Lazy loading**: an entry loader computes missing values on `get`.
//! - **Expiration listeners**: synchronous ones run on the evicting thread,
//!   asynchronous ones on an executor. Listener panics are contained.
//! - **Pluggable time**: expiration runs on any [`Scheduler`]; the
//!   [`ManualScheduler`] makes tests deterministic.
//! - **Observability**: counters exposed through [`MetricsSnapshot`].
//!
//! # Example
//! ```
//! use expiring_map::ExpiringMap;
//! use std::time::Duration;
//!
//! let sessions: ExpiringMap<u64, String> = ExpiringMap::builder()
//!   .expiration(Duration::from_secs(300))
//!   .build()
//!   .unwrap();
//!
//! sessions.put(7, "alice".to_string());
//! assert_eq!(sessions.get(&7).as_deref().map(String::as_str), Some("alice"));
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;
pub mod policy;
pub mod runtime;
pub mod scheduler;

// Internal, crate-only modules
mod entry;
mod loader;
mod shared;
mod store;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::ExpiringMapBuilder;
pub use error::{BuildError, ListenerFailure, MapError};
pub use handles::ExpiringMap;
pub use listener::{ExpirationListener, FnListener, ListenerId};
pub use metrics::MetricsSnapshot;
pub use policy::{ExpirationPolicy, ExpiringValue};
pub use runtime::{Task, TaskExecutor};
pub use scheduler::{ManualScheduler, ScheduledTask, Scheduler, ThreadScheduler, TimerHandle};

#[cfg(feature = "tokio")]
pub use runtime::TokioExecutor;
