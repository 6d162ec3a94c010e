use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the map.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) loads: CachePadded<AtomicU64>,

  // --- Throughput ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) updates: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,
  pub(crate) resets: CachePadded<AtomicU64>,

  // --- Expiration ---
  pub(crate) expirations: CachePadded<AtomicU64>,
  pub(crate) timers_armed: CachePadded<AtomicU64>,
  pub(crate) listener_failures: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      updates: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      resets: CachePadded::new(AtomicU64::new(0)),
      expirations: CachePadded::new(AtomicU64::new(0)),
      timers_armed: CachePadded::new(AtomicU64::new(0)),
      listener_failures: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      loads: self.loads.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      updates: self.updates.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      resets: self.resets.load(Ordering::Relaxed),
      expirations: self.expirations.load(Ordering::Relaxed),
      timers_armed: self.timers_armed.load(Ordering::Relaxed),
      listener_failures: self.listener_failures.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the map's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups that found a live entry.
  pub hits: u64,
  /// Lookups that found nothing (before any loader ran).
  pub misses: u64,
  /// The hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Values produced by the entry loader.
  pub loads: u64,
  /// New entries created.
  pub inserts: u64,
  /// Existing entries whose value was replaced.
  pub updates: u64,
  /// Explicit removals.
  pub removals: u64,
  /// Expiration countdowns restarted (access resets, explicit resets and
  /// per-entry setting changes).
  pub resets: u64,
  /// Entries removed because they expired.
  pub expirations: u64,
  /// Expiration timers handed to the scheduler.
  pub timers_armed: u64,
  /// Expiration listener calls that panicked.
  pub listener_failures: u64,
  /// The number of seconds the map has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("loads", &self.loads)
      .field("inserts", &self.inserts)
      .field("updates", &self.updates)
      .field("removals", &self.removals)
      .field("resets", &self.resets)
      .field("expirations", &self.expirations)
      .field("timers_armed", &self.timers_armed)
      .field("listener_failures", &self.listener_failures)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
