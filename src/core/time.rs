//! Injectable clock and id generator.
//!
//! The snapshot builder, log writer, and proposal queue all need a notion of
//! "now" and a way to mint unique event ids, but the kernel itself must stay
//! deterministic and testable: `constructed_at` is part of the hashed
//! snapshot (spec I4), so tests need a clock that does not advance on its
//! own. `SystemClock`/`UlidGenerator` are the real implementations;
//! `FixedClock`/`FixedIdGenerator` back deterministic tests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use ulid::Ulid;

/// Supplies the current instant as an ISO-8601 string.
///
/// Implementations must be cheap and side-effect free beyond reading the
/// wall clock; the validation engine and DSL compiler never call this —
/// only the snapshot builder, log writer, and proposal queue do.
pub trait Clock: Send + Sync {
    /// Current instant, formatted as ISO-8601 (RFC 3339) with a `Z` suffix.
    fn now_iso8601(&self) -> String;
}

/// Mints globally unique event ids.
pub trait IdGenerator: Send + Sync {
    /// A fresh, unique id (a ULID in the real implementation).
    fn next_id(&self) -> String;
}

/// Real wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_iso8601(&self) -> String {
        Utc::now().to_rfc3339()
    }
}

/// Real ULID-backed id generator. ULIDs are lexicographically sortable and
/// unique under monotonic clocks, satisfying the per-project uniqueness
/// requirement on `event_id` (spec §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidGenerator;

impl IdGenerator for UlidGenerator {
    fn next_id(&self) -> String {
        Ulid::new().to_string()
    }
}

/// A clock pinned to a fixed instant, for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Build a fixed clock from an RFC-3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self {
            instant: DateTime::parse_from_rfc3339(s)
                .expect("valid RFC3339 fixture timestamp")
                .with_timezone(&Utc),
        }
    }

    /// Build a fixed clock at the Unix epoch.
    pub fn epoch() -> Self {
        Self {
            instant: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }
}

impl Clock for FixedClock {
    fn now_iso8601(&self) -> String {
        self.instant.to_rfc3339()
    }
}

/// A deterministic id generator for tests: a fixed seed followed by a
/// monotonically incrementing counter, so ids are unique within a test run
/// without depending on wall-clock entropy.
#[derive(Debug)]
pub struct FixedIdGenerator {
    seed: String,
    counter: AtomicU64,
}

impl FixedIdGenerator {
    /// Build a deterministic generator from a fixed seed prefix.
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for FixedIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{:026}", self.seed, n)
    }
}
