//! Identifier and timestamp sources used to stamp new records.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Produces a globally unique, opaque identifier per created record.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Produces millisecond timestamps that never decrease between calls.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Random v4 UUIDs in hyphenated form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Wall clock, clamped so a backwards step never yields an earlier stamp.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}
