//! Hashing for maps keyed by process-unique integer ids.

use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Draws a fresh id, unique for the lifetime of the process.
///
/// Topic and query ids share this counter, so an id never collides across kinds.
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// 2^64 divided by the golden ratio, rounded to odd.
const SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

/// Hasher for [TopicId](crate::TopicId) and [QueryId](crate::QueryId) keys.
///
/// Every id comes from [next_id], so two distinct keys never share an id and the id itself is
/// already a collision-free hash. All that is left to do is spread the small, sequential ids over
/// the high bits, which the table uses for its control bytes. A single multiply by an odd constant
/// is a bijection, so it keeps the ids collision-free.
#[derive(Default)]
pub struct IdHasher(u64);

impl Hasher for IdHasher {
    fn finish(&self) -> u64 {
        self.0.wrapping_mul(SPREAD)
    }

    fn write_u64(&mut self, id: u64) {
        self.0 = id;
    }

    // Only reached if an id type changes its representation.
    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = self.0.rotate_left(8) ^ u64::from(*byte);
        }
    }
}

#[derive(Copy, Clone, Default, Debug)]
pub struct IdHashBuilder;

impl BuildHasher for IdHashBuilder {
    type Hasher = IdHasher;

    fn build_hasher(&self) -> IdHasher {
        IdHasher::default()
    }
}
