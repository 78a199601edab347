//! A single linearized log entry.

use gambit_identity::PublicKey;
use gambit_types::Move;

/// One move, tagged with the writer that produced it and its position in
/// that writer's own append sequence.
///
/// Linearized ordering across writers is `timestamp` ascending, tied broken
/// by `writer_id` byte-lexicographic order (see
/// `gambit_identity::PublicKey`'s `Ord` impl), then `writer_index` for
/// entries from the same writer at the same timestamp (impossible in
/// practice since a writer's own clock is monotonic, but kept for a total
/// order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearizedEntry {
    /// The writer that appended this entry.
    pub writer_id: PublicKey,
    /// This entry's position within `writer_id`'s own file.
    pub writer_index: u64,
    /// Unix ms timestamp, duplicated from `value` for fast ordering.
    pub timestamp: u64,
    /// The move itself.
    pub value: Move,
}

impl LinearizedEntry {
    pub(crate) fn sort_key(&self) -> (u64, [u8; 32], u64) {
        (self.timestamp, *self.writer_id.as_bytes(), self.writer_index)
    }
}

impl PartialOrd for LinearizedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LinearizedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
