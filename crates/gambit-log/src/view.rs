//! The read-only linearized view handed to `apply` and to readers.

use crate::entry::LinearizedEntry;
use parking_lot::RwLock;
use std::sync::Arc;

/// A snapshot-consistent, linearized view over every authorized writer's
/// entries, kept sorted by [`LinearizedEntry`]'s total order.
///
/// Cloning a `View` is cheap — it shares the same backing list, so a clone
/// taken before a later `append` does not retroactively see that append.
#[derive(Clone, Default)]
pub struct View {
    entries: Arc<RwLock<Vec<LinearizedEntry>>>,
}

impl View {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, entry: LinearizedEntry) {
        let mut entries = self.entries.write();
        let idx = entries.partition_point(|e| e < &entry);
        entries.insert(idx, entry);
    }

    /// The number of linearized entries currently known.
    #[must_use]
    pub fn length(&self) -> usize {
        self.entries.read().len()
    }

    /// The entry at linearized position `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<LinearizedEntry> {
        self.entries.read().get(index).cloned()
    }

    /// Every linearized entry, oldest first. Intended for full-history
    /// sync replies; clones the whole backing vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<LinearizedEntry> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_identity::Keypair;
    use gambit_types::{GameId, Move, PlayerColor};

    fn entry(writer_id: gambit_identity::PublicKey, index: u64, timestamp: u64) -> LinearizedEntry {
        let game_id = GameId::from_bytes(&[1u8; 32]).unwrap();
        LinearizedEntry {
            writer_id,
            writer_index: index,
            timestamp,
            value: Move {
                timestamp,
                player: PlayerColor::White,
                from: "e2".into(),
                to: "e4".into(),
                piece: 'p',
                captured: None,
                promotion: None,
                check: false,
                checkmate: false,
                fen: "fen".into(),
                san: "e4".into(),
                game_id,
            },
        }
    }

    #[test]
    fn insert_keeps_entries_in_linearized_order() {
        let view = View::new();
        let w = Keypair::generate().public_key();
        view.insert(entry(w, 1, 200));
        view.insert(entry(w, 0, 100));
        assert_eq!(view.length(), 2);
        assert_eq!(view.get(0).unwrap().timestamp, 100);
        assert_eq!(view.get(1).unwrap().timestamp, 200);
    }

    #[test]
    fn get_out_of_range_is_none() {
        let view = View::new();
        assert!(view.get(0).is_none());
    }
}
