//! Append-only, index-pointered, length-bounded log of whole-document
//! snapshots. Pushing while undone truncates the redo branch; once the log
//! reaches its cap the oldest entry is evicted.
//!
//! Value-equal consecutive entries are intentionally not deduplicated: a
//! no-op edit still creates an undo step.

use crate::types::DocumentState;

pub const DEFAULT_MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<DocumentState>,
    index: usize,
    max_entries: usize,
}

impl History {
    /// A history always holds at least one entry: the seed snapshot.
    pub fn new(seed: DocumentState) -> Self {
        Self::with_capacity(seed, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(seed: DocumentState, max_entries: usize) -> Self {
        Self {
            entries: vec![seed],
            index: 0,
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Truncate any redo branch past the pointer, append, then trim to the
    /// cap by evicting the oldest entry.
    pub fn push(&mut self, entry: DocumentState) {
        self.entries.truncate(self.index + 1);
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
        self.index = self.entries.len() - 1;
    }

    /// Step back one entry and return the snapshot to restore, or `None`
    /// when already at the oldest entry.
    pub fn undo(&mut self) -> Option<&DocumentState> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    pub fn redo(&mut self) -> Option<&DocumentState> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }

    /// Reset to a single seeded entry. Used when switching sessions.
    pub fn reset(&mut self, seed: DocumentState) {
        self.entries = vec![seed];
        self.index = 0;
    }

    pub fn current(&self) -> &DocumentState {
        &self.entries[self.index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn doc(n: usize) -> DocumentState {
        let mut d = DocumentState::default();
        for i in 0..n {
            d.segments
                .push(Segment::new("A", i as i64 * 100, i as i64 * 100 + 100, format!("s{i}")));
        }
        d
    }

    #[test]
    fn undo_redo_round_trip_restores_exact_state() {
        let mut h = History::new(doc(0));
        let states: Vec<_> = (1..=5).map(doc).collect();
        for s in &states {
            h.push(s.clone());
        }

        for _ in 0..5 {
            assert!(h.undo().is_some());
        }
        assert!(h.undo().is_none());
        for _ in 0..5 {
            assert!(h.redo().is_some());
        }
        assert!(h.redo().is_none());
        assert_eq!(h.current(), states.last().unwrap());
    }

    #[test]
    fn push_truncates_redo_branch() {
        let mut h = History::new(doc(0));
        h.push(doc(1));
        h.push(doc(2));
        h.undo();
        h.push(doc(3));

        assert!(!h.can_redo());
        assert_eq!(h.current(), &doc(3));
        h.undo();
        assert_eq!(h.current().segments.len(), 1);
    }

    #[test]
    fn length_never_exceeds_cap_and_oldest_is_evicted() {
        let mut h = History::with_capacity(doc(0), 3);
        for i in 1..=10 {
            h.push(doc(i));
            assert!(h.len() <= 3);
        }
        // Oldest surviving entry is 8, not 0.
        while h.undo().is_some() {}
        assert_eq!(h.current().segments.len(), 8);
    }

    #[test]
    fn value_equal_consecutive_pushes_are_kept() {
        let mut h = History::new(doc(1));
        h.push(doc(1));
        assert_eq!(h.len(), 2);
        assert!(h.can_undo());
    }
}
