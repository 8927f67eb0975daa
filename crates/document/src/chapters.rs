//! Chapter structural invariants.
//!
//! Chapters reference segments by id and cover a contiguous index range; no
//! two ranges may intersect. Every multi-chapter commit goes through
//! [`check_chapter_conflicts`] first, and on failure the caller applies no
//! partial mutation.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Chapter, Segment};

/// Validate `existing + incoming` against the segment list.
///
/// Each chapter's `segment_count` is recomputed from its endpoint indices,
/// so a stale stored count cannot mask an overlap. A chapter referencing a
/// missing segment is itself a conflict. On success, returns the merged set
/// with fresh counts, sorted by start index — ready to commit as-is.
pub fn check_chapter_conflicts(
    existing: &[Chapter],
    incoming: &[Chapter],
    segments: &[Segment],
) -> Result<Vec<Chapter>> {
    let index_of: HashMap<&str, usize> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut ranged: Vec<(usize, usize, Chapter)> = Vec::with_capacity(existing.len() + incoming.len());
    for chapter in existing.iter().chain(incoming) {
        let start = index_of
            .get(chapter.start_segment_id.as_str())
            .copied()
            .ok_or_else(|| Error::ChapterDanglingSegment(chapter.title.clone()))?;
        let end = index_of
            .get(chapter.end_segment_id.as_str())
            .copied()
            .ok_or_else(|| Error::ChapterDanglingSegment(chapter.title.clone()))?;
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };

        let mut chapter = chapter.clone();
        chapter.segment_count = hi - lo + 1;
        ranged.push((lo, hi, chapter));
    }

    ranged.sort_by_key(|&(lo, hi, _)| (lo, hi));
    for pair in ranged.windows(2) {
        let (_, prev_hi, ref prev) = pair[0];
        let (next_lo, _, ref next) = pair[1];
        if next_lo <= prev_hi {
            return Err(Error::ChapterOverlap(prev.title.clone(), next.title.clone()));
        }
    }

    Ok(ranged.into_iter().map(|(_, _, c)| c).collect())
}

/// Canonical display order: ascending start-segment index. Chapters whose
/// start segment is gone sort last, keeping their relative order.
pub fn sort_chapters_by_start(chapters: &mut [Chapter], segments: &[Segment]) {
    let index_of: HashMap<&str, usize> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    chapters.sort_by_key(|c| {
        index_of
            .get(c.start_segment_id.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
}
