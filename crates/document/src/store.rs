//! Synchronous mutations on [`DocumentState`].
//!
//! Every entry point fails closed: a mutation targeting an id that no longer
//! exists is a silent no-op, reported through the `bool` return. This keeps
//! the surface robust to races between arriving suggestions and concurrent
//! deletes — the caller never has to pre-check existence.
//!
//! The store knows nothing about history. The editor layer wraps each
//! user-visible operation in exactly one history transaction.

use crate::palette::speaker_color;
use crate::types::{Chapter, DocumentState, Segment, Speaker, Tag};

impl DocumentState {
    pub fn segment_index(&self, id: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }

    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    fn segment_mut(&mut self, id: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.id == id)
    }

    // ── segment mutations ────────────────────────────────────────────────

    pub fn set_segment_text(&mut self, id: &str, text: impl Into<String>) -> bool {
        match self.segment_mut(id) {
            Some(seg) => {
                seg.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_segment_speaker(&mut self, id: &str, speaker: impl Into<String>) -> bool {
        match self.segment_mut(id) {
            Some(seg) => {
                seg.speaker = speaker.into();
                true
            }
            None => false,
        }
    }

    /// No-op unless `start_ms < end_ms`.
    pub fn set_segment_timing(&mut self, id: &str, start_ms: i64, end_ms: i64) -> bool {
        if start_ms >= end_ms {
            return false;
        }
        match self.segment_mut(id) {
            Some(seg) => {
                seg.start_ms = start_ms;
                seg.end_ms = end_ms;
                true
            }
            None => false,
        }
    }

    pub fn toggle_confirmed(&mut self, id: &str) -> bool {
        match self.segment_mut(id) {
            Some(seg) => {
                seg.confirmed = !seg.confirmed;
                true
            }
            None => false,
        }
    }

    pub fn toggle_bookmarked(&mut self, id: &str) -> bool {
        match self.segment_mut(id) {
            Some(seg) => {
                seg.bookmarked = !seg.bookmarked;
                true
            }
            None => false,
        }
    }

    pub fn set_segment_tags(&mut self, id: &str, tag_ids: Vec<String>) -> bool {
        match self.segment_mut(id) {
            Some(seg) => {
                seg.tag_ids = tag_ids;
                true
            }
            None => false,
        }
    }

    /// Merge a segment with its immediate successor.
    ///
    /// The left segment keeps its id and speaker; text is joined with a
    /// single space, words are concatenated, and the end time extends to the
    /// successor's. Chapter endpoints referencing the removed segment are
    /// remapped to the surviving one so the chapter invariant holds.
    pub fn merge_segment_into_next(&mut self, id: &str) -> bool {
        let Some(idx) = self.segment_index(id) else {
            return false;
        };
        if idx + 1 >= self.segments.len() {
            return false;
        }

        let next = self.segments.remove(idx + 1);
        let left = &mut self.segments[idx];
        if !next.text.is_empty() {
            if !left.text.is_empty() {
                left.text.push(' ');
            }
            left.text.push_str(next.text.trim_start());
        }
        left.words.extend(next.words);
        left.end_ms = left.end_ms.max(next.end_ms);
        let left_id = left.id.clone();

        for chapter in &mut self.chapters {
            if chapter.start_segment_id == next.id {
                chapter.start_segment_id = left_id.clone();
            }
            if chapter.end_segment_id == next.id {
                chapter.end_segment_id = left_id.clone();
            }
        }
        if self.selected_segment_id.as_deref() == Some(next.id.as_str()) {
            self.selected_segment_id = Some(left_id);
        }
        self.coalesce_overlapping_chapters();
        true
    }

    /// Remapping endpoints after a merge can leave two chapters covering
    /// intersecting segment ranges. Fold each such pair into the earlier
    /// chapter, spanning the union, so the no-overlap invariant holds at all
    /// times.
    fn coalesce_overlapping_chapters(&mut self) {
        let chapters = std::mem::take(&mut self.chapters);
        let mut ranged: Vec<(usize, usize, Chapter)> = Vec::with_capacity(chapters.len());
        let mut unresolved: Vec<Chapter> = Vec::new();
        for chapter in chapters {
            let start = self.segment_index(&chapter.start_segment_id);
            let end = self.segment_index(&chapter.end_segment_id);
            match (start, end) {
                (Some(start), Some(end)) => {
                    let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                    ranged.push((lo, hi, chapter));
                }
                _ => unresolved.push(chapter),
            }
        }

        ranged.sort_by_key(|&(lo, hi, _)| (lo, hi));
        let mut folded: Vec<(usize, usize, Chapter)> = Vec::with_capacity(ranged.len());
        for (lo, hi, mut chapter) in ranged {
            match folded.last_mut() {
                Some((prev_lo, prev_hi, prev)) if lo <= *prev_hi => {
                    if hi > *prev_hi {
                        *prev_hi = hi;
                        prev.end_segment_id = self.segments[hi].id.clone();
                    }
                    prev.segment_count = *prev_hi - *prev_lo + 1;
                }
                _ => {
                    chapter.segment_count = hi - lo + 1;
                    folded.push((lo, hi, chapter));
                }
            }
        }

        self.chapters = folded.into_iter().map(|(_, _, c)| c).collect();
        self.chapters.extend(unresolved);
        if let Some(id) = self.selected_chapter_id.clone() {
            if !self.chapters.iter().any(|c| c.id == id) {
                self.selected_chapter_id = None;
            }
        }
    }

    /// Split a segment before `word_index`. Both halves keep the speaker;
    /// the right half gets a fresh id. No-op when the index is not an
    /// interior word boundary.
    pub fn split_segment_at_word(&mut self, id: &str, word_index: usize) -> Option<String> {
        let idx = self.segment_index(id)?;
        let seg = &mut self.segments[idx];
        if word_index == 0 || word_index >= seg.words.len() {
            return None;
        }

        let right_words = seg.words.split_off(word_index);
        let right_start = right_words.first().map(|w| w.start_ms)?;
        let mut right = Segment::new(
            seg.speaker.clone(),
            right_start,
            seg.end_ms,
            right_words
                .iter()
                .map(|w| w.text.trim())
                .collect::<Vec<_>>()
                .join(" "),
        );
        right.words = right_words;
        right.tag_ids = seg.tag_ids.clone();

        seg.end_ms = seg.words.last().map(|w| w.end_ms).unwrap_or(seg.start_ms);
        seg.text = seg
            .words
            .iter()
            .map(|w| w.text.trim())
            .collect::<Vec<_>>()
            .join(" ");

        let right_id = right.id.clone();
        self.segments.insert(idx + 1, right);
        Some(right_id)
    }

    /// Delete a segment. Chapters left with a dangling endpoint are removed
    /// with it; the selection falls back to the first remaining segment.
    pub fn delete_segment(&mut self, id: &str) -> bool {
        let Some(idx) = self.segment_index(id) else {
            return false;
        };
        self.segments.remove(idx);
        self.chapters
            .retain(|c| c.start_segment_id != id && c.end_segment_id != id);
        if self.selected_segment_id.as_deref() == Some(id) {
            self.selected_segment_id = self.segments.first().map(|s| s.id.clone());
        }
        true
    }

    // ── speakers ─────────────────────────────────────────────────────────

    /// Case-insensitive lookup; the acceptance path uses this to avoid
    /// creating duplicate speakers.
    pub fn find_speaker_by_name(&self, name: &str) -> Option<&Speaker> {
        self.speakers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Create a speaker, assigning the next palette color by creation index.
    /// Does not check name uniqueness — that is the acceptance path's job.
    pub fn add_speaker(&mut self, name: impl Into<String>) -> String {
        let speaker = Speaker {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            color: speaker_color(self.speakers.len()).to_string(),
        };
        let id = speaker.id.clone();
        self.speakers.push(speaker);
        id
    }

    /// Rename a speaker and propagate the new name to segments attributed to
    /// it. Uniqueness is intentionally not enforced here.
    pub fn rename_speaker(&mut self, id: &str, new_name: impl Into<String>) -> bool {
        let new_name = new_name.into();
        let Some(speaker) = self.speakers.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        let old_name = std::mem::replace(&mut speaker.name, new_name.clone());
        for seg in &mut self.segments {
            if seg.speaker == old_name {
                seg.speaker = new_name.clone();
            }
        }
        true
    }

    // ── tags ─────────────────────────────────────────────────────────────

    pub fn add_tag(&mut self, name: impl Into<String>, color: impl Into<String>) -> String {
        let tag = Tag {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            color: color.into(),
        };
        let id = tag.id.clone();
        self.tags.push(tag);
        id
    }

    /// Remove a tag and detach its id from all segments and chapters.
    pub fn remove_tag(&mut self, id: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.id != id);
        if self.tags.len() == before {
            return false;
        }
        for seg in &mut self.segments {
            seg.tag_ids.retain(|t| t != id);
        }
        for chapter in &mut self.chapters {
            chapter.tag_ids.retain(|t| t != id);
        }
        true
    }

    // ── chapters ─────────────────────────────────────────────────────────

    /// Append chapters. Callers must have run these through
    /// [`crate::check_chapter_conflicts`] first; the store itself does not
    /// re-validate.
    pub fn add_chapters(&mut self, chapters: Vec<Chapter>) {
        self.chapters.extend(chapters);
    }

    pub fn remove_chapter(&mut self, id: &str) -> bool {
        let before = self.chapters.len();
        self.chapters.retain(|c| c.id != id);
        if self.selected_chapter_id.as_deref() == Some(id) {
            self.selected_chapter_id = None;
        }
        self.chapters.len() != before
    }

    /// Update chapter metadata. `None` leaves a field unchanged.
    pub fn set_chapter_meta(
        &mut self,
        id: &str,
        title: Option<String>,
        summary: Option<String>,
        notes: Option<String>,
    ) -> bool {
        match self.chapters.iter_mut().find(|c| c.id == id) {
            Some(chapter) => {
                if let Some(title) = title {
                    chapter.title = title;
                }
                if summary.is_some() {
                    chapter.summary = summary;
                }
                if notes.is_some() {
                    chapter.notes = notes;
                }
                true
            }
            None => false,
        }
    }

    // ── selection / playhead ─────────────────────────────────────────────

    pub fn select_segment(&mut self, id: &str) -> bool {
        if self.segment(id).is_some() {
            self.selected_segment_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn select_chapter(&mut self, id: &str) -> bool {
        if self.chapters.iter().any(|c| c.id == id) {
            self.selected_chapter_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn set_current_time(&mut self, ms: i64) {
        self.current_time_ms = ms;
    }
}
