//! Suggestion acceptance and rejection.
//!
//! Acceptance validates everything first, then mutates: a chapter conflict
//! aborts the whole accept before any speaker is created or segment touched.
//! The caller owns the history transaction — when [`AcceptOutcome::mutated`]
//! is false there must be no push and no reference change.

use std::collections::HashSet;

use emend_document::{check_chapter_conflicts, Chapter, DocumentState};

use crate::error::Result;
use crate::suggestion::{Suggestion, SuggestionBody};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub applied: usize,
    pub mutated: bool,
}

/// Accept every pending suggestion in `target_keys` as one unit.
///
/// Unknown or stale keys are silently skipped. New speaker names required
/// across all accepted suggestions are deduplicated case-insensitively and
/// created up front, each taking the next palette color. Chapter proposals
/// are conflict-checked against the existing chapters before anything
/// mutates; an overlap rejects the whole call with zero mutation.
pub fn accept_many(
    document: &mut DocumentState,
    suggestions: &mut Vec<Suggestion>,
    target_keys: &[String],
) -> Result<AcceptOutcome> {
    let keys: HashSet<&str> = target_keys.iter().map(String::as_str).collect();
    let selected: Vec<Suggestion> = suggestions
        .iter()
        .filter(|s| s.is_pending() && keys.contains(s.target_key.as_str()))
        .cloned()
        .collect();
    if selected.is_empty() {
        return Ok(AcceptOutcome::default());
    }

    // Suggestions whose target vanished (or whose merge lost its successor)
    // are consumed without applying. They must not leak side effects either:
    // a stale speaker reassignment creates no speaker.
    let accepted: Vec<Suggestion> = selected
        .iter()
        .filter(|s| precondition_holds(document, s))
        .cloned()
        .collect();

    // Validation phase: nothing below may mutate until this passes.
    let incoming: Vec<Chapter> = accepted
        .iter()
        .filter_map(|s| match &s.body {
            SuggestionBody::Chapter { start_segment_id, end_segment_id, title, summary } => {
                Some(Chapter {
                    id: uuid::Uuid::new_v4().to_string(),
                    start_segment_id: start_segment_id.clone(),
                    end_segment_id: end_segment_id.clone(),
                    title: title.clone(),
                    summary: summary.clone(),
                    notes: None,
                    tag_ids: vec![],
                    segment_count: 0,
                })
            }
            _ => None,
        })
        .collect();
    let merged_chapters = if incoming.is_empty() {
        None
    } else {
        Some(check_chapter_conflicts(&document.chapters, &incoming, &document.segments)?)
    };

    // One pass over the accepted set to find speaker names that do not exist
    // yet, deduplicated case-insensitively so "c" and "C" yield one speaker.
    let mut new_names: Vec<String> = Vec::new();
    for suggestion in &accepted {
        if let SuggestionBody::Speaker { name, .. } = &suggestion.body {
            let known = document.find_speaker_by_name(name).is_some()
                || new_names.iter().any(|n| n.eq_ignore_ascii_case(name));
            if !known {
                new_names.push(name.clone());
            }
        }
    }

    // Mutation phase.
    for name in new_names {
        document.add_speaker(name);
    }

    let mut applied = 0;
    for suggestion in &accepted {
        let done = match &suggestion.body {
            SuggestionBody::Speaker { name, .. } => {
                document.set_segment_speaker(&suggestion.target_key, name.clone())
            }
            SuggestionBody::Revision { text } => {
                document.set_segment_text(&suggestion.target_key, text.clone())
            }
            SuggestionBody::Merge { into_next_of } => {
                document.merge_segment_into_next(into_next_of)
            }
            // Applied wholesale below.
            SuggestionBody::Chapter { .. } => true,
        };
        if done {
            applied += 1;
        }
    }
    if let Some(chapters) = merged_chapters {
        document.chapters = chapters;
    }

    suggestions.retain(|s| !(s.is_pending() && keys.contains(s.target_key.as_str())));
    tracing::debug!(applied, "suggestions accepted");
    Ok(AcceptOutcome { applied, mutated: applied > 0 })
}

fn precondition_holds(document: &DocumentState, suggestion: &Suggestion) -> bool {
    match &suggestion.body {
        SuggestionBody::Speaker { .. } | SuggestionBody::Revision { .. } => {
            document.segment(&suggestion.target_key).is_some()
        }
        SuggestionBody::Merge { into_next_of } => document
            .segment_index(into_next_of)
            .is_some_and(|idx| idx + 1 < document.segments.len()),
        // Endpoint existence is the conflict detector's concern; a dangling
        // endpoint aborts the whole accept rather than being skipped.
        SuggestionBody::Chapter { .. } => true,
    }
}

pub fn accept_one(
    document: &mut DocumentState,
    suggestions: &mut Vec<Suggestion>,
    target_key: &str,
) -> Result<AcceptOutcome> {
    accept_many(document, suggestions, &[target_key.to_string()])
}

/// Drop one pending suggestion. Suggestions are not document state, so this
/// never creates a history entry.
pub fn reject(suggestions: &mut Vec<Suggestion>, target_key: &str) -> bool {
    let before = suggestions.len();
    suggestions.retain(|s| !(s.is_pending() && s.target_key == target_key));
    suggestions.len() != before
}

pub fn reject_all(suggestions: &mut Vec<Suggestion>) {
    suggestions.retain(|s| !s.is_pending());
}
