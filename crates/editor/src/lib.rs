//! The editing surface a UI binds to.
//!
//! [`Editor`] is a cheap-to-clone handle over one shared [`EditorState`].
//! Selectors return cloned snapshots; actions mutate through the lock and
//! wrap each user-visible document change in exactly one history
//! transaction. Suggestion runs are spawned tokio tasks that re-enter the
//! same lock between batches.

mod state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use emend_assist::{
    accept_many, accept_one, cancel_run, reject, reject_all, start_run, AcceptOutcome,
    AssistContext, AssistFeature, AssistSnapshot, BatchItem, Collaborator, Error, Result,
};
use emend_document::{DocumentState, History};
use emend_session::{AssistConfig, GlobalConfig, NullScheduler, PersistScheduler};

pub use state::{AssistSet, EditorState};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Clone)]
pub struct Editor {
    shared: Arc<Mutex<EditorState>>,
    collaborators: Arc<HashMap<AssistFeature, Arc<dyn Collaborator>>>,
    scheduler: Arc<dyn PersistScheduler>,
}

impl Editor {
    pub fn builder() -> EditorBuilder {
        EditorBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the current document into the session cache and hand the
    /// derived snapshot to the persistence scheduler. Fire-and-forget; the
    /// scheduler owns throttling and coalescing.
    fn persist(&self, guard: &mut MutexGuard<'_, EditorState>) {
        let state = &mut **guard;
        state.sessions.store_current(&state.document, now_ms());
        let sessions = state.sessions.snapshot();
        let config = state.config.clone();
        self.scheduler.schedule(sessions, config);
    }

    /// Apply one document mutation as one history transaction. Nothing is
    /// pushed when the mutation reports no change.
    fn commit<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut DocumentState) -> bool,
    {
        let mut guard = self.lock();
        if !mutate(&mut guard.document) {
            return false;
        }
        let snapshot = guard.document.clone();
        guard.history.push(snapshot);
        self.persist(&mut guard);
        true
    }

    // ── selectors ────────────────────────────────────────────────────────

    pub fn document(&self) -> DocumentState {
        self.lock().document.clone()
    }

    pub fn assist(&self, feature: AssistFeature) -> AssistSnapshot {
        self.lock().assist.get(feature).snapshot()
    }

    /// Chapters in canonical display order (ascending start-segment index).
    pub fn chapters_in_order(&self) -> Vec<emend_document::Chapter> {
        let guard = self.lock();
        let mut chapters = guard.document.chapters.clone();
        emend_document::sort_chapters_by_start(&mut chapters, &guard.document.segments);
        chapters
    }

    pub fn config(&self) -> GlobalConfig {
        self.lock().config.clone()
    }

    pub fn can_undo(&self) -> bool {
        self.lock().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.lock().history.can_redo()
    }

    // ── document actions ─────────────────────────────────────────────────

    /// Replace the whole document (import). Resets history to one seeded
    /// entry.
    pub fn load_document(&self, document: DocumentState) {
        let mut guard = self.lock();
        guard.history.reset(document.clone());
        guard.document = document;
        self.persist(&mut guard);
    }

    pub fn set_segment_text(&self, id: &str, text: impl Into<String>) -> bool {
        let text = text.into();
        self.commit(|doc| doc.set_segment_text(id, text))
    }

    pub fn set_segment_speaker(&self, id: &str, speaker: impl Into<String>) -> bool {
        let speaker = speaker.into();
        self.commit(|doc| doc.set_segment_speaker(id, speaker))
    }

    pub fn set_segment_timing(&self, id: &str, start_ms: i64, end_ms: i64) -> bool {
        self.commit(|doc| doc.set_segment_timing(id, start_ms, end_ms))
    }

    pub fn toggle_confirmed(&self, id: &str) -> bool {
        self.commit(|doc| doc.toggle_confirmed(id))
    }

    pub fn toggle_bookmarked(&self, id: &str) -> bool {
        self.commit(|doc| doc.toggle_bookmarked(id))
    }

    pub fn set_segment_tags(&self, id: &str, tag_ids: Vec<String>) -> bool {
        self.commit(|doc| doc.set_segment_tags(id, tag_ids))
    }

    pub fn merge_segment_into_next(&self, id: &str) -> bool {
        self.commit(|doc| doc.merge_segment_into_next(id))
    }

    pub fn split_segment_at_word(&self, id: &str, word_index: usize) -> Option<String> {
        let mut split_id = None;
        self.commit(|doc| {
            split_id = doc.split_segment_at_word(id, word_index);
            split_id.is_some()
        });
        split_id
    }

    pub fn delete_segment(&self, id: &str) -> bool {
        self.commit(|doc| doc.delete_segment(id))
    }

    /// Create a speaker and reassign the given segments to it, as a single
    /// history transaction.
    pub fn add_speaker(&self, name: impl Into<String>, segment_ids: &[String]) -> String {
        let name = name.into();
        let mut speaker_id = String::new();
        self.commit(|doc| {
            speaker_id = doc.add_speaker(name.clone());
            for id in segment_ids {
                doc.set_segment_speaker(id, name.clone());
            }
            true
        });
        speaker_id
    }

    pub fn rename_speaker(&self, id: &str, new_name: impl Into<String>) -> bool {
        let new_name = new_name.into();
        self.commit(|doc| doc.rename_speaker(id, new_name))
    }

    pub fn add_tag(&self, name: impl Into<String>, color: impl Into<String>) -> String {
        let (name, color) = (name.into(), color.into());
        let mut tag_id = String::new();
        self.commit(|doc| {
            tag_id = doc.add_tag(name, color);
            true
        });
        tag_id
    }

    pub fn remove_tag(&self, id: &str) -> bool {
        self.commit(|doc| doc.remove_tag(id))
    }

    pub fn remove_chapter(&self, id: &str) -> bool {
        self.commit(|doc| doc.remove_chapter(id))
    }

    pub fn set_chapter_meta(
        &self,
        id: &str,
        title: Option<String>,
        summary: Option<String>,
        notes: Option<String>,
    ) -> bool {
        self.commit(|doc| doc.set_chapter_meta(id, title, summary, notes))
    }

    /// Selection and playhead moves are not document mutations: they update
    /// the live state and the session cache, but never push history.
    pub fn select_segment(&self, id: &str) -> bool {
        let mut guard = self.lock();
        let changed = guard.document.select_segment(id);
        if changed {
            self.persist(&mut guard);
        }
        changed
    }

    pub fn select_chapter(&self, id: &str) -> bool {
        let mut guard = self.lock();
        let changed = guard.document.select_chapter(id);
        if changed {
            self.persist(&mut guard);
        }
        changed
    }

    pub fn set_current_time(&self, ms: i64) {
        let mut guard = self.lock();
        guard.document.set_current_time(ms);
        self.persist(&mut guard);
    }

    // ── history ──────────────────────────────────────────────────────────

    pub fn undo(&self) -> bool {
        self.step_history(|history| history.undo().cloned())
    }

    pub fn redo(&self) -> bool {
        self.step_history(|history| history.redo().cloned())
    }

    fn step_history<F>(&self, step: F) -> bool
    where
        F: FnOnce(&mut History) -> Option<DocumentState>,
    {
        let mut guard = self.lock();
        let Some(mut restored) = step(&mut guard.history) else {
            return false;
        };
        // A restored entry without a selection keeps the one the user had.
        if restored.selected_segment_id.is_none() {
            restored.selected_segment_id = guard.document.selected_segment_id.clone();
        }
        if restored.selected_chapter_id.is_none() {
            restored.selected_chapter_id = guard.document.selected_chapter_id.clone();
        }
        guard.document = restored;
        self.persist(&mut guard);
        true
    }

    // ── sessions ─────────────────────────────────────────────────────────

    /// Switch to the session cached under `key`. The current document is
    /// written back to its own session first so nothing is lost. No-op when
    /// the key is unknown.
    pub fn activate_session(&self, key: &str) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.sessions.store_current(&state.document, now_ms());
        let Some(document) = state.sessions.activate(key) else {
            return false;
        };
        state.history.reset(document.clone());
        state.document = document;
        tracing::debug!(key, "switched session");
        self.persist(&mut guard);
        true
    }

    pub fn set_audio_ref(&self, audio_ref: impl Into<String>) {
        self.switch_ref(|state, now| {
            let current = state.document.clone();
            state.sessions.set_audio_ref(audio_ref, &current, now)
        });
    }

    pub fn set_transcript_ref(&self, transcript_ref: impl Into<String>) {
        self.switch_ref(|state, now| {
            let current = state.document.clone();
            state.sessions.set_transcript_ref(transcript_ref, &current, now)
        });
    }

    fn switch_ref<F>(&self, update: F)
    where
        F: FnOnce(&mut EditorState, i64) -> Option<DocumentState>,
    {
        let mut guard = self.lock();
        if let Some(document) = update(&mut *guard, now_ms()) {
            guard.history.reset(document.clone());
            guard.document = document;
        }
        self.persist(&mut guard);
    }

    // ── assist ───────────────────────────────────────────────────────────

    /// Start a suggestion run. `scope` narrows the target set to explicit
    /// segment ids; `None` targets every eligible segment. A still-active
    /// run for the same feature is superseded.
    pub fn start_assist(
        &self,
        feature: AssistFeature,
        scope: Option<&[String]>,
    ) -> Result<tokio::task::JoinHandle<()>> {
        let collaborator = self
            .collaborators
            .get(&feature)
            .cloned()
            .ok_or(Error::NoCollaborator(feature))?;

        let (targets, ctx, batch_size) = {
            let guard = self.lock();
            let cfg = feature_config(&guard.config, feature);
            let targets = build_targets(&guard.document, feature, scope);
            let ctx = AssistContext {
                feature,
                prompt: cfg.prompt.clone(),
                extra: serde_json::Value::Null,
            };
            (targets, ctx, cfg.batch_size)
        };

        start_run(
            &self.shared,
            move |state| state.assist.get_mut(feature),
            feature,
            targets,
            ctx,
            batch_size,
            collaborator,
        )
    }

    pub fn cancel_assist(&self, feature: AssistFeature) {
        cancel_run(&self.shared, move |state| state.assist.get_mut(feature));
    }

    pub fn accept_one(&self, feature: AssistFeature, target_key: &str) -> Result<AcceptOutcome> {
        self.accept(feature, |document, suggestions| {
            accept_one(document, suggestions, target_key)
        })
    }

    pub fn accept_many(
        &self,
        feature: AssistFeature,
        target_keys: &[String],
    ) -> Result<AcceptOutcome> {
        self.accept(feature, |document, suggestions| {
            accept_many(document, suggestions, target_keys)
        })
    }

    fn accept<F>(&self, feature: AssistFeature, apply: F) -> Result<AcceptOutcome>
    where
        F: FnOnce(
            &mut DocumentState,
            &mut Vec<emend_assist::Suggestion>,
        ) -> Result<AcceptOutcome>,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        let suggestions = &mut state.assist.get_mut(feature).suggestions;
        let outcome = apply(&mut state.document, suggestions)?;
        if outcome.mutated {
            let snapshot = state.document.clone();
            state.history.push(snapshot);
            self.persist(&mut guard);
        }
        Ok(outcome)
    }

    pub fn reject(&self, feature: AssistFeature, target_key: &str) -> bool {
        let mut guard = self.lock();
        reject(&mut guard.assist.get_mut(feature).suggestions, target_key)
    }

    pub fn reject_all(&self, feature: AssistFeature) {
        let mut guard = self.lock();
        reject_all(&mut guard.assist.get_mut(feature).suggestions);
    }
}

fn feature_config(config: &GlobalConfig, feature: AssistFeature) -> &AssistConfig {
    match feature {
        AssistFeature::SpeakerClassification => &config.speaker,
        AssistFeature::TextRevision => &config.revision,
        AssistFeature::ChapterDetection => &config.chapter,
        AssistFeature::MergeDetection => &config.merge,
    }
}

/// Map eligible segments to batch items. Merge detection skips the final
/// segment, which has no successor to merge into.
fn build_targets(
    document: &DocumentState,
    feature: AssistFeature,
    scope: Option<&[String]>,
) -> Vec<BatchItem> {
    let last_id = document.segments.last().map(|s| s.id.as_str());
    document
        .segments
        .iter()
        .filter(|seg| match scope {
            Some(ids) => ids.iter().any(|id| *id == seg.id),
            None => true,
        })
        .filter(|seg| {
            feature != AssistFeature::MergeDetection || Some(seg.id.as_str()) != last_id
        })
        .map(|seg| BatchItem {
            target_key: seg.id.clone(),
            payload: serde_json::json!({
                "text": seg.text,
                "speaker": seg.speaker,
                "start_ms": seg.start_ms,
                "end_ms": seg.end_ms,
            }),
        })
        .collect()
}

#[derive(Default)]
pub struct EditorBuilder {
    collaborators: HashMap<AssistFeature, Arc<dyn Collaborator>>,
    scheduler: Option<Arc<dyn PersistScheduler>>,
    config: GlobalConfig,
    history_limit: Option<usize>,
}

impl EditorBuilder {
    pub fn collaborator(
        mut self,
        feature: AssistFeature,
        collaborator: Arc<dyn Collaborator>,
    ) -> Self {
        self.collaborators.insert(feature, collaborator);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn PersistScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn config(mut self, config: GlobalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn build(self) -> Editor {
        let history = match self.history_limit {
            Some(limit) => History::with_capacity(DocumentState::default(), limit),
            None => History::new(DocumentState::default()),
        };
        let state = EditorState {
            history,
            config: self.config,
            ..EditorState::default()
        };
        Editor {
            shared: Arc::new(Mutex::new(state)),
            collaborators: Arc::new(self.collaborators),
            scheduler: self.scheduler.unwrap_or_else(|| Arc::new(NullScheduler)),
        }
    }
}
