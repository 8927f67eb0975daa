use emend_assist::{AssistFeature, AssistState};
use emend_document::{DocumentState, History};
use emend_session::{GlobalConfig, SessionManager};

/// One orchestrator state per feature. Features run and fail independently;
/// nothing here is shared between them.
#[derive(Debug, Default)]
pub struct AssistSet {
    speaker: AssistState,
    revision: AssistState,
    chapter: AssistState,
    merge: AssistState,
}

impl AssistSet {
    pub fn get(&self, feature: AssistFeature) -> &AssistState {
        match feature {
            AssistFeature::SpeakerClassification => &self.speaker,
            AssistFeature::TextRevision => &self.revision,
            AssistFeature::ChapterDetection => &self.chapter,
            AssistFeature::MergeDetection => &self.merge,
        }
    }

    pub fn get_mut(&mut self, feature: AssistFeature) -> &mut AssistState {
        match feature {
            AssistFeature::SpeakerClassification => &mut self.speaker,
            AssistFeature::TextRevision => &mut self.revision,
            AssistFeature::ChapterDetection => &mut self.chapter,
            AssistFeature::MergeDetection => &mut self.merge,
        }
    }
}

/// Everything behind the editor's single lock: the canonical document, its
/// undo/redo history, the session cache, persisted config, and the four
/// per-feature assist states. All mutations are synchronous and indivisible
/// while the lock is held; the only suspension points are the collaborator
/// calls between lock acquisitions.
#[derive(Debug)]
pub struct EditorState {
    pub document: DocumentState,
    pub history: History,
    pub sessions: SessionManager,
    pub config: GlobalConfig,
    pub assist: AssistSet,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            document: DocumentState::default(),
            history: History::new(DocumentState::default()),
            sessions: SessionManager::new(),
            config: GlobalConfig::default(),
            assist: AssistSet::default(),
        }
    }
}
