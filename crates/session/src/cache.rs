//! Session cache: one independently cached document per (audio, transcript)
//! identity pair. Switching identities swaps the in-memory document; the
//! history reset is the editor layer's job.

use std::collections::HashMap;

use emend_document::DocumentState;

use crate::key::session_key;
use crate::persist::SessionCacheSnapshot;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SessionRecord {
    pub audio_ref: String,
    pub transcript_ref: String,
    pub document: DocumentState,
    pub saved_at_ms: i64,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    cache: HashMap<String, SessionRecord>,
    audio_ref: Option<String>,
    transcript_ref: Option<String>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audio_ref(&self) -> Option<&str> {
        self.audio_ref.as_deref()
    }

    pub fn transcript_ref(&self) -> Option<&str> {
        self.transcript_ref.as_deref()
    }

    pub fn current_key(&self) -> String {
        session_key(
            self.audio_ref.as_deref().unwrap_or(""),
            self.transcript_ref.as_deref().unwrap_or(""),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Restore the document cached under `key`. No-op (`None`) when the key
    /// is unknown. A cached selection pointing at a segment that no longer
    /// exists falls back to the first segment.
    pub fn activate(&mut self, key: &str) -> Option<DocumentState> {
        let record = self.cache.get(key)?;
        self.audio_ref = Some(record.audio_ref.clone());
        self.transcript_ref = Some(record.transcript_ref.clone());
        let mut document = record.document.clone();
        resolve_selection(&mut document);
        tracing::debug!(key, segments = document.segments.len(), "session activated");
        Some(document)
    }

    /// Update one half of the identity pair.
    ///
    /// If no session exists at the recomputed key and the in-memory document
    /// is non-empty, the current document is promoted into the cache under
    /// the new key first — changing only one half of the pair must not
    /// silently drop unsaved state. Returns the document to swap in, or
    /// `None` when there is nothing cached at the new key.
    pub fn set_audio_ref(
        &mut self,
        audio_ref: impl Into<String>,
        current: &DocumentState,
        now_ms: i64,
    ) -> Option<DocumentState> {
        self.audio_ref = Some(audio_ref.into());
        self.switch_identity(current, now_ms)
    }

    pub fn set_transcript_ref(
        &mut self,
        transcript_ref: impl Into<String>,
        current: &DocumentState,
        now_ms: i64,
    ) -> Option<DocumentState> {
        self.transcript_ref = Some(transcript_ref.into());
        self.switch_identity(current, now_ms)
    }

    fn switch_identity(&mut self, current: &DocumentState, now_ms: i64) -> Option<DocumentState> {
        let key = self.current_key();
        if !self.cache.contains_key(&key) && !current.is_empty() {
            self.cache.insert(
                key.clone(),
                SessionRecord {
                    audio_ref: self.audio_ref.clone().unwrap_or_default(),
                    transcript_ref: self.transcript_ref.clone().unwrap_or_default(),
                    document: current.clone(),
                    saved_at_ms: now_ms,
                },
            );
            tracing::debug!(key, "promoted in-memory document into session cache");
        }
        self.activate(&key)
    }

    /// Write the current document back into the cache under the current
    /// identity. No-op until at least one half of the pair is set.
    pub fn store_current(&mut self, document: &DocumentState, now_ms: i64) {
        if self.audio_ref.is_none() && self.transcript_ref.is_none() {
            return;
        }
        let key = self.current_key();
        self.cache.insert(
            key,
            SessionRecord {
                audio_ref: self.audio_ref.clone().unwrap_or_default(),
                transcript_ref: self.transcript_ref.clone().unwrap_or_default(),
                document: document.clone(),
                saved_at_ms: now_ms,
            },
        );
    }

    pub fn snapshot(&self) -> SessionCacheSnapshot {
        self.cache.clone()
    }
}

fn resolve_selection(document: &mut DocumentState) {
    let selected_exists = document
        .selected_segment_id
        .as_deref()
        .is_some_and(|id| document.segment_index(id).is_some());
    if !selected_exists {
        document.selected_segment_id = document.segments.first().map(|s| s.id.clone());
    }
}
