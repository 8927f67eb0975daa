#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use emend_assist::{
    AssistContext, BatchItem, BoxFuture, Collaborator, CollaboratorError, CollaboratorReply,
    CollaboratorResult,
};
use emend_document::{DocumentState, Segment};
use tokio_util::sync::CancellationToken;

/// Returns a scripted value per target key, optionally capping how many
/// results each batch reply carries (to provoke discrepancies).
pub struct MapCollaborator {
    replies: HashMap<String, serde_json::Value>,
    per_batch_cap: Option<usize>,
    is_new: bool,
}

impl MapCollaborator {
    pub fn new(replies: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            per_batch_cap: None,
            is_new: true,
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.per_batch_cap = Some(cap);
        self
    }
}

impl Collaborator for MapCollaborator {
    fn invoke<'a>(
        &'a self,
        batch: &'a [BatchItem],
        _ctx: &'a AssistContext,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CollaboratorReply, CollaboratorError>> {
        Box::pin(async move {
            let cap = self.per_batch_cap.unwrap_or(usize::MAX);
            let results = batch
                .iter()
                .filter_map(|item| {
                    self.replies.get(&item.target_key).map(|value| CollaboratorResult {
                        target_key: item.target_key.clone(),
                        value: value.clone(),
                        confidence: Some(0.9),
                        reason: None,
                        is_new: Some(self.is_new),
                    })
                })
                .take(cap)
                .collect();
            Ok(CollaboratorReply { results, issues: vec![], summary: None })
        })
    }
}

/// Stalls its first invocation until the run is superseded or cancelled;
/// later invocations echo a scripted value for every item. `entered`
/// releases one permit once the first invocation is underway, so tests can
/// sequence a superseding start deterministically.
pub struct StallThenEcho {
    calls: AtomicUsize,
    value: serde_json::Value,
    pub entered: tokio::sync::Semaphore,
}

impl StallThenEcho {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            value,
            entered: tokio::sync::Semaphore::new(0),
        }
    }
}

impl Collaborator for StallThenEcho {
    fn invoke<'a>(
        &'a self,
        batch: &'a [BatchItem],
        _ctx: &'a AssistContext,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CollaboratorReply, CollaboratorError>> {
        Box::pin(async move {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.add_permits(1);
                cancel.cancelled().await;
                return Err("superseded".into());
            }
            let results = batch
                .iter()
                .map(|item| CollaboratorResult {
                    target_key: item.target_key.clone(),
                    value: self.value.clone(),
                    confidence: None,
                    reason: None,
                    is_new: Some(true),
                })
                .collect();
            Ok(CollaboratorReply { results, issues: vec![], summary: None })
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A document with `speakers` and one segment per entry in `attributions`.
pub fn sample_document(speakers: &[&str], attributions: &[&str]) -> DocumentState {
    let mut doc = DocumentState::default();
    for name in speakers {
        doc.add_speaker(*name);
    }
    for (i, speaker) in attributions.iter().enumerate() {
        let start = i as i64 * 1000;
        doc.segments
            .push(Segment::new(*speaker, start, start + 1000, format!("segment {i}")));
    }
    doc
}
