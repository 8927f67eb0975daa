//! The batch orchestrator: one generic engine instantiated per feature.
//!
//! A run partitions its target set into fixed-size batches and drives them
//! strictly sequentially, appending suggestions and one [`BatchLogEntry`] per
//! batch as it goes. Exactly one run per feature is active at a time;
//! starting a new one cancels the old one, and every completion callback
//! re-checks its captured `{run_id}` against the active handle so a
//! superseded run's late arrival mutates nothing.
//!
//! Shared state lives behind `Arc<Mutex<S>>`; the lock is only taken for
//! synchronous bookkeeping, never held across an await.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::collaborator::{AssistContext, BatchItem, Collaborator, CollaboratorReply};
use crate::error::{Error, Result};
use crate::log::{BatchIssue, BatchLogEntry};
use crate::suggestion::{AssistFeature, Suggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, specta::Type)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug)]
struct RunHandle {
    run_id: Uuid,
    token: CancellationToken,
}

/// Per-feature orchestrator state: the suggestion list, the batch log, and
/// the currently active run, if any.
#[derive(Debug, Default)]
pub struct AssistState {
    pub suggestions: Vec<Suggestion>,
    pub batch_log: Vec<BatchLogEntry>,
    pub status: RunState,
    pub processed_count: usize,
    pub total_to_process: usize,
    pub error: Option<String>,
    pub discrepancy: Option<String>,
    active: Option<RunHandle>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl AssistState {
    pub fn is_processing(&self) -> bool {
        self.active.is_some()
    }

    pub fn has_pending(&self, target_key: &str) -> bool {
        self.suggestions
            .iter()
            .any(|s| s.is_pending() && s.target_key == target_key)
    }

    pub fn snapshot(&self) -> AssistSnapshot {
        AssistSnapshot {
            suggestions: self.suggestions.clone(),
            batch_log: self.batch_log.clone(),
            status: self.status,
            is_processing: self.is_processing(),
            processed_count: self.processed_count,
            total_to_process: self.total_to_process,
            error: self.error.clone(),
            discrepancy: self.discrepancy.clone(),
        }
    }

    fn is_current(&self, run_id: Uuid) -> bool {
        self.active.as_ref().is_some_and(|a| a.run_id == run_id)
    }
}

/// Read-only view of an [`AssistState`] for the UI.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct AssistSnapshot {
    pub suggestions: Vec<Suggestion>,
    pub batch_log: Vec<BatchLogEntry>,
    pub status: RunState,
    pub is_processing: bool,
    pub processed_count: usize,
    pub total_to_process: usize,
    pub error: Option<String>,
    pub discrepancy: Option<String>,
}

pub(crate) fn lock<S>(shared: &Mutex<S>) -> MutexGuard<'_, S> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Start a run for `feature` over `targets`.
///
/// Cancels any active run for the same feature first. Targets whose key
/// already has a pending suggestion are skipped; if nothing remains the run
/// never starts and a field-level error is recorded. Must be called from
/// within a tokio runtime.
pub fn start_run<S, P>(
    shared: &Arc<Mutex<S>>,
    project: P,
    feature: AssistFeature,
    mut targets: Vec<BatchItem>,
    ctx: AssistContext,
    batch_size: usize,
    collaborator: Arc<dyn Collaborator>,
) -> Result<tokio::task::JoinHandle<()>>
where
    S: Send + 'static,
    P: Fn(&mut S) -> &mut AssistState + Clone + Send + Sync + 'static,
{
    let (run_id, token) = {
        let mut guard = lock(shared);
        let state = project(&mut guard);

        let superseded = state.active.take();
        if let Some(active) = &superseded {
            active.token.cancel();
            tracing::debug!(%feature, superseded = %active.run_id, "cancelling active run");
        }

        targets.retain(|t| !state.has_pending(&t.target_key));
        if targets.is_empty() {
            // The superseded run's finalizer is identity-guarded out, so the
            // terminal status has to be recorded here.
            if superseded.is_some() {
                state.status = RunState::Cancelled;
            }
            let message = format!("no {feature} targets left to process");
            state.error = Some(message.clone());
            return Err(Error::NothingToProcess(message));
        }

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        state.status = RunState::Running;
        state.processed_count = 0;
        state.total_to_process = targets.len();
        state.error = None;
        state.discrepancy = None;
        state.batch_log.clear();
        state.active = Some(RunHandle { run_id, token: token.clone() });
        (run_id, token)
    };

    let span = tracing::info_span!("assist_run", %feature, %run_id);
    let shared = Arc::clone(shared);
    let handle = tokio::spawn(
        drive(shared, project, feature, run_id, token, targets, ctx, batch_size.max(1), collaborator)
            .instrument(span),
    );
    Ok(handle)
}

/// Cancel the active run for a feature, if any. Cooperative: the run task
/// observes the token and finalizes with a cancelled log entry. Cancellation
/// is a terminal status, not an error, so no error message is set.
pub fn cancel_run<S, P>(shared: &Arc<Mutex<S>>, project: P)
where
    P: Fn(&mut S) -> &mut AssistState,
{
    let mut guard = lock(shared);
    let state = project(&mut guard);
    if let Some(active) = &state.active {
        active.token.cancel();
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive<S, P>(
    shared: Arc<Mutex<S>>,
    project: P,
    feature: AssistFeature,
    run_id: Uuid,
    token: CancellationToken,
    targets: Vec<BatchItem>,
    ctx: AssistContext,
    batch_size: usize,
    collaborator: Arc<dyn Collaborator>,
) where
    S: Send + 'static,
    P: Fn(&mut S) -> &mut AssistState + Send + Sync + 'static,
{
    let total = targets.len();

    for (batch_index, batch) in targets.chunks(batch_size).enumerate() {
        if token.is_cancelled() {
            finalize_cancelled(&shared, &project, run_id, batch_index, total);
            return;
        }

        let started = Instant::now();
        let outcome = AssertUnwindSafe(collaborator.invoke(batch, &ctx, &token))
            .catch_unwind()
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut guard = lock(&shared);
        let state = project(&mut guard);
        if !state.is_current(run_id) {
            tracing::debug!(%run_id, "superseded run completion ignored");
            return;
        }

        match outcome {
            Ok(Ok(reply)) => {
                apply_reply(state, feature, batch, reply, batch_index, duration_ms, total);
            }
            Ok(Err(_)) if token.is_cancelled() => {
                finalize_cancelled_locked(state, run_id, batch_index, total);
                return;
            }
            Ok(Err(err)) => {
                // Batch-scoped failure: log it fatally for this batch and
                // keep going.
                state.processed_count += batch.len();
                state.batch_log.push(BatchLogEntry {
                    batch_index,
                    expected_count: batch.len(),
                    returned_count: 0,
                    used_count: 0,
                    ignored_count: 0,
                    duration_ms,
                    issues: vec![BatchIssue::error(err.to_string())],
                    fatal: true,
                    processed_total: state.processed_count,
                    total_expected: total,
                    logged_at_ms: now_ms(),
                });
                state.discrepancy =
                    Some(format!("batch {} failed; see batch log", batch_index + 1));
                tracing::warn!(batch_index, error = %err, "batch failed, continuing");
            }
            Err(_panic) => {
                // Escaped the per-batch boundary: stop the whole run.
                state.status = RunState::Failed;
                state.error = Some(format!("{feature} run aborted in batch {}", batch_index + 1));
                state.active = None;
                tracing::error!(batch_index, "collaborator panicked, run failed");
                return;
            }
        }
    }

    let mut guard = lock(&shared);
    let state = project(&mut guard);
    if !state.is_current(run_id) {
        return;
    }
    state.status = RunState::Completed;
    state.active = None;
    tracing::info!(processed = state.processed_count, "run completed");
}

fn apply_reply(
    state: &mut AssistState,
    feature: AssistFeature,
    batch: &[BatchItem],
    reply: CollaboratorReply,
    batch_index: usize,
    duration_ms: u64,
    total: usize,
) {
    let expected = batch.len();
    let returned = reply.results.len();
    let batch_keys: HashSet<&str> = batch.iter().map(|b| b.target_key.as_str()).collect();

    let mut used = 0;
    let mut ignored = 0;
    for result in &reply.results {
        if !batch_keys.contains(result.target_key.as_str())
            || state.has_pending(&result.target_key)
        {
            ignored += 1;
            continue;
        }
        match Suggestion::from_result(feature, result) {
            Some(suggestion) => {
                state.suggestions.push(suggestion);
                used += 1;
            }
            None => ignored += 1,
        }
    }

    state.processed_count += expected;
    state.batch_log.push(BatchLogEntry {
        batch_index,
        expected_count: expected,
        returned_count: returned,
        used_count: used,
        ignored_count: ignored,
        duration_ms,
        issues: reply.issues.clone(),
        fatal: false,
        processed_total: state.processed_count,
        total_expected: total,
        logged_at_ms: now_ms(),
    });

    if returned != expected || !reply.issues.is_empty() {
        state.discrepancy = Some(format!(
            "batch {} returned {returned} of {expected} items; see batch log",
            batch_index + 1
        ));
        tracing::warn!(batch_index, returned, expected, "batch discrepancy");
    }
}

fn finalize_cancelled<S, P>(
    shared: &Arc<Mutex<S>>,
    project: &P,
    run_id: Uuid,
    batch_index: usize,
    total: usize,
) where
    P: Fn(&mut S) -> &mut AssistState,
{
    let mut guard = lock(shared);
    let state = project(&mut guard);
    if !state.is_current(run_id) {
        return;
    }
    finalize_cancelled_locked(state, run_id, batch_index, total);
}

fn finalize_cancelled_locked(
    state: &mut AssistState,
    run_id: Uuid,
    batch_index: usize,
    total: usize,
) {
    state.batch_log.push(BatchLogEntry {
        batch_index,
        expected_count: 0,
        returned_count: 0,
        used_count: 0,
        ignored_count: 0,
        duration_ms: 0,
        issues: vec![BatchIssue::info("run cancelled")],
        fatal: false,
        processed_total: state.processed_count,
        total_expected: total,
        logged_at_ms: now_ms(),
    });
    state.status = RunState::Cancelled;
    state.active = None;
    tracing::debug!(%run_id, "run cancelled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::CollaboratorResult;
    use crate::suggestion::SuggestionStatus;

    type Shared = Arc<Mutex<AssistState>>;

    fn project(state: &mut AssistState) -> &mut AssistState {
        state
    }

    fn items(n: usize) -> Vec<BatchItem> {
        (0..n)
            .map(|i| BatchItem {
                target_key: format!("s{i}"),
                payload: serde_json::json!({}),
            })
            .collect()
    }

    fn ctx() -> AssistContext {
        AssistContext {
            feature: AssistFeature::SpeakerClassification,
            prompt: "classify".into(),
            extra: serde_json::Value::Null,
        }
    }

    /// Echoes back a speaker name for the first `keep` items of each batch.
    struct EchoCollaborator {
        keep: usize,
    }

    impl Collaborator for EchoCollaborator {
        fn invoke<'a>(
            &'a self,
            batch: &'a [BatchItem],
            _ctx: &'a AssistContext,
            _cancel: &'a CancellationToken,
        ) -> crate::collaborator::BoxFuture<'a, std::result::Result<CollaboratorReply, crate::collaborator::CollaboratorError>>
        {
            Box::pin(async move {
                let results = batch
                    .iter()
                    .take(self.keep)
                    .map(|item| CollaboratorResult {
                        target_key: item.target_key.clone(),
                        value: serde_json::json!("Speaker X"),
                        confidence: Some(0.8),
                        reason: None,
                        is_new: Some(true),
                    })
                    .collect();
                Ok(CollaboratorReply { results, issues: vec![], summary: None })
            })
        }
    }

    /// Fails on a fixed batch index, succeeds elsewhere.
    struct FlakyCollaborator {
        fail_batch: std::sync::atomic::AtomicUsize,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl Collaborator for FlakyCollaborator {
        fn invoke<'a>(
            &'a self,
            batch: &'a [BatchItem],
            _ctx: &'a AssistContext,
            _cancel: &'a CancellationToken,
        ) -> crate::collaborator::BoxFuture<'a, std::result::Result<CollaboratorReply, crate::collaborator::CollaboratorError>>
        {
            Box::pin(async move {
                let call = self
                    .calls
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if call == self.fail_batch.load(std::sync::atomic::Ordering::SeqCst) {
                    return Err("upstream exploded".into());
                }
                let results = batch
                    .iter()
                    .map(|item| CollaboratorResult {
                        target_key: item.target_key.clone(),
                        value: serde_json::json!("A"),
                        confidence: None,
                        reason: None,
                        is_new: None,
                    })
                    .collect();
                Ok(CollaboratorReply { results, issues: vec![], summary: None })
            })
        }
    }

    /// Blocks until the cancellation token fires, then rejects.
    struct BlockingCollaborator;

    impl Collaborator for BlockingCollaborator {
        fn invoke<'a>(
            &'a self,
            _batch: &'a [BatchItem],
            _ctx: &'a AssistContext,
            cancel: &'a CancellationToken,
        ) -> crate::collaborator::BoxFuture<'a, std::result::Result<CollaboratorReply, crate::collaborator::CollaboratorError>>
        {
            Box::pin(async move {
                cancel.cancelled().await;
                Err("cancelled".into())
            })
        }
    }

    // ── start guards ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_target_set_never_starts() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        let result = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            vec![],
            ctx(),
            10,
            Arc::new(EchoCollaborator { keep: 0 }),
        );

        assert!(matches!(result, Err(Error::NothingToProcess(_))));
        let guard = shared.lock().unwrap();
        assert!(guard.error.is_some());
        assert_eq!(guard.status, RunState::Idle);
        assert!(!guard.is_processing());
    }

    #[tokio::test]
    async fn targets_with_pending_suggestions_are_skipped() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        shared.lock().unwrap().suggestions.push(Suggestion {
            target_key: "s0".into(),
            status: SuggestionStatus::Pending,
            confidence: None,
            reason: None,
            body: crate::suggestion::SuggestionBody::Speaker { name: "A".into(), is_new: false },
        });

        // the only target is already covered
        let result = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(1),
            ctx(),
            10,
            Arc::new(EchoCollaborator { keep: 1 }),
        );
        assert!(result.is_err());
        assert_eq!(shared.lock().unwrap().suggestions.len(), 1);
    }

    // ── completion / discrepancy / failure ───────────────────────────────

    #[tokio::test]
    async fn run_completes_and_counts_items() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        let handle = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(25),
            ctx(),
            10,
            Arc::new(EchoCollaborator { keep: 10 }),
        )
        .unwrap();
        handle.await.unwrap();

        let guard = shared.lock().unwrap();
        assert_eq!(guard.status, RunState::Completed);
        assert_eq!(guard.processed_count, 25);
        assert_eq!(guard.total_to_process, 25);
        assert_eq!(guard.batch_log.len(), 3);
        // last batch only had 5 items
        assert_eq!(guard.batch_log[2].expected_count, 5);
        // every batch echoed in full: 10 + 10 + 5
        assert_eq!(guard.suggestions.len(), 25);
        assert!(guard.discrepancy.is_none());
    }

    #[tokio::test]
    async fn short_reply_sets_discrepancy_but_run_continues() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        let handle = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(20),
            ctx(),
            10,
            Arc::new(EchoCollaborator { keep: 7 }),
        )
        .unwrap();
        handle.await.unwrap();

        let guard = shared.lock().unwrap();
        assert_eq!(guard.status, RunState::Completed);
        let entry = &guard.batch_log[0];
        assert_eq!(
            (entry.expected_count, entry.returned_count, entry.used_count, entry.ignored_count),
            (10, 7, 7, 0)
        );
        assert!(guard.discrepancy.as_deref().unwrap().contains("batch log"));
        assert_eq!(guard.batch_log.len(), 2);
    }

    #[tokio::test]
    async fn failed_batch_is_fatal_locally_but_run_continues() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        let collaborator = Arc::new(FlakyCollaborator {
            fail_batch: std::sync::atomic::AtomicUsize::new(0),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let handle = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(20),
            ctx(),
            10,
            collaborator,
        )
        .unwrap();
        handle.await.unwrap();

        let guard = shared.lock().unwrap();
        assert_eq!(guard.status, RunState::Completed);
        assert!(guard.batch_log[0].fatal);
        assert_eq!(guard.batch_log[0].issues.len(), 1);
        assert!(!guard.batch_log[1].fatal);
        assert_eq!(guard.suggestions.len(), 10);
        assert_eq!(guard.processed_count, 20);
    }

    // ── cancellation / supersession ──────────────────────────────────────

    #[tokio::test]
    async fn cancel_finalizes_with_cancelled_entry() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        let handle = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(10),
            ctx(),
            10,
            Arc::new(BlockingCollaborator),
        )
        .unwrap();

        cancel_run(&shared, project);
        handle.await.unwrap();

        let guard = shared.lock().unwrap();
        assert_eq!(guard.status, RunState::Cancelled);
        assert!(guard.error.is_none());
        assert!(!guard.is_processing());
        let last = guard.batch_log.last().unwrap();
        assert_eq!(last.issues[0].message, "run cancelled");
    }

    #[tokio::test]
    async fn superseding_with_no_fresh_targets_still_terminates_the_old_run() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        let stale = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(1),
            ctx(),
            10,
            Arc::new(BlockingCollaborator),
        )
        .unwrap();

        // the only target gains a pending suggestion before the second start
        shared.lock().unwrap().suggestions.push(Suggestion {
            target_key: "s0".into(),
            status: SuggestionStatus::Pending,
            confidence: None,
            reason: None,
            body: crate::suggestion::SuggestionBody::Speaker { name: "A".into(), is_new: false },
        });

        let second = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(1),
            ctx(),
            10,
            Arc::new(EchoCollaborator { keep: 1 }),
        );
        assert!(matches!(second, Err(Error::NothingToProcess(_))));
        stale.await.unwrap();

        let guard = shared.lock().unwrap();
        assert_eq!(guard.status, RunState::Cancelled);
        assert!(!guard.is_processing());
        assert!(guard.error.is_some());
    }

    #[tokio::test]
    async fn superseded_run_completion_is_a_noop() {
        let shared: Shared = Arc::new(Mutex::new(AssistState::default()));
        let stale = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(3),
            ctx(),
            10,
            Arc::new(BlockingCollaborator),
        )
        .unwrap();

        // Run B supersedes A while A is still awaiting its first batch.
        let fresh = start_run(
            &shared,
            project,
            AssistFeature::SpeakerClassification,
            items(3),
            ctx(),
            10,
            Arc::new(EchoCollaborator { keep: 3 }),
        )
        .unwrap();

        stale.await.unwrap();
        fresh.await.unwrap();

        let guard = shared.lock().unwrap();
        assert_eq!(guard.status, RunState::Completed);
        // Only B's suggestions were recorded; A's late completion changed nothing.
        assert_eq!(guard.suggestions.len(), 3);
        assert!(guard.batch_log.iter().all(|e| !e.fatal));
        assert!(
            guard
                .batch_log
                .iter()
                .all(|e| e.issues.iter().all(|i| i.message != "run cancelled"))
        );
    }
}
