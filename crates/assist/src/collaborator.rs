//! The external AI collaborator contract.
//!
//! Provider, model, and prompt wiring live behind this trait; the
//! orchestrator only sees batches in and results out. Implementations must
//! reject promptly once the cancellation token fires.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::log::BatchIssue;
use crate::suggestion::AssistFeature;

pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One target item sent to the collaborator. `payload` carries whatever the
/// feature's prompt needs (segment text, speaker, timings) and is opaque to
/// the orchestrator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BatchItem {
    pub target_key: String,
    pub payload: serde_json::Value,
}

/// Passed through to the collaborator unchanged; `extra` carries
/// provider/model selection the orchestrator does not interpret.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssistContext {
    pub feature: AssistFeature,
    pub prompt: String,
    #[serde(default)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CollaboratorResult {
    pub target_key: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub is_new: Option<bool>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CollaboratorReply {
    pub results: Vec<CollaboratorResult>,
    #[serde(default)]
    pub issues: Vec<BatchIssue>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Object-safe via the explicit `BoxFuture` return type; the orchestrator
/// holds collaborators as `Arc<dyn Collaborator>`.
pub trait Collaborator: Send + Sync {
    fn invoke<'a>(
        &'a self,
        batch: &'a [BatchItem],
        ctx: &'a AssistContext,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CollaboratorReply, CollaboratorError>>;
}
