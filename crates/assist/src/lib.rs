pub mod collaborator;
mod error;
pub mod lifecycle;
pub mod log;
pub mod run;
pub mod suggestion;

pub use collaborator::{
    AssistContext, BatchItem, BoxFuture, Collaborator, CollaboratorError, CollaboratorReply,
    CollaboratorResult,
};
pub use error::{Error, Result};
pub use lifecycle::{accept_many, accept_one, reject, reject_all, AcceptOutcome};
pub use log::{BatchIssue, BatchLogEntry, IssueLevel};
pub use run::{cancel_run, start_run, AssistSnapshot, AssistState, RunState};
pub use suggestion::{AssistFeature, Suggestion, SuggestionBody, SuggestionStatus};
