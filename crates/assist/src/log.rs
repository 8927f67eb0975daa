//! Per-run batch diagnostics. Entries are append-only and never mutated
//! after creation; the UI's discrepancy notice points readers here.

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, specta::Type)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct BatchIssue {
    pub level: IssueLevel,
    pub message: String,
}

impl BatchIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self { level: IssueLevel::Error, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: IssueLevel::Info, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct BatchLogEntry {
    pub batch_index: usize,
    pub expected_count: usize,
    pub returned_count: usize,
    pub used_count: usize,
    pub ignored_count: usize,
    pub duration_ms: u64,
    pub issues: Vec<BatchIssue>,
    pub fatal: bool,
    /// Items processed across the whole run after this batch.
    pub processed_total: usize,
    pub total_expected: usize,
    pub logged_at_ms: i64,
}
