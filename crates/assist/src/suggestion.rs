use crate::collaborator::CollaboratorResult;

/// The four AI-assisted features. Each one drives its own single-flight
/// orchestrator run and its own suggestion list; features never share state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    specta::Type,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssistFeature {
    SpeakerClassification,
    TextRevision,
    ChapterDetection,
    MergeDetection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, specta::Type)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

/// The proposed mutation, tagged per feature.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionBody {
    /// Reassign the target segment to `name`; `is_new` hints that the
    /// collaborator did not see the name among known speakers. Acceptance
    /// re-checks existence case-insensitively either way.
    Speaker { name: String, is_new: bool },
    /// Replace the target segment's text.
    Revision { text: String },
    /// Add a chapter spanning the given segment range.
    Chapter {
        start_segment_id: String,
        end_segment_id: String,
        title: String,
        summary: Option<String>,
    },
    /// Merge the target segment with its immediate successor.
    Merge { into_next_of: String },
}

/// A pending AI-proposed mutation awaiting human accept/reject.
///
/// `target_key` is unique among pending suggestions: the orchestrator skips
/// targets that already have one, so requesting the same target twice before
/// accept/reject never yields two.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Suggestion {
    pub target_key: String,
    pub status: SuggestionStatus,
    pub confidence: Option<f32>,
    pub reason: Option<String>,
    pub body: SuggestionBody,
}

impl Suggestion {
    pub fn is_pending(&self) -> bool {
        self.status == SuggestionStatus::Pending
    }

    /// Map one collaborator result into a pending suggestion. Returns `None`
    /// when the result's value does not parse for the feature — the caller
    /// counts those as ignored.
    pub fn from_result(feature: AssistFeature, result: &CollaboratorResult) -> Option<Self> {
        let body = match feature {
            AssistFeature::SpeakerClassification => SuggestionBody::Speaker {
                name: result.value.as_str()?.to_string(),
                is_new: result.is_new.unwrap_or(false),
            },
            AssistFeature::TextRevision => SuggestionBody::Revision {
                text: result.value.as_str()?.to_string(),
            },
            AssistFeature::ChapterDetection => {
                let body: SuggestionBody = serde_json::from_value(result.value.clone()).ok()?;
                if !matches!(body, SuggestionBody::Chapter { .. }) {
                    return None;
                }
                body
            }
            AssistFeature::MergeDetection => SuggestionBody::Merge {
                into_next_of: result.target_key.clone(),
            },
        };
        Some(Self {
            target_key: result.target_key.clone(),
            status: SuggestionStatus::Pending,
            confidence: result.confidence,
            reason: result.reason.clone(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(target: &str, value: serde_json::Value) -> CollaboratorResult {
        CollaboratorResult {
            target_key: target.into(),
            value,
            confidence: Some(0.9),
            reason: None,
            is_new: None,
        }
    }

    #[test]
    fn feature_wire_format_matches_display_label() {
        use strum::IntoEnumIterator;

        // the serde tag and the log/span label must never drift apart
        for feature in AssistFeature::iter() {
            let encoded = serde_json::to_value(feature).unwrap();
            assert_eq!(encoded, serde_json::json!(feature.to_string()));
        }
    }

    #[test]
    fn speaker_result_maps_to_speaker_body() {
        let s = Suggestion::from_result(
            AssistFeature::SpeakerClassification,
            &result("s1", serde_json::json!("Alice")),
        )
        .unwrap();
        assert_eq!(
            s.body,
            SuggestionBody::Speaker { name: "Alice".into(), is_new: false }
        );
        assert!(s.is_pending());
    }

    #[test]
    fn chapter_result_parses_structured_value() {
        let s = Suggestion::from_result(
            AssistFeature::ChapterDetection,
            &result(
                "s1",
                serde_json::json!({
                    "kind": "chapter",
                    "start_segment_id": "s1",
                    "end_segment_id": "s3",
                    "title": "Intro",
                    "summary": null,
                }),
            ),
        )
        .unwrap();
        match s.body {
            SuggestionBody::Chapter { ref title, .. } => assert_eq!(title, "Intro"),
            ref other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn malformed_value_is_dropped() {
        assert!(
            Suggestion::from_result(
                AssistFeature::TextRevision,
                &result("s1", serde_json::json!({"not": "a string"})),
            )
            .is_none()
        );
    }
}
