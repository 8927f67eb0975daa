/// A single recognized word inside a segment. Immutable once created;
/// words are ordered and non-overlapping within their segment.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Word {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A timed span of transcript text attributed to one speaker.
///
/// `speaker` is a soft reference by name, not by id — reassigning a segment
/// to a speaker that does not exist yet is legal, and acceptance-time logic
/// decides whether to create the speaker entity.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Segment {
    pub id: String,
    pub speaker: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub bookmarked: bool,
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

impl Segment {
    pub fn new(speaker: impl Into<String>, start_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            speaker: speaker.into(),
            start_ms,
            end_ms,
            text: text.into(),
            words: Vec::new(),
            confirmed: false,
            bookmarked: false,
            tag_ids: Vec::new(),
        }
    }
}

/// A named, colored entity assignable to segments.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// A contiguous range of segments with metadata.
///
/// `segment_count` is derived (`index(end) - index(start) + 1`) and is
/// recomputed by the conflict detector before every multi-chapter commit, so
/// a stale stored count never survives acceptance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Chapter {
    pub id: String,
    pub start_segment_id: String,
    pub end_segment_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default)]
    pub segment_count: usize,
}

/// The whole mutable document: everything undo/redo snapshots and session
/// switches carry. A history entry is an immutable clone of this.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct DocumentState {
    pub segments: Vec<Segment>,
    pub speakers: Vec<Speaker>,
    pub tags: Vec<Tag>,
    pub chapters: Vec<Chapter>,
    pub selected_segment_id: Option<String>,
    pub selected_chapter_id: Option<String>,
    pub current_time_ms: i64,
}

impl DocumentState {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.speakers.is_empty() && self.chapters.is_empty()
    }
}
