pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("chapter '{0}' references a segment that no longer exists")]
    ChapterDanglingSegment(String),
    #[error("chapters '{0}' and '{1}' cover overlapping segment ranges")]
    ChapterOverlap(String, String),
}
