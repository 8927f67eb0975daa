pub mod chapters;
mod error;
pub mod history;
pub mod palette;
pub mod store;
pub mod types;

pub use chapters::{check_chapter_conflicts, sort_chapters_by_start};
pub use error::{Error, Result};
pub use history::History;
pub use palette::speaker_color;
pub use types::{Chapter, DocumentState, Segment, Speaker, Tag, Word};
