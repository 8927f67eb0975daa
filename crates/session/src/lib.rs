mod cache;
mod key;
pub mod persist;

pub use cache::{SessionManager, SessionRecord};
pub use key::session_key;
pub use persist::{AssistConfig, GlobalConfig, NullScheduler, PersistScheduler, SessionCacheSnapshot};
