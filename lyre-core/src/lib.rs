pub mod config;
pub mod content;
pub mod error;
pub mod history;
pub mod refresh;
pub mod selector;
pub mod session;
pub mod wikidata;

pub use config::LyreConfig;
pub use content::{resolve_content, ItemContent};
pub use error::LyreError;
pub use history::HistoryEntry;
pub use refresh::Refresher;
pub use selector::Decision;
pub use session::{LeanCloudStore, MemoryStore, SessionStore, UserSession};
pub use wikidata::{ItemSource, SiteLink, WikidataClient};
