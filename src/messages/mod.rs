pub mod storage;
pub mod types;

pub use storage::{FileStorage, LocalStorage, MemoryStorage, TranscriptStore, DEFAULT_STORAGE_KEY};
pub use types::{ChatTurn, DeliveryStatus, Message, Sender, GREETING_ID, GREETING_TEXT, LOADING_TEXT};
