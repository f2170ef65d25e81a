pub mod ai;
pub mod chat;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod markdown;
pub mod persona;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use ai::{GeminiSession, ModelReply, ModelSession};
pub use chat::{ChatController, PendingRequest, Resolution};
pub use config::Config;
pub use error::{SessionError, StoreError};
pub use extract::{extract, MatchDetails};
pub use history::HistoryStore;
pub use state::{ChatRole, ConversationMessage, GroundingChunk, HistoryItem, MessageContent};
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore};
