pub mod gemini;

pub use gemini::GeminiSession;

use std::future::Future;

use crate::error::SessionError;
use crate::state::GroundingChunk;

/// What the model answered for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub citations: Vec<GroundingChunk>,
}

/// A live conversation with a remote model.
///
/// One session lives for the whole process; each `send` is the next turn of
/// the same conversation.
pub trait ModelSession {
    fn send(&self, user_text: &str) -> impl Future<Output = Result<ModelReply, SessionError>> + Send;
}
