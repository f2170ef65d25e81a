//! Conversation state machine.
//!
//! `Idle --submit--> AwaitingResponse --resolve--> Idle`. The user message is
//! appended as soon as it is submitted; the reply (or error) is appended
//! when the pending request resolves. Submissions while a request is
//! pending are dropped, not queued.

use chrono::{DateTime, Local};
use tracing::{error, info};

use crate::ai::{ModelReply, ModelSession};
use crate::error::SessionError;
use crate::extract;
use crate::history::HistoryStore;
use crate::persona::{CRITICAL_ERROR_MESSAGE, INITIAL_MESSAGE, INITIAL_MESSAGE_ID};
use crate::state::{ChatRole, ConversationMessage, GroundingChunk, HistoryItem, MessageContent};

/// A submitted message waiting to be sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub text: String,
}

/// What `resolve` did with the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Reply appended and saved as a history entry
    Saved,
    /// Reply appended; the history entry is kept in memory but could not
    /// be written to the store
    SaveFailed,
    /// Reply appended; nothing recognizable to save
    Answered,
    /// Error message appended
    Failed,
    /// No request was pending
    Ignored,
}

pub struct ChatController {
    messages: Vec<ConversationMessage>,
    awaiting_response: bool,
    setup_notice_shown: bool,
    last_id: i64,
}

impl Default for ChatController {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatController {
    /// A conversation opened by the persona greeting
    pub fn new() -> Self {
        Self {
            messages: vec![ConversationMessage {
                id: INITIAL_MESSAGE_ID.to_string(),
                role: ChatRole::Model,
                content: MessageContent::Text(INITIAL_MESSAGE.to_string()),
                timestamp: Local::now(),
                is_error: false,
                grounding_chunks: Vec::new(),
            }],
            awaiting_response: false,
            setup_notice_shown: false,
            last_id: 0,
        }
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// Latest model answer that is not an error, for copy/export
    pub fn last_analysis(&self) -> Option<&ConversationMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Model && !m.is_error && !m.text().is_empty())
    }

    /// Startup hook: without a credential, show the setup instructions once
    /// per process. Returns whether a notice was appended.
    pub fn ensure_setup_notice(&mut self, has_credential: bool) -> bool {
        if has_credential || self.setup_notice_shown {
            return false;
        }
        self.setup_notice_shown = true;
        let message = self.model_message(MessageContent::SetupNotice, false, Vec::new());
        self.messages.push(message);
        true
    }

    /// Accept a user message. Returns `None` (and changes nothing) while a
    /// reply is pending or when the text is blank.
    pub fn submit(&mut self, text: &str) -> Option<PendingRequest> {
        let text = text.trim();
        if self.awaiting_response || text.is_empty() {
            return None;
        }

        let (id, timestamp) = self.next_id();
        self.messages.push(ConversationMessage {
            id,
            role: ChatRole::User,
            content: MessageContent::Text(text.to_string()),
            timestamp,
            is_error: false,
            grounding_chunks: Vec::new(),
        });
        self.awaiting_response = true;

        Some(PendingRequest {
            text: text.to_string(),
        })
    }

    /// Settle the pending request. Successful analyses with a recognizable
    /// title or summary are saved to `history`.
    pub fn resolve(
        &mut self,
        result: Result<ModelReply, SessionError>,
        history: &mut HistoryStore,
    ) -> Resolution {
        if !self.awaiting_response {
            return Resolution::Ignored;
        }
        self.awaiting_response = false;

        match result {
            Ok(reply) => {
                let message = self.model_message(
                    MessageContent::Text(reply.text.clone()),
                    false,
                    reply.citations.clone(),
                );
                let details = extract::extract(&reply.text);
                let item = details.is_recognized().then(|| HistoryItem {
                    id: message.id.clone(),
                    timestamp: message.timestamp.timestamp_millis(),
                    match_title: details.title,
                    summary: details.summary,
                    full_content: reply.text,
                    grounding_chunks: Some(reply.citations),
                });
                self.messages.push(message);

                match item {
                    Some(item) => {
                        let title = item.match_title.clone();
                        // The store logs the failed write; the entry stays
                        // in memory for this session
                        match history.append(item) {
                            Ok(()) => {
                                info!(%title, "analysis saved to history");
                                Resolution::Saved
                            }
                            Err(_) => Resolution::SaveFailed,
                        }
                    }
                    None => Resolution::Answered,
                }
            }
            Err(err) => {
                error!(error = %err, "model request failed");
                let content = if err.needs_setup() {
                    MessageContent::SetupNotice
                } else {
                    MessageContent::Text(CRITICAL_ERROR_MESSAGE.to_string())
                };
                let message = self.model_message(content, true, Vec::new());
                self.messages.push(message);
                Resolution::Failed
            }
        }
    }

    /// Submit, send through `session` and resolve in one go. Without a
    /// session the turn fails with `CredentialMissing`.
    pub async fn send_with<S: ModelSession>(
        &mut self,
        session: Option<&S>,
        history: &mut HistoryStore,
        text: &str,
    ) -> Option<Resolution> {
        let pending = self.submit(text)?;
        let result = match session {
            Some(session) => session.send(&pending.text).await,
            None => Err(SessionError::CredentialMissing),
        };
        Some(self.resolve(result, history))
    }

    fn model_message(
        &mut self,
        content: MessageContent,
        is_error: bool,
        grounding_chunks: Vec<GroundingChunk>,
    ) -> ConversationMessage {
        let (id, timestamp) = self.next_id();
        ConversationMessage {
            id,
            role: ChatRole::Model,
            content,
            timestamp,
            is_error,
            grounding_chunks,
        }
    }

    /// Millisecond ids, bumped when two messages land in the same
    /// millisecond so ids stay unique and ordered.
    fn next_id(&mut self) -> (String, DateTime<Local>) {
        let now = Local::now();
        let id = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        (id.to_string(), now)
    }
}
