//! UI-agnostic conversation and history types
//!
//! This module contains the data structures shared by the chat controller,
//! the history store and whatever front end draws them. None of them depend
//! on a specific UI framework.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The role of a conversation message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Model,
}

/// What a message carries besides its metadata.
///
/// `SetupNotice` replaces prose with the credential setup instructions; the
/// front end is expected to draw it as a dedicated panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    SetupNotice,
}

impl MessageContent {
    /// Text body of the message, empty for the setup notice
    pub fn text(&self) -> &str {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::SetupNotice => "",
        }
    }
}

/// A web citation returned by search grounding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

impl GroundingChunk {
    pub fn web(uri: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            web: Some(WebSource {
                uri: uri.into(),
                title: title.map(str::to_string),
            }),
        }
    }

    /// `(label, uri)` for display, skipping chunks without a URI
    pub fn link(&self) -> Option<(&str, &str)> {
        let web = self.web.as_ref()?;
        if web.uri.is_empty() {
            return None;
        }
        let label = web
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(FALLBACK_SOURCE_LABEL);
        Some((label, web.uri.as_str()))
    }
}

pub const FALLBACK_SOURCE_LABEL: &str = "Fuente Web";

/// A message in the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: MessageContent,
    pub timestamp: DateTime<Local>,
    pub is_error: bool,
    pub grounding_chunks: Vec<GroundingChunk>,
}

impl ConversationMessage {
    pub fn text(&self) -> &str {
        self.content.text()
    }

    pub fn is_setup_notice(&self) -> bool {
        self.content == MessageContent::SetupNotice
    }
}

/// A saved analysis, persisted as part of the history blob.
///
/// Field names follow the persisted JSON layout (`matchTitle`,
/// `fullContent`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub match_title: String,
    pub summary: String,
    pub full_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

impl HistoryItem {
    pub fn created_at(&self) -> DateTime<Local> {
        DateTime::from_timestamp_millis(self.timestamp)
            .map(|utc| utc.with_timezone(&Local))
            .unwrap_or_default()
    }

    /// Date used for display and for the history search (`d/m/yyyy`)
    pub fn display_date(&self) -> String {
        self.created_at().format("%-d/%-m/%Y").to_string()
    }

    /// The item viewed as the model message that produced it
    pub fn as_message(&self) -> ConversationMessage {
        ConversationMessage {
            id: self.id.clone(),
            role: ChatRole::Model,
            content: MessageContent::Text(self.full_content.clone()),
            timestamp: self.created_at(),
            is_error: false,
            grounding_chunks: self.grounding_chunks.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_item() -> HistoryItem {
        HistoryItem {
            id: "1718000000000".to_string(),
            timestamp: 1_718_000_000_000,
            match_title: "Real Madrid vs Barcelona".to_string(),
            summary: "🏆 Real Madrid".to_string(),
            full_content: "# 🐂 Real Madrid vs Barcelona".to_string(),
            grounding_chunks: Some(vec![
                GroundingChunk::web("https://example.com/a", Some("Marca")),
                GroundingChunk { web: None },
            ]),
        }
    }

    #[test]
    fn test_history_item_uses_camel_case_layout() {
        let json = serde_json::to_value(sample_item()).unwrap();
        assert!(json.get("matchTitle").is_some());
        assert!(json.get("fullContent").is_some());
        assert!(json.get("groundingChunks").is_some());
        assert_eq!(json["groundingChunks"][0]["web"]["title"], "Marca");
    }

    #[test]
    fn test_history_round_trip_preserves_every_field() {
        for items in [vec![], vec![sample_item()]] {
            let json = serde_json::to_string(&items).unwrap();
            let back: Vec<HistoryItem> = serde_json::from_str(&json).unwrap();
            assert_eq!(back, items);
        }
    }

    #[test]
    fn test_missing_grounding_chunks_deserializes_to_none() {
        let json = r#"[{"id":"1","timestamp":5,"matchTitle":"A vs B","summary":"s","fullContent":"c"}]"#;
        let items: Vec<HistoryItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items[0].grounding_chunks, None);
    }

    #[test]
    fn test_link_falls_back_when_title_missing() {
        let chunk = GroundingChunk::web("https://example.com", None);
        assert_eq!(chunk.link(), Some((FALLBACK_SOURCE_LABEL, "https://example.com")));

        let empty_uri = GroundingChunk::web("", Some("x"));
        assert_eq!(empty_uri.link(), None);
        assert_eq!(GroundingChunk::default().link(), None);
    }

    #[test]
    fn test_setup_notice_has_empty_text() {
        assert_eq!(MessageContent::SetupNotice.text(), "");
        assert_eq!(MessageContent::Text("hola".into()).text(), "hola");
    }
}
