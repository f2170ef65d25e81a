use std::sync::Arc;

use chrono::{DateTime, Local, Locale};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ModelReply, ModelSession};
use crate::config::Config;
use crate::error::SessionError;
use crate::persona::{EMPTY_REPLY_FALLBACK, SYSTEM_INSTRUCTION};
use crate::state::GroundingChunk;

/// Harm categories sent with a `BLOCK_NONE` threshold
const RELAXED_HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }

    fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction,
    contents: &'a [Content],
    tools: Vec<Tool>,
    safety_settings: Vec<SafetySetting>,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(contents: &'a [Content]) -> Self {
        Self {
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: Some(SYSTEM_INSTRUCTION.to_string()),
                }],
            },
            contents,
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
            safety_settings: RELAXED_HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    // Kept loose: the metadata shape varies between responses
    #[serde(default)]
    grounding_metadata: Option<serde_json::Value>,
}

/// Citations found in the grounding metadata. Anything missing or
/// malformed is skipped rather than reported.
fn grounding_chunks(metadata: Option<&serde_json::Value>) -> Vec<GroundingChunk> {
    metadata
        .and_then(|m| m.get("groundingChunks"))
        .and_then(|chunks| chunks.as_array())
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| serde_json::from_value(chunk.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Date and time preamble prepended to every user message. Computed per
/// call; a session may span several days.
pub fn context_preamble(now: DateTime<Local>) -> String {
    let date = now
        .format_localized("%A, %-d de %B de %Y", Locale::es_ES)
        .to_string();
    let time = now.format("%H:%M");
    format!(
        "[SISTEMA: Fecha y Hora Real del Usuario: {}, {}. Usa ESTA fecha como referencia absoluta para \"hoy\", \"mañana\" o búsquedas en Google.]",
        date, time
    )
}

pub fn compose_prompt(user_text: &str, now: DateTime<Local>) -> String {
    format!("{}\n\n{}", context_preamble(now), user_text)
}

/// Multi-turn chat against the Gemini `generateContent` endpoint with
/// Google Search grounding.
///
/// Clones share the same conversation history.
#[derive(Clone)]
pub struct GeminiSession {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiSession {
    /// Create the process-wide session from configuration.
    /// Fails with `CredentialMissing` when no API key is configured.
    pub fn connect(config: &Config) -> Result<Self, SessionError> {
        Self::connect_with_env(config, |name| std::env::var(name).ok())
    }

    /// `connect` with environment variables read through `env`
    pub fn connect_with_env(
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SessionError> {
        let Some(api_key) = config.resolve_api_key_from(env) else {
            warn!("API_KEY not found in environment variables or config");
            return Err(SessionError::CredentialMissing);
        };
        Ok(Self::new(&api_key, config.model(), config.api_base_url()))
    }

    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of completed turns (one user + one model content each)
    pub async fn turns(&self) -> usize {
        self.history.lock().await.len() / 2
    }

    pub async fn send_at(
        &self,
        user_text: &str,
        now: DateTime<Local>,
    ) -> Result<ModelReply, SessionError> {
        let user_content = Content::text("user", &compose_prompt(user_text, now));

        let mut contents = self.history.lock().await.clone();
        contents.push(user_content.clone());

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(model = %self.model, turns = contents.len(), "sending generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest::new(&contents))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "Gemini API returned an error");
            return Err(SessionError::RequestFailed(format!(
                "Gemini API error {}: {}",
                status, text
            )));
        }

        let body: GenerateContentResponse = response.json().await?;
        let candidate = body.candidates.into_iter().next();

        let text = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(Content::joined_text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string());
        let citations = grounding_chunks(
            candidate
                .as_ref()
                .and_then(|c| c.grounding_metadata.as_ref()),
        );

        let mut history = self.history.lock().await;
        history.push(user_content);
        history.push(Content::text("model", &text));

        debug!(chars = text.len(), citations = citations.len(), "reply received");
        Ok(ModelReply { text, citations })
    }
}

impl ModelSession for GeminiSession {
    async fn send(&self, user_text: &str) -> Result<ModelReply, SessionError> {
        self.send_at(user_text, Local::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 5, 0).unwrap()
    }

    fn reply_body(text: &str, metadata: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "groundingMetadata": metadata
            }]
        })
    }

    #[test]
    fn test_preamble_has_spanish_date_and_time() {
        let preamble = context_preamble(fixed_now());
        assert!(preamble.starts_with("[SISTEMA: Fecha y Hora Real del Usuario: "));
        assert!(preamble.contains("viernes, 16 de octubre de 2026, 09:05"), "{preamble}");
    }

    #[test]
    fn test_prompt_keeps_user_text_verbatim_after_preamble() {
        let prompt = compose_prompt("  Betis vs Sevilla ", fixed_now());
        assert!(prompt.ends_with("]\n\n  Betis vs Sevilla "));
    }

    #[test]
    fn test_request_carries_fixed_configuration() {
        let contents = vec![Content::text("user", "hola")];
        let json = serde_json::to_value(GenerateContentRequest::new(&contents)).unwrap();
        assert_eq!(json["tools"], serde_json::json!([{ "googleSearch": {} }]));
        assert_eq!(json["safetySettings"].as_array().unwrap().len(), 4);
        assert!(json["safetySettings"]
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["threshold"] == "BLOCK_NONE"));
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"].as_str(),
            Some(SYSTEM_INSTRUCTION)
        );
        assert_eq!(json["contents"][0]["role"], "user");
    }

    #[test]
    fn test_grounding_chunks_tolerate_missing_and_malformed() {
        assert!(grounding_chunks(None).is_empty());
        assert!(grounding_chunks(Some(&serde_json::json!({}))).is_empty());
        assert!(grounding_chunks(Some(&serde_json::json!({ "groundingChunks": "nope" }))).is_empty());

        let metadata = serde_json::json!({
            "groundingChunks": [
                { "web": { "uri": "https://a.example", "title": "A" } },
                { "web": { "uri": 42 } },
                { "retrievedContext": {} },
                { "web": { "uri": "https://b.example" } }
            ]
        });
        let chunks = grounding_chunks(Some(&metadata));
        assert_eq!(
            chunks,
            vec![
                GroundingChunk::web("https://a.example", Some("A")),
                GroundingChunk { web: None },
                GroundingChunk::web("https://b.example", None),
            ]
        );
    }

    #[test]
    fn test_connect_without_key_is_credential_missing() {
        assert_eq!(
            GeminiSession::connect_with_env(&Config::new(), |_| None).err(),
            Some(SessionError::CredentialMissing)
        );

        let blank = Config {
            api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert_eq!(
            GeminiSession::connect_with_env(&blank, |_| None).err(),
            Some(SessionError::CredentialMissing)
        );
    }

    #[test]
    fn test_connect_uses_configured_key_and_model() {
        let config = Config {
            api_key: Some("file-key".to_string()),
            model: Some("gemini-2.5-pro".to_string()),
            ..Config::default()
        };
        let session = GeminiSession::connect_with_env(&config, |_| None).unwrap();
        assert_eq!(session.model(), "gemini-2.5-pro");
    }

    #[tokio::test]
    async fn test_send_returns_text_and_citations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({ "tools": [{ "googleSearch": {} }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body(
                "# 🐂 Betis vs Sevilla",
                serde_json::json!({
                    "groundingChunks": [{ "web": { "uri": "https://marca.example", "title": "Marca" } }]
                }),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let session = GeminiSession::new("test-key", "gemini-2.5-flash", &server.uri());
        let reply = session.send_at("Betis vs Sevilla", fixed_now()).await.unwrap();

        assert_eq!(reply.text, "# 🐂 Betis vs Sevilla");
        assert_eq!(
            reply.citations,
            vec![GroundingChunk::web("https://marca.example", Some("Marca"))]
        );
        assert_eq!(session.turns().await, 1);
    }

    #[tokio::test]
    async fn test_second_turn_sends_previous_turns() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("ok", serde_json::json!(null))))
            .mount(&server)
            .await;

        let session = GeminiSession::new("k", "gemini-2.5-flash", &server.uri());
        session.send_at("primero", fixed_now()).await.unwrap();
        session.send_at("segundo", fixed_now()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert!(contents[2]["parts"][0]["text"].as_str().unwrap().ends_with("segundo"));
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let session = GeminiSession::new("k", "gemini-2.5-flash", &server.uri());
        let reply = session.send_at("hola", fixed_now()).await.unwrap();
        assert_eq!(reply.text, EMPTY_REPLY_FALLBACK);
        assert!(reply.citations.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_key_surfaces_as_setup_error_and_records_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "details": [{ "reason": "API_KEY_INVALID" }]
                }
            })))
            .mount(&server)
            .await;

        let session = GeminiSession::new("bad", "gemini-2.5-flash", &server.uri());
        let err = session.send_at("hola", fixed_now()).await.unwrap_err();
        assert!(matches!(err, SessionError::RequestFailed(_)));
        assert!(err.needs_setup());
        assert_eq!(session.turns().await, 0);
    }

    #[tokio::test]
    async fn test_server_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let session = GeminiSession::new("k", "gemini-2.5-flash", &server.uri());
        let err = session.send_at("hola", fixed_now()).await.unwrap_err();
        assert!(!err.needs_setup());
        assert!(err.to_string().contains("503"));
    }
}
