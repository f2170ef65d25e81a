use matadorbets_core::persona::{LOADING_MESSAGES, SHARE_TEXT, SHARE_TITLE, SUGGESTIONS};
use matadorbets_core::{
    ChatController, GeminiSession, HistoryItem, HistoryStore, ModelReply, ModelSession,
    Resolution, SessionError,
};
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::tui::TICK_RATE;

/// Loading phrase rotation period
const LOADING_ROTATE_MS: u128 = 2_500;
/// How long a status message stays in the status line
const STATUS_TTL_MS: u128 = 4_000;

pub const SHARE_COPIED_STATUS: &str = "Enlace copiado al portapapeles. ¡Pásalo a tus amigos!";
pub const ANALYSIS_COPIED_STATUS: &str = "Análisis copiado al portapapeles.";
pub const NOTHING_TO_COPY_STATUS: &str = "Todavía no hay ningún análisis que copiar.";
pub const HISTORY_CLEARED_STATUS: &str = "Historial borrado.";
pub const HISTORY_SAVE_FAILED_STATUS: &str =
    "No se pudo guardar el análisis en el historial; se perderá al salir.";

/// History modal state. The panel is open while `App::history_panel` is
/// `Some`.
#[derive(Debug, Default)]
pub struct HistoryPanel {
    pub search: String,
    pub list_state: ListState,
    /// Entry opened with Enter, shown in the detail pane
    pub open_id: Option<String>,
    pub detail_scroll: u16,
    /// Refreshed on every draw of the detail pane
    pub detail_max_scroll: u16,
}

pub struct App {
    pub should_quit: bool,

    // Conversation
    pub chat: ChatController,
    pub history: HistoryStore,
    pub session: Option<GeminiSession>,
    pub pending: Option<JoinHandle<Result<ModelReply, SessionError>>>,
    pub share_url: Option<String>,

    // Input box
    pub input: String,
    pub input_cursor: usize, // in chars, not bytes

    // Chat scrolling; `chat_max_scroll` is refreshed on every draw
    pub chat_scroll: u16,
    pub chat_max_scroll: u16,
    pub follow_bottom: bool,

    // Overlays
    pub history_panel: Option<HistoryPanel>,
    pub confirm_clear: bool,

    // Status line
    pub status: Option<String>,
    status_age_ms: u128,

    // Loading animation
    pub loading_index: usize,
    loading_age_ms: u128,
}

impl App {
    pub fn new(
        chat: ChatController,
        history: HistoryStore,
        session: Option<GeminiSession>,
        share_url: Option<String>,
    ) -> Self {
        Self {
            should_quit: false,
            chat,
            history,
            session,
            pending: None,
            share_url,
            input: String::new(),
            input_cursor: 0,
            chat_scroll: 0,
            chat_max_scroll: 0,
            follow_bottom: true,
            history_panel: None,
            confirm_clear: false,
            status: None,
            status_age_ms: 0,
            loading_index: 0,
            loading_age_ms: 0,
        }
    }

    pub fn model_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.model())
    }

    pub fn is_loading(&self) -> bool {
        self.chat.is_awaiting_response()
    }

    pub fn loading_message(&self) -> &'static str {
        LOADING_MESSAGES[self.loading_index % LOADING_MESSAGES.len()]
    }

    /// Send whatever is in the input box. The box is only cleared when the
    /// message is accepted.
    pub fn submit_input(&mut self) {
        let text = self.input.clone();
        if self.send(&text) {
            self.input.clear();
            self.input_cursor = 0;
        }
    }

    /// Send the preset query behind suggestion `index` (0-based)
    pub fn send_suggestion(&mut self, index: usize) {
        if let Some(suggestion) = SUGGESTIONS.get(index) {
            info!(label = suggestion.label, "suggestion picked");
            self.send(suggestion.query);
        }
    }

    /// Submit `text` and spawn the model request. Returns false when the
    /// controller dropped it (blank, or a reply is still pending).
    pub fn send(&mut self, text: &str) -> bool {
        let Some(request) = self.chat.submit(text) else {
            return false;
        };

        self.loading_index = 0;
        self.loading_age_ms = 0;
        self.scroll_to_bottom();

        match self.session.clone() {
            Some(session) => {
                self.pending = Some(tokio::spawn(async move { session.send(&request.text).await }));
            }
            None => {
                // Nothing to call; fail the turn right away so the setup
                // instructions show up
                let resolution = self
                    .chat
                    .resolve(Err(SessionError::CredentialMissing), &mut self.history);
                self.after_resolution(resolution);
            }
        }
        true
    }

    /// Settle the pending request if its task has finished
    pub async fn poll_pending(&mut self) {
        let finished = self.pending.as_ref().is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }
        let Some(task) = self.pending.take() else {
            return;
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "model request task failed");
                Err(SessionError::RequestFailed(e.to_string()))
            }
        };
        let resolution = self.chat.resolve(result, &mut self.history);
        self.after_resolution(resolution);
    }

    fn after_resolution(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Saved => info!(entries = self.history.len(), "history updated"),
            Resolution::SaveFailed => self.set_status(HISTORY_SAVE_FAILED_STATUS),
            Resolution::Answered | Resolution::Failed | Resolution::Ignored => {}
        }
        self.scroll_to_bottom();
    }

    /// Advance timers by one tick: loading phrase rotation and status expiry
    pub fn tick(&mut self) {
        let step = TICK_RATE.as_millis();

        if self.is_loading() {
            self.loading_age_ms += step;
            if self.loading_age_ms >= LOADING_ROTATE_MS {
                self.loading_age_ms = 0;
                self.loading_index = (self.loading_index + 1) % LOADING_MESSAGES.len();
            }
        }

        if self.status.is_some() {
            self.status_age_ms += step;
            if self.status_age_ms >= STATUS_TTL_MS {
                self.status = None;
            }
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
        self.status_age_ms = 0;
    }

    /// Text placed on the clipboard by the share action
    pub fn share_text(&self) -> String {
        match &self.share_url {
            Some(url) => format!("{} - {}\n{}", SHARE_TITLE, SHARE_TEXT, url),
            None => format!("{} - {}", SHARE_TITLE, SHARE_TEXT),
        }
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_max_scroll);
        self.follow_bottom = self.chat_scroll >= self.chat_max_scroll;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.chat_scroll = self.chat_max_scroll;
    }

    /// Called by the renderer once it knows how tall the transcript is
    pub fn set_chat_max_scroll(&mut self, max: u16) {
        self.chat_max_scroll = max;
        if self.follow_bottom || self.chat_scroll > max {
            self.chat_scroll = max;
        }
    }

    // History panel

    pub fn open_history(&mut self) {
        let mut panel = HistoryPanel::default();
        if !self.history.is_empty() {
            panel.list_state.select(Some(0));
        }
        self.history_panel = Some(panel);
    }

    pub fn close_history(&mut self) {
        self.history_panel = None;
    }

    /// Entries matching the current search, newest first
    pub fn history_results(&self) -> Vec<&HistoryItem> {
        let term = self
            .history_panel
            .as_ref()
            .map(|p| p.search.as_str())
            .unwrap_or("");
        self.history.search(term)
    }

    pub fn history_search_push(&mut self, c: char) {
        if let Some(panel) = self.history_panel.as_mut() {
            panel.search.push(c);
        }
        self.reset_history_selection();
    }

    pub fn history_search_pop(&mut self) {
        if let Some(panel) = self.history_panel.as_mut() {
            panel.search.pop();
        }
        self.reset_history_selection();
    }

    fn reset_history_selection(&mut self) {
        let has_results = !self.history_results().is_empty();
        if let Some(panel) = self.history_panel.as_mut() {
            panel.list_state.select(has_results.then_some(0));
        }
    }

    pub fn history_nav_down(&mut self) {
        let count = self.history_results().len();
        if let Some(panel) = self.history_panel.as_mut() {
            if count > 0 {
                let i = panel.list_state.selected().map_or(0, |i| (i + 1).min(count - 1));
                panel.list_state.select(Some(i));
            }
        }
    }

    pub fn history_nav_up(&mut self) {
        let count = self.history_results().len();
        if let Some(panel) = self.history_panel.as_mut() {
            if count > 0 {
                let i = panel.list_state.selected().map_or(0, |i| i.saturating_sub(1));
                panel.list_state.select(Some(i));
            }
        }
    }

    /// Open the highlighted entry in the detail pane
    pub fn open_selected_history(&mut self) {
        let selected_id = self.history_panel.as_ref().and_then(|panel| {
            let index = panel.list_state.selected()?;
            self.history_results().get(index).map(|item| item.id.clone())
        });
        if let (Some(panel), Some(id)) = (self.history_panel.as_mut(), selected_id) {
            panel.open_id = Some(id);
            panel.detail_scroll = 0;
            panel.detail_max_scroll = 0;
        }
    }

    pub fn close_history_detail(&mut self) {
        if let Some(panel) = self.history_panel.as_mut() {
            panel.open_id = None;
            panel.detail_scroll = 0;
            panel.detail_max_scroll = 0;
        }
    }

    pub fn opened_history_item(&self) -> Option<&HistoryItem> {
        let id = self.history_panel.as_ref()?.open_id.as_deref()?;
        self.history.get(id)
    }

    pub fn history_detail_scroll_up(&mut self, lines: u16) {
        if let Some(panel) = self.history_panel.as_mut() {
            panel.detail_scroll = panel.detail_scroll.saturating_sub(lines);
        }
    }

    pub fn history_detail_scroll_down(&mut self, lines: u16) {
        if let Some(panel) = self.history_panel.as_mut() {
            panel.detail_scroll = panel
                .detail_scroll
                .saturating_add(lines)
                .min(panel.detail_max_scroll);
        }
    }

    /// Called by the renderer once it knows how tall the opened entry is
    pub fn set_history_detail_max_scroll(&mut self, max: u16) {
        if let Some(panel) = self.history_panel.as_mut() {
            panel.detail_max_scroll = max;
            panel.detail_scroll = panel.detail_scroll.min(max);
        }
    }

    /// Raw markdown for the copy action: the entry open in the history
    /// detail pane, otherwise the latest analysis in the chat
    pub fn copy_source(&self) -> Option<&str> {
        match self.opened_history_item() {
            Some(item) => Some(item.full_content.as_str()),
            None => self.chat.last_analysis().map(|m| m.text()),
        }
    }

    // Clearing

    pub fn request_clear_history(&mut self) {
        if !self.history.is_empty() {
            self.confirm_clear = true;
        }
    }

    /// Answer to the clear-history prompt
    pub fn confirm_clear_history(&mut self, confirmed: bool) {
        self.confirm_clear = false;
        if !confirmed {
            return;
        }

        // Write failures are logged by the store; memory is cleared either way
        if self.history.clear().is_ok() {
            info!("history cleared");
        }
        if let Some(panel) = self.history_panel.as_mut() {
            *panel = HistoryPanel::default();
        }
        self.set_status(HISTORY_CLEARED_STATUS);
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn move_cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matadorbets_core::persona::CRITICAL_ERROR_MESSAGE;
    use matadorbets_core::{ChatRole, MemoryBlobStore};
    use pretty_assertions::assert_eq;

    const ANALYSIS: &str = "# 🐂 Real Madrid vs Barcelona\n\n\
                            | Mercado | Pick | Cuota | Confianza |\n\
                            | :--- | :--- | :--- | :--- |\n\
                            | 🏆 Ganador | Real Madrid | @1.90 | 💎 ALTA |\n";

    fn test_app() -> App {
        let history = HistoryStore::load(Box::new(MemoryBlobStore::new()));
        App::new(ChatController::new(), history, None, None)
    }

    fn app_with_history(titles: &[&str]) -> App {
        let mut app = test_app();
        for (i, title) in titles.iter().enumerate() {
            let item = HistoryItem {
                id: i.to_string(),
                timestamp: 1_700_000_000_000 + i as i64,
                match_title: title.to_string(),
                summary: "🏆 Local".to_string(),
                full_content: format!("# 🐂 {}", title),
                grounding_chunks: None,
            };
            app.history.append(item).unwrap();
        }
        app
    }

    #[test]
    fn test_send_without_session_shows_setup_notice() {
        let mut app = test_app();
        app.input = "Betis vs Sevilla".to_string();
        app.input_cursor = app.input.chars().count();

        app.submit_input();

        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
        assert!(!app.is_loading());
        assert!(app.pending.is_none());
        let messages = app.chat.messages();
        assert_eq!(messages[messages.len() - 2].role, ChatRole::User);
        let last = messages.last().unwrap();
        assert!(last.is_error);
        assert!(last.is_setup_notice());
    }

    #[test]
    fn test_blank_input_is_kept_and_not_sent() {
        let mut app = test_app();
        app.input = "   ".to_string();
        app.submit_input();
        assert_eq!(app.input, "   ");
        assert_eq!(app.chat.messages().len(), 1);
    }

    #[test]
    fn test_suggestion_sends_preset_query() {
        let mut app = test_app();
        app.send_suggestion(2);
        let user = app
            .chat
            .messages()
            .iter()
            .find(|m| m.role == ChatRole::User)
            .unwrap();
        assert_eq!(user.text(), SUGGESTIONS[2].query);

        // Out of range does nothing
        let len = app.chat.messages().len();
        app.send_suggestion(6);
        assert_eq!(app.chat.messages().len(), len);
    }

    #[tokio::test]
    async fn test_poll_pending_resolves_finished_task() {
        let mut app = test_app();
        app.chat.submit("Real Madrid vs Barcelona").unwrap();
        app.pending = Some(tokio::spawn(async {
            Ok(ModelReply {
                text: ANALYSIS.to_string(),
                citations: Vec::new(),
            })
        }));

        while app.pending.as_ref().is_some_and(|t| !t.is_finished()) {
            tokio::task::yield_now().await;
        }
        app.poll_pending().await;

        assert!(app.pending.is_none());
        assert!(!app.is_loading());
        assert_eq!(app.history.len(), 1);
        assert_eq!(app.history.items()[0].match_title, "Real Madrid vs Barcelona");
    }

    #[tokio::test]
    async fn test_poll_pending_reports_request_failure() {
        let mut app = test_app();
        app.chat.submit("Betis vs Sevilla").unwrap();
        app.pending = Some(tokio::spawn(async {
            Err(SessionError::RequestFailed("503".to_string()))
        }));

        while app.pending.as_ref().is_some_and(|t| !t.is_finished()) {
            tokio::task::yield_now().await;
        }
        app.poll_pending().await;

        let last = app.chat.messages().last().unwrap();
        assert!(last.is_error);
        assert_eq!(last.text(), CRITICAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_loading_message_rotates_every_two_and_a_half_seconds() {
        let mut app = test_app();
        app.chat.submit("Betis vs Sevilla").unwrap();
        assert_eq!(app.loading_message(), LOADING_MESSAGES[0]);

        let ticks_per_phrase = (LOADING_ROTATE_MS / TICK_RATE.as_millis()) as usize;
        for _ in 0..ticks_per_phrase - 1 {
            app.tick();
        }
        assert_eq!(app.loading_index, 0);
        app.tick();
        assert_eq!(app.loading_index, 1);

        for _ in 0..ticks_per_phrase * 7 {
            app.tick();
        }
        assert_eq!(app.loading_index, 0);
    }

    #[test]
    fn test_status_expires() {
        let mut app = test_app();
        app.set_status(SHARE_COPIED_STATUS);
        for _ in 0..(STATUS_TTL_MS / TICK_RATE.as_millis()) {
            app.tick();
        }
        assert_eq!(app.status, None);
    }

    #[test]
    fn test_share_text_includes_configured_url() {
        let mut app = test_app();
        assert!(!app.share_text().contains("http"));
        app.share_url = Some("https://matadorbets.example".to_string());
        assert!(app.share_text().ends_with("\nhttps://matadorbets.example"));
        assert!(app.share_text().starts_with(SHARE_TITLE));
    }

    #[test]
    fn test_history_search_and_detail() {
        let mut app = app_with_history(&["PSG vs Lyon", "Real Madrid vs Barca"]);
        app.open_history();
        assert_eq!(app.history_results().len(), 2);

        for c in "real".chars() {
            app.history_search_push(c);
        }
        let titles: Vec<&str> = app
            .history_results()
            .iter()
            .map(|i| i.match_title.as_str())
            .collect();
        assert_eq!(titles, vec!["Real Madrid vs Barca"]);

        app.open_selected_history();
        assert_eq!(
            app.opened_history_item().map(|i| i.match_title.as_str()),
            Some("Real Madrid vs Barca")
        );

        app.close_history_detail();
        assert!(app.opened_history_item().is_none());

        for _ in 0..4 {
            app.history_search_pop();
        }
        assert_eq!(app.history_results().len(), 2);
    }

    #[test]
    fn test_history_detail_scroll_is_bounded() {
        let mut app = app_with_history(&["PSG vs Lyon"]);
        app.open_history();
        app.open_selected_history();
        app.set_history_detail_max_scroll(12);

        app.history_detail_scroll_down(10);
        app.history_detail_scroll_down(10);
        assert_eq!(app.history_panel.as_ref().unwrap().detail_scroll, 12);

        // A narrower pane shrinks the bound and pulls the offset back
        app.set_history_detail_max_scroll(5);
        assert_eq!(app.history_panel.as_ref().unwrap().detail_scroll, 5);

        app.history_detail_scroll_up(100);
        assert_eq!(app.history_panel.as_ref().unwrap().detail_scroll, 0);
    }

    #[test]
    fn test_copy_source_prefers_opened_history_entry() {
        let mut app = app_with_history(&["PSG vs Lyon"]);
        assert_eq!(app.copy_source(), app.chat.last_analysis().map(|m| m.text()));

        app.open_history();
        // List showing, nothing opened yet: still the chat answer
        assert_ne!(app.copy_source(), Some("# 🐂 PSG vs Lyon"));
        app.open_selected_history();
        assert_eq!(app.copy_source(), Some("# 🐂 PSG vs Lyon"));

        app.close_history_detail();
        assert_ne!(app.copy_source(), Some("# 🐂 PSG vs Lyon"));
    }

    #[test]
    fn test_failed_history_write_sets_status() {
        let mut app = test_app();
        app.chat.submit("Real Madrid vs Barcelona").unwrap();
        app.after_resolution(Resolution::SaveFailed);
        assert_eq!(app.status.as_deref(), Some(HISTORY_SAVE_FAILED_STATUS));
    }

    #[test]
    fn test_history_nav_stays_in_bounds() {
        let mut app = app_with_history(&["A vs B", "C vs D"]);
        app.open_history();
        let selected = |app: &App| app.history_panel.as_ref().unwrap().list_state.selected();

        app.history_nav_up();
        assert_eq!(selected(&app), Some(0));
        app.history_nav_down();
        app.history_nav_down();
        assert_eq!(selected(&app), Some(1));
    }

    #[test]
    fn test_clear_history_needs_confirmation() {
        let mut app = app_with_history(&["PSG vs Lyon"]);

        app.request_clear_history();
        assert!(app.confirm_clear);
        app.confirm_clear_history(false);
        assert!(!app.confirm_clear);
        assert_eq!(app.history.len(), 1);

        app.request_clear_history();
        app.confirm_clear_history(true);
        assert!(app.history.is_empty());
        assert_eq!(app.status.as_deref(), Some(HISTORY_CLEARED_STATUS));

        // Nothing left to clear: no prompt
        app.request_clear_history();
        assert!(!app.confirm_clear);
    }

    #[test]
    fn test_scrolling_follows_bottom_until_user_scrolls_up() {
        let mut app = test_app();
        app.set_chat_max_scroll(30);
        assert_eq!(app.chat_scroll, 30);

        app.scroll_up(10);
        app.set_chat_max_scroll(40);
        assert_eq!(app.chat_scroll, 20);

        app.scroll_down(100);
        assert_eq!(app.chat_scroll, 40);
        assert!(app.follow_bottom);
    }

    #[test]
    fn test_utf8_cursor_editing() {
        let mut app = test_app();
        for c in "Barça".chars() {
            app.insert_char(c);
        }
        app.move_cursor_left();
        app.delete_before_cursor();
        assert_eq!(app.input, "Bara");
        app.move_cursor_home();
        app.delete_at_cursor();
        assert_eq!(app.input, "ara");
        app.move_cursor_end();
        assert_eq!(app.input_cursor, 3);
    }
}
