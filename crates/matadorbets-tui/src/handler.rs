use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use matadorbets_core::markdown::clean_markdown;
use tracing::warn;

use crate::app::{App, ANALYSIS_COPIED_STATUS, NOTHING_TO_COPY_STATUS, SHARE_COPIED_STATUS};
use crate::clipboard::copy_to_clipboard;
use crate::tui::AppEvent;

const PAGE_LINES: u16 = 10;
const WHEEL_LINES: u16 = 3;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        // The next draw picks up the new size
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick();
            app.poll_pending().await;
        }
    }
    Ok(())
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if is_ctrl(&key, 'c') {
        app.should_quit = true;
        return;
    }

    if app.confirm_clear {
        handle_confirm_clear(app, key);
    } else if app.history_panel.is_some() {
        handle_history_panel(app, key);
    } else {
        handle_chat(app, key);
    }
}

fn handle_confirm_clear(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y' | 'Y' | 's' | 'S') => app.confirm_clear_history(true),
        KeyCode::Char('n' | 'N') | KeyCode::Esc => app.confirm_clear_history(false),
        _ => {}
    }
}

fn handle_history_panel(app: &mut App, key: KeyEvent) {
    if is_ctrl(&key, 'h') {
        app.close_history();
        return;
    }
    if is_ctrl(&key, 'd') {
        app.request_clear_history();
        return;
    }
    if is_ctrl(&key, 'y') {
        copy_analysis(app);
        return;
    }

    let detail_open = app
        .history_panel
        .as_ref()
        .is_some_and(|panel| panel.open_id.is_some());

    if detail_open {
        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Left => app.close_history_detail(),
            KeyCode::Down => app.history_detail_scroll_down(1),
            KeyCode::PageDown => app.history_detail_scroll_down(PAGE_LINES),
            KeyCode::Up => app.history_detail_scroll_up(1),
            KeyCode::PageUp => app.history_detail_scroll_up(PAGE_LINES),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.close_history(),
        KeyCode::Down => app.history_nav_down(),
        KeyCode::Up => app.history_nav_up(),
        KeyCode::Enter | KeyCode::Right => app.open_selected_history(),
        KeyCode::Backspace => app.history_search_pop(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.history_search_push(c)
        }
        _ => {}
    }
}

fn handle_chat(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('h') => app.open_history(),
            KeyCode::Char('d') => app.request_clear_history(),
            KeyCode::Char('s') => share(app),
            KeyCode::Char('y') => copy_analysis(app),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit_input(),
        KeyCode::F(n @ 1..=6) => app.send_suggestion(usize::from(n) - 1),
        KeyCode::PageUp => app.scroll_up(PAGE_LINES),
        KeyCode::PageDown => app.scroll_down(PAGE_LINES),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Esc => app.status = None,
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_home(),
        KeyCode::End => app.move_cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

fn share(app: &mut App) {
    match copy_to_clipboard(&app.share_text()) {
        Ok(()) => app.set_status(SHARE_COPIED_STATUS),
        Err(e) => {
            warn!(error = %e, "share failed");
            app.set_status(format!("No se pudo copiar: {}", e));
        }
    }
}

/// Copy the opened history entry, or the latest chat analysis, as plain text
fn copy_analysis(app: &mut App) {
    let Some(text) = app.copy_source().map(clean_markdown) else {
        app.set_status(NOTHING_TO_COPY_STATUS);
        return;
    };
    match copy_to_clipboard(&text) {
        Ok(()) => app.set_status(ANALYSIS_COPIED_STATUS),
        Err(e) => {
            warn!(error = %e, "copy failed");
            app.set_status(format!("No se pudo copiar: {}", e));
        }
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let detail_open = app
        .history_panel
        .as_ref()
        .is_some_and(|panel| panel.open_id.is_some());

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if detail_open {
                app.history_detail_scroll_down(WHEEL_LINES);
            } else if app.history_panel.is_some() {
                app.history_nav_down();
            } else {
                app.scroll_down(WHEEL_LINES);
            }
        }
        MouseEventKind::ScrollUp => {
            if detail_open {
                app.history_detail_scroll_up(WHEEL_LINES);
            } else if app.history_panel.is_some() {
                app.history_nav_up();
            } else {
                app.scroll_up(WHEEL_LINES);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use matadorbets_core::{ChatController, HistoryItem, HistoryStore, MemoryBlobStore};
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..key(KeyCode::Char(c))
        }
    }

    fn test_app() -> App {
        let mut history = HistoryStore::load(Box::new(MemoryBlobStore::new()));
        history
            .append(HistoryItem {
                id: "1".to_string(),
                timestamp: 1_700_000_000_000,
                match_title: "PSG vs Lyon".to_string(),
                summary: "🏆 PSG".to_string(),
                full_content: "# 🐂 PSG vs Lyon".to_string(),
                grounding_chunks: None,
            })
            .unwrap();
        App::new(ChatController::new(), history, None, None)
    }

    #[test]
    fn test_ctrl_c_quits_from_any_mode() {
        let mut app = test_app();
        app.open_history();
        handle_key(&mut app, ctrl('c'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_typing_goes_to_input_in_chat_mode() {
        let mut app = test_app();
        for c in "hola".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        assert_eq!(app.input, "hola");
        assert_eq!(app.input_cursor, 4);
    }

    #[test]
    fn test_typing_goes_to_search_in_history_panel() {
        let mut app = test_app();
        handle_key(&mut app, ctrl('h'));
        assert!(app.history_panel.is_some());

        handle_key(&mut app, key(KeyCode::Char('p')));
        handle_key(&mut app, key(KeyCode::Char('s')));
        assert_eq!(app.history_panel.as_ref().unwrap().search, "ps");
        assert!(app.input.is_empty());

        handle_key(&mut app, key(KeyCode::Enter));
        assert_eq!(app.opened_history_item().map(|i| i.id.as_str()), Some("1"));

        // Esc closes the detail first, then the panel
        handle_key(&mut app, key(KeyCode::Esc));
        assert!(app.history_panel.is_some());
        assert!(app.opened_history_item().is_none());
        handle_key(&mut app, key(KeyCode::Esc));
        assert!(app.history_panel.is_none());
    }

    #[test]
    fn test_clear_prompt_swallows_keys_until_answered() {
        let mut app = test_app();
        handle_key(&mut app, ctrl('d'));
        assert!(app.confirm_clear);

        handle_key(&mut app, key(KeyCode::Char('x')));
        assert!(app.confirm_clear);
        assert!(app.input.is_empty());

        handle_key(&mut app, key(KeyCode::Char('n')));
        assert!(!app.confirm_clear);
        assert_eq!(app.history.len(), 1);

        handle_key(&mut app, ctrl('d'));
        handle_key(&mut app, key(KeyCode::Char('y')));
        assert!(app.history.is_empty());
    }

    #[test]
    fn test_detail_scroll_keys_stop_at_bottom() {
        let mut app = test_app();
        handle_key(&mut app, ctrl('h'));
        handle_key(&mut app, key(KeyCode::Enter));
        app.set_history_detail_max_scroll(4);

        handle_key(&mut app, key(KeyCode::PageDown));
        handle_key(&mut app, key(KeyCode::Down));
        assert_eq!(app.history_panel.as_ref().unwrap().detail_scroll, 4);

        handle_key(&mut app, key(KeyCode::Up));
        assert_eq!(app.history_panel.as_ref().unwrap().detail_scroll, 3);
    }

    #[test]
    fn test_function_key_sends_suggestion() {
        let mut app = test_app();
        handle_key(&mut app, key(KeyCode::F(1)));
        // Greeting, user query, setup notice (no session configured)
        assert_eq!(app.chat.messages().len(), 3);

        let len = app.chat.messages().len();
        handle_key(&mut app, key(KeyCode::F(7)));
        assert_eq!(app.chat.messages().len(), len);
    }
}
