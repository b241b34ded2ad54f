use std::io::Write;
use std::process::{Command, Stdio};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.on_tick(),
        AppEvent::Action(action) => app.dispatch(action),
        AppEvent::Recognition { session, event } => app.on_recognition(session, event),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    app.notice = None;

    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    // The delete modal swallows everything but its answer
    if app.confirm_delete.is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_delete(),
            _ => {}
        }
        return;
    }

    if ctrl {
        match key.code {
            KeyCode::Char('b') => app.toggle_sidebar(),
            KeyCode::Char('n') => app.new_conversation(),
            KeyCode::Char('r') => app.toggle_listen(),
            KeyCode::Char('s') => app.speak_target(),
            KeyCode::Char('u') => app.scroll_up(app.timeline_height / 2),
            KeyCode::Char('d') => app.scroll_down(app.timeline_height / 2),
            _ => {}
        }
        return;
    }

    match (app.focus, app.input_mode) {
        (FocusPane::Sidebar, _) => handle_sidebar(app, key),
        (FocusPane::Timeline, InputMode::Editing) => handle_editing(app, key),
        (FocusPane::Timeline, InputMode::Normal) => handle_timeline(app, key),
    }
}

fn handle_sidebar(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.sidebar_down(),
        KeyCode::Char('k') | KeyCode::Up => app.sidebar_up(),
        KeyCode::Enter | KeyCode::Char('l') => app.open_selected_conversation(),
        KeyCode::Char('n') => app.new_conversation(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char(c @ '0'..='4') => app.pick_background(c),
        KeyCode::Esc | KeyCode::Tab | KeyCode::Char('h') => app.toggle_sidebar(),
        KeyCode::Char('q') => app.should_quit = true,
        _ => {}
    }
}

fn handle_timeline(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('j') | KeyCode::Down => app.select_next_message(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev_message(),
        KeyCode::Esc => app.clear_selection(),
        KeyCode::Char('s') => app.speak_target(),
        KeyCode::Char('c') => {
            if let Some(text) = app.action_target().map(|m| m.text().to_string()) {
                app.notice = Some(if copy_to_clipboard(&text) {
                    "कॉपी हो गया".to_string()
                } else {
                    "क्लिपबोर्ड उपलब्ध नहीं है".to_string()
                });
            }
        }
        KeyCode::Char('n') => app.new_conversation(),
        KeyCode::Char('m') => app.toggle_listen(),
        KeyCode::Tab | KeyCode::Char('b') => app.toggle_sidebar(),
        KeyCode::PageUp => app.scroll_up(app.timeline_height),
        KeyCode::PageDown => app.scroll_down(app.timeline_height),
        KeyCode::Char('G') | KeyCode::End => app.follow_bottom = true,
        _ => {}
    }
}

fn handle_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            return;
        }
        // Still stops listening while a reply streams
        KeyCode::Enter => {
            app.submit();
            return;
        }
        _ => {}
    }
    // The input line is read-only while a reply is streaming
    if app.state.is_loading() {
        return;
    }

    match key.code {
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.input_cursor = 0,
        KeyCode::End => app.input_cursor = app.input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);
    let in_sidebar = app.sidebar_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_timeline = app.timeline_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::ScrollDown if in_sidebar => app.sidebar_down(),
        MouseEventKind::ScrollUp if in_sidebar => app.sidebar_up(),
        MouseEventKind::ScrollDown if in_timeline => app.scroll_down(3),
        MouseEventKind::ScrollUp if in_timeline => app.scroll_up(3),
        _ => {}
    }
}

/// Pipe text into the first clipboard tool that accepts it.
fn copy_to_clipboard(text: &str) -> bool {
    const TOOLS: [&[&str]; 3] = [
        &["pbcopy"],
        &["wl-copy"],
        &["xclip", "-selection", "clipboard"],
    ];

    for tool in TOOLS {
        let Ok(mut child) = Command::new(tool[0])
            .args(&tool[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };
        let written = child
            .stdin
            .take()
            .is_some_and(|mut stdin| stdin.write_all(text.as_bytes()).is_ok());
        let ok = child.wait().map(|status| status.success()).unwrap_or(false);
        if written && ok {
            tracing::debug!("Copied {} bytes with {}", text.len(), tool[0]);
            return true;
        }
    }
    tracing::warn!("No clipboard tool available");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use saheli_core::storage::MemoryStore;
    use saheli_core::{Config, Persistence};
    use tokio::sync::mpsc;

    #[test]
    fn test_char_to_byte_index_devanagari() {
        let s = "नमस्ते";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 3);
        assert_eq!(char_to_byte_index(s, 6), s.len());
        assert_eq!(char_to_byte_index(s, 99), s.len());
    }

    #[test]
    fn test_point_in_rect_edges() {
        let rect = Rect::new(2, 2, 3, 3);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(4, 4, rect));
        assert!(!point_in_rect(5, 4, rect));
        assert!(!point_in_rect(1, 3, rect));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_enter_while_loading_stops_listening() {
        let config = Config {
            api_key: Some("test-key".to_string()),
            api_base_url: "http://127.0.0.1:9".to_string(),
            recognizer_command: Some(vec!["sleep".to_string(), "30".to_string()]),
            ..Config::new()
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&config, Persistence::new(MemoryStore::new()), tx);
        app.set_input("hi".to_string());
        app.submit();
        assert!(app.state.is_loading());

        app.toggle_listen();
        assert!(app.speech_input.is_listening());
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        handle_event(&mut app, AppEvent::Key(enter));
        assert!(!app.speech_input.is_listening());

        // Typing stays blocked until the reply lands
        handle_event(&mut app, AppEvent::Key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE)));
        assert!(app.input.is_empty());
    }
}
