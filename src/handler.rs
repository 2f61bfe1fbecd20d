use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputField, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_search_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Half-page scroll (before the plain 'u' arm below)
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half_page = app.panel_viewport[app.selected_panel] / 2;
            app.scroll_panel_down(app.selected_panel, half_page.max(1));
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half_page = app.panel_viewport[app.selected_panel] / 2;
            app.scroll_panel_up(app.selected_panel, half_page.max(1));
        }

        // Back to the form
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
            app.focused_field = InputField::Query;
        }
        KeyCode::Char('u') => {
            app.input_mode = InputMode::Editing;
            app.focused_field = InputField::Url;
        }

        // Re-run the current form contents (no-op while a search is in flight)
        KeyCode::Enter => app.start_search(),

        // Panel selection
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => app.select_next_panel(),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => app.select_prev_panel(),
        KeyCode::Char('1') => app.selected_panel = 0,
        KeyCode::Char('2') => app.selected_panel = 1,
        KeyCode::Char('3') => app.selected_panel = 2,

        // Panel scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_panel_down(app.selected_panel, 1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_panel_up(app.selected_panel, 1),
        KeyCode::Char('g') => app.scroll_panel_to_top(app.selected_panel),
        KeyCode::Char('G') => app.scroll_panel_to_bottom(app.selected_panel),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    // The form is inert while a search is in flight
    if app.is_searching {
        if key.code == KeyCode::Esc {
            app.input_mode = InputMode::Normal;
        }
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
            app.toggle_field();
        }
        KeyCode::Enter => {
            app.start_search();
            if app.is_searching {
                // Hand focus to the panels while results stream in
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => {
            let (input, cursor) = app.focused_input();
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let (input, cursor) = app.focused_input();
            if *cursor < input.chars().count() {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            let (_, cursor) = app.focused_input();
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let (input, cursor) = app.focused_input();
            *cursor = (*cursor + 1).min(input.chars().count());
        }
        KeyCode::Home => {
            let (_, cursor) = app.focused_input();
            *cursor = 0;
        }
        KeyCode::End => {
            let (input, cursor) = app.focused_input();
            *cursor = input.chars().count();
        }
        KeyCode::Char(c) => {
            let (input, cursor) = app.focused_input();
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let hovered = app
        .panel_areas
        .iter()
        .position(|area| area.map(|r| point_in_rect(mouse.column, mouse.row, r)).unwrap_or(false));

    let Some(panel) = hovered else {
        return;
    };

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_panel_down(panel, 3),
        MouseEventKind::ScrollUp => app.scroll_panel_up(panel, 3),
        MouseEventKind::Down(_) => app.selected_panel = panel,
        _ => {}
    }
}
