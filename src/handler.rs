use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return Ok(());
    }

    if app.settings_modal.is_open() {
        handle_settings_key(app, key);
    } else {
        handle_chat_key(app, key);
    }
    Ok(())
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Esc => app.quit(),
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_chat();
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.settings_modal.open(&app.settings);
        }

        // Chat scrolling
        KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Down => app.scroll_chat_down(),
        KeyCode::PageUp => app.scroll_page_up(),
        KeyCode::PageDown => app.scroll_page_down(),

        // Draft editing
        KeyCode::Backspace => app.session.draft.backspace(),
        KeyCode::Delete => app.session.draft.delete_forward(),
        KeyCode::Left => app.session.draft.move_left(),
        KeyCode::Right => app.session.draft.move_right(),
        KeyCode::Home => app.session.draft.move_home(),
        KeyCode::End => app.session.draft.move_end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.session.draft.insert_char(c);
        }
        _ => {}
    }
}

fn handle_settings_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.settings_modal.cancel(),
        KeyCode::Enter => app.settings_modal.save(),
        KeyCode::Tab | KeyCode::Down => app.settings_modal.focus_next(&app.settings),
        KeyCode::BackTab | KeyCode::Up => app.settings_modal.focus_prev(&app.settings),
        KeyCode::Backspace => app.settings_modal.backspace(&mut app.settings),
        KeyCode::Delete => app.settings_modal.delete_forward(&mut app.settings),
        KeyCode::Left => app.settings_modal.move_left(),
        KeyCode::Right => app.settings_modal.move_right(&app.settings),
        KeyCode::Home => app.settings_modal.move_home(),
        KeyCode::End => app.settings_modal.move_end(&app.settings),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.settings_modal.insert_char(&mut app.settings, c);
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Wheel input only drives the chat panel, never the modal
    if app.settings_modal.is_open() {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_chat_down();
            app.scroll_chat_down();
            app.scroll_chat_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_chat_up();
            app.scroll_chat_up();
            app.scroll_chat_up();
        }
        _ => {}
    }
}
