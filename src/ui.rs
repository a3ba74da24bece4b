use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};

use crate::app::App;
use crate::settings::SettingsField;
use crate::transcript::ChatRole;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.settings_modal.is_open() {
        render_settings_modal(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" AI Chatapp ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!(" {} ", app.settings.deployment),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    // Store chat area dimensions for scroll calculations
    let inner_area = block.inner(area);
    app.chat_height = inner_area.height;
    app.chat_width = inner_area.width;

    let chat_text = if app.session.messages().is_empty() && !app.session.is_waiting() {
        Text::from(Span::styled(
            "Send a message to start chatting...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.session.messages() {
            let label = match msg.role {
                ChatRole::User => Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                ChatRole::Assistant => Span::styled(
                    "AI:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
            };
            lines.push(Line::from(label));
            for line in msg.content.lines() {
                lines.push(Line::from(line));
            }
            lines.push(Line::default());
        }

        if app.session.is_waiting() {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);

    let total_lines = app.total_chat_lines();
    if total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines as usize).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.settings_modal.is_open() {
        Color::DarkGray
    } else {
        Color::Yellow
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    let draft = &app.session.draft;
    if draft.text().is_empty() {
        let placeholder = Paragraph::new("Type your message...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
    } else {
        // Calculate visible portion of input with horizontal scrolling
        let inner_width = area.width.saturating_sub(2) as usize;
        let scroll_offset = visible_offset(draft.cursor(), inner_width);
        let visible_text: String = draft
            .text()
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();

        let input = Paragraph::new(visible_text)
            .style(Style::default().fg(Color::Cyan))
            .block(block);
        frame.render_widget(input, area);
    }

    if !app.settings_modal.is_open() {
        let inner_width = area.width.saturating_sub(2) as usize;
        let scroll_offset = visible_offset(draft.cursor(), inner_width);
        let cursor_x = (draft.cursor() - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let modal_open = app.settings_modal.is_open();

    let (mode_text, mode_style) = if modal_open {
        (" SETTINGS ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if modal_open {
        vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" field ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" save ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Ctrl+L ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" Ctrl+S ", key_style),
            Span::styled(" settings ", label_style),
            Span::styled(" Up/Dn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ]
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_settings_modal(app: &App, frame: &mut Frame, area: Rect) {
    use ratatui::widgets::Clear;

    // Calculate popup size and position (centered), clamped so the popup
    // never extends past the frame on small terminals
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 10.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Settings ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let modal = &app.settings_modal;
    let endpoint_focused = modal.field() == SettingsField::Endpoint;

    render_modal_label(frame, inner, 0, "API URL:", endpoint_focused);
    render_modal_value(
        frame,
        inner,
        1,
        &app.settings.api_url,
        modal.cursor(),
        endpoint_focused,
    );

    render_modal_label(frame, inner, 3, "API Key:", !endpoint_focused);
    render_modal_value(
        frame,
        inner,
        4,
        &masked_key(&app.settings.api_key),
        modal.cursor(),
        !endpoint_focused,
    );

    if let Some(line_area) = row(inner, 6) {
        let deployment_line = Paragraph::new(format!(
            "deployment: {}   api-version: {}",
            app.settings.deployment, app.settings.api_version
        ))
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(deployment_line, line_area);
    }

    if let Some(line_area) = row(inner, 7) {
        let instructions = Paragraph::new("Tab switches fields. Enter saves, Esc closes.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, line_area);
    }
}

/// Single row inside the popup, or `None` when the clamped popup is too
/// short to hold it.
fn row(inner: Rect, offset: u16) -> Option<Rect> {
    if offset < inner.height {
        Some(Rect::new(inner.x, inner.y + offset, inner.width, 1))
    } else {
        None
    }
}

fn render_modal_label(frame: &mut Frame, inner: Rect, offset: u16, text: &str, focused: bool) {
    let style = if focused {
        Style::default().fg(Color::Cyan).bold()
    } else {
        Style::default().fg(Color::Gray)
    };
    if let Some(area) = row(inner, offset) {
        frame.render_widget(Paragraph::new(text).style(style), area);
    }
}

fn render_modal_value(
    frame: &mut Frame,
    inner: Rect,
    offset: u16,
    display: &str,
    cursor: usize,
    focused: bool,
) {
    let area = match row(inner, offset) {
        Some(area) => area,
        None => return,
    };
    let inner_width = area.width as usize;

    let scroll_offset = if focused {
        visible_offset(cursor, inner_width)
    } else {
        0
    };
    let visible_text: String = display
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    frame.render_widget(Paragraph::new(visible_text).style(style), area);

    if focused {
        let cursor_x = (cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x, area.y));
    }
}

/// Scroll offset that keeps the cursor inside a field of the given width.
fn visible_offset(cursor: usize, width: usize) -> usize {
    if width == 0 {
        0
    } else if cursor >= width {
        cursor - width + 1
    } else {
        0
    }
}

/// Mask an API key with asterisks, keeping the last four characters
/// readable. The masked string has the same character count as the key so
/// cursor positions line up.
fn masked_key(key: &str) -> String {
    let char_count = key.chars().count();
    if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let masked = "*".repeat(char_count - 4);
        let last_four: String = key.chars().skip(char_count - 4).collect();
        format!("{}{}", masked, last_four)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    use super::*;
    use crate::provider::MockProvider;
    use crate::settings::Settings;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(Settings::default(), Arc::new(MockProvider::new()), tx)
    }

    fn rendered_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_settings_modal_fits_short_terminal() {
        // 8 rows is less than the popup's full height; the popup must
        // shrink instead of drawing outside the buffer
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        let mut app = test_app();
        app.settings_modal.open(&app.settings);

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let rendered = rendered_text(&terminal);
        assert!(rendered.contains(" Settings "));
        assert!(rendered.contains("API URL:"));

        // With no room at all the popup disappears rather than panic
        let mut tiny = Terminal::new(TestBackend::new(20, 4)).unwrap();
        tiny.draw(|frame| render(&mut app, frame)).unwrap();
    }

    #[test]
    fn test_settings_modal_shows_both_fields_at_full_size() {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut app = test_app();
        app.settings_modal.open(&app.settings);

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let rendered = rendered_text(&terminal);
        assert!(rendered.contains("API URL:"));
        assert!(rendered.contains("API Key:"));
        assert!(rendered.contains("deployment: gpt-35-turbo"));
        assert!(rendered.contains("Tab switches fields."));
    }

    #[test]
    fn test_masked_key_shows_last_four() {
        assert_eq!(masked_key("abcdefgh"), "****efgh");
    }

    #[test]
    fn test_masked_key_hides_short_keys() {
        assert_eq!(masked_key("abc"), "***");
        assert_eq!(masked_key(""), "");
    }

    #[test]
    fn test_masked_key_preserves_length() {
        let key = "sk-αβγδε12345";
        assert_eq!(masked_key(key).chars().count(), key.chars().count());
    }

    #[test]
    fn test_visible_offset_follows_cursor() {
        assert_eq!(visible_offset(3, 10), 0);
        assert_eq!(visible_offset(10, 10), 1);
        assert_eq!(visible_offset(25, 10), 16);
        assert_eq!(visible_offset(5, 0), 0);
    }
}
