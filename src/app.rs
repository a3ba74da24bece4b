use std::sync::Arc;

use tokio::sync::mpsc;

use crate::provider::CompletionProvider;
use crate::session::{ChatSession, SendOutcome};
use crate::settings::{Settings, SettingsModal};

pub struct App {
    pub should_quit: bool,
    pub session: ChatSession,
    pub settings: Settings,
    pub settings_modal: SettingsModal,

    // Chat panel scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat area, set during render
    pub chat_width: u16,  // Inner width of the chat area, for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(
        settings: Settings,
        provider: Arc<dyn CompletionProvider>,
        outcome_tx: mpsc::UnboundedSender<SendOutcome>,
    ) -> Self {
        Self {
            should_quit: false,
            session: ChatSession::new(provider, outcome_tx),
            settings,
            settings_modal: SettingsModal::default(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Submit the draft through the session; on an actual send, jump the
    /// chat to the bottom so the new message and the thinking indicator
    /// are visible.
    pub fn submit(&mut self) {
        if self.session.submit(&self.settings) {
            self.scroll_chat_to_bottom();
        }
    }

    pub fn clear_chat(&mut self) {
        self.session.clear_chat();
        self.chat_scroll = 0;
    }

    pub fn apply_send_outcome(&mut self, outcome: SendOutcome) {
        self.session.apply_outcome(outcome);
        self.scroll_chat_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = (self.chat_scroll + 1).min(self.max_chat_scroll());
    }

    pub fn scroll_page_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(self.visible_height());
    }

    pub fn scroll_page_down(&mut self) {
        self.chat_scroll = (self.chat_scroll + self.visible_height()).min(self.max_chat_scroll());
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    fn max_chat_scroll(&self) -> u16 {
        self.total_chat_lines().saturating_sub(self.visible_height())
    }

    /// Total rendered chat height in lines, mirroring the layout
    /// `render_chat` produces.
    pub fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.session.messages() {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                total_lines += wrapped_line_count(line, wrap_width);
            }
            total_lines += 1; // Blank line after message
        }

        if self.session.is_waiting() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        total_lines
    }
}

/// Rows a text line occupies once the chat paragraph wraps it at `width`.
///
/// Follows the paragraph's trimming word wrap: breaks fall on word
/// boundaries and a word longer than the width is split. Leading and
/// trailing whitespace is trimmed. Widths are measured in characters, not
/// bytes, so multibyte text counts correctly.
fn wrapped_line_count(line: &str, width: usize) -> u16 {
    let width = width.max(1);
    let mut rows: u16 = 1;
    let mut used = 0usize;
    let mut chars = line.chars().peekable();

    while chars.peek().is_some() {
        let mut gap = 0usize;
        while chars.next_if(|c| c.is_whitespace()).is_some() {
            gap += 1;
        }
        let mut word = 0usize;
        while chars.next_if(|c| !c.is_whitespace()).is_some() {
            word += 1;
        }
        if word == 0 {
            break; // Trailing whitespace never opens a new row
        }
        if used == 0 {
            gap = 0; // Leading whitespace is trimmed from each row
        }

        if used + gap + word <= width {
            used += gap + word;
        } else if word <= width {
            rows += 1;
            used = word;
        } else {
            // Word wider than the panel, split across full rows
            if used > 0 {
                rows += 1;
            }
            rows += ((word - 1) / width) as u16;
            used = word - (word - 1) / width * width;
        }
    }

    rows
}
