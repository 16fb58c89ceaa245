use std::sync::Arc;
use ratatui::layout::Rect;
use crate::chat::{ChatSession, Outcome, Rejected};
use crate::client::QueryBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation and the in-flight query
    pub session: ChatSession,

    // Input buffer
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Chat scroll state
    pub chat_scroll: u16,
    pub chat_max_scroll: u16,
    pub follow: bool, // pinned to the newest turn
    rendered_view: (u64, bool),

    // Chat pane area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            session: ChatSession::new(backend),

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_max_scroll: 0,
            follow: true,
            rendered_view: (0, false),

            chat_area: None,

            animation_frame: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    /// The input is disabled while a query is in flight
    pub fn input_enabled(&self) -> bool {
        !self.is_busy()
    }

    pub fn can_submit(&self) -> bool {
        self.input_enabled() && !self.input.trim().is_empty()
    }

    /// Send the input buffer. Returns true if a query was started.
    pub fn submit_input(&mut self) -> bool {
        match self.session.submit(&self.input) {
            Ok(()) => {
                self.input.clear();
                self.cursor = 0;
                self.follow = true;
                true
            }
            Err(Rejected::Blank | Rejected::Busy) => false,
        }
    }

    pub fn finish_query(&mut self, outcome: Option<Outcome>) {
        self.session.apply(outcome);
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        if !self.input_enabled() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if !self.input_enabled() || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.remove(byte_pos);
    }

    pub fn delete_at_cursor(&mut self) {
        if !self.input_enabled() {
            return;
        }
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow = self.chat_scroll >= self.chat_max_scroll;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_max_scroll);
        self.follow = self.chat_scroll >= self.chat_max_scroll;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow = self.chat_max_scroll == 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.chat_max_scroll;
        self.follow = true;
    }

    /// Called by the renderer with the chat's wrapped height. Any change to
    /// the rendered turns (new turn, pending indicator shown or hidden)
    /// re-pins the view to the bottom.
    pub fn sync_chat_scroll(&mut self, total_lines: u16, visible_lines: u16) -> u16 {
        let view = (self.session.conversation().revision(), self.is_busy());
        if view != self.rendered_view {
            self.rendered_view = view;
            self.follow = true;
        }

        self.chat_max_scroll = total_lines.saturating_sub(visible_lines);
        if self.follow {
            self.chat_scroll = self.chat_max_scroll;
        } else {
            self.chat_scroll = self.chat_scroll.min(self.chat_max_scroll);
        }
        self.chat_scroll
    }

    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        } else {
            self.animation_frame = 0;
        }
    }
}
