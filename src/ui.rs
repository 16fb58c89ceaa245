use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
};
use crate::app::{App, InputMode};
use crate::state::{Role, Turn};

const PLACEHOLDER_TITLE: &str = "Ask me anything!";
const PLACEHOLDER_HINT: &str = "I can help with calculations, keynote presentations, and emails.";
const INPUT_PLACEHOLDER: &str = "Type your message here...";

fn user_style() -> Style {
    Style::default().fg(Color::Cyan)
}

fn assistant_style() -> Style {
    Style::default().fg(Color::Yellow)
}

/// Render `**bold**` segments of a line; an unmatched `**` stays literal
fn parse_markdown_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    // An even number of parts means the last `**` was never closed
    let closed = parts.len() % 2 == 1;

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        if i % 2 == 1 && (closed || !is_last) && !part.is_empty() {
            spans.push(Span::styled(
                part.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else if i % 2 == 1 {
            spans.push(Span::raw(format!("**{part}")));
            if closed || !is_last {
                spans.push(Span::raw("**"));
            }
        } else if !part.is_empty() {
            spans.push(Span::raw(part.to_string()));
        }
    }

    Line::from(spans)
}

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
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let turns = app.session.conversation().len();
    let count = if turns > 0 {
        format!(" [{} messages]", turns)
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(" Answer Agent ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(count, Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled(app.session.endpoint().to_string(), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn turn_lines(turn: &Turn) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match turn.role() {
        Role::User => {
            lines.push(
                Line::from(Span::styled(format!("{}:", Role::User.label()), user_style().bold()))
                    .alignment(Alignment::Right),
            );
            for line in turn.content().lines() {
                lines.push(Line::from(line.to_string()).alignment(Alignment::Right));
            }
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                format!("{}:", Role::Assistant.label()),
                assistant_style().bold(),
            )));
            for line in turn.content().lines() {
                lines.push(parse_markdown_line(line));
            }
        }
    }
    lines.push(Line::default());
    lines
}

fn pending_lines(frame_idx: u8) -> Vec<Line<'static>> {
    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat(usize::from(frame_idx) + 1);
    vec![
        Line::from(Span::styled(
            format!("{}:", Role::Assistant.label()),
            assistant_style().bold(),
        )),
        Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ]
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let focused = app.input_mode == InputMode::Normal;
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Conversation ");
    let inner = chat_block.inner(area);

    let conversation = app.session.conversation();
    if conversation.is_empty() && !app.is_busy() {
        let top_pad = inner.height.saturating_sub(2) / 2;
        let mut lines = vec![Line::default(); usize::from(top_pad)];
        lines.push(Line::from(Span::styled(
            PLACEHOLDER_TITLE,
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            PLACEHOLDER_HINT,
            Style::default().fg(Color::DarkGray),
        )));

        let placeholder = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(chat_block);
        frame.render_widget(placeholder, area);
        return;
    }

    let mut lines: Vec<Line> = conversation.turns().iter().flat_map(turn_lines).collect();
    if app.is_busy() {
        lines.extend(pending_lines(app.animation_frame));
    }
    let text = Text::from(lines);

    let wrap = Wrap { trim: false };
    let total_lines = Paragraph::new(text.clone()).wrap(wrap).line_count(inner.width);
    let total_lines = u16::try_from(total_lines).unwrap_or(u16::MAX);
    let scroll = app.sync_chat_scroll(total_lines, inner.height);

    let chat = Paragraph::new(text)
        .block(chat_block)
        .wrap(wrap)
        .scroll((scroll, 0));
    frame.render_widget(chat, area);

    if app.chat_max_scroll > 0 {
        let mut scrollbar_state = ScrollbarState::new(usize::from(app.chat_max_scroll))
            .position(usize::from(scroll));
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let editing = app.input_mode == InputMode::Editing;

    let border_color = if !enabled {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };
    let title = if enabled {
        " Message "
    } else {
        " Waiting for response... "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Inner width = total width - 2 (for borders)
    let inner_width = usize::from(area.width.saturating_sub(2));
    let cursor_pos = app.cursor;

    // Horizontal scroll keeps the cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(INPUT_PLACEHOLDER, Style::default().fg(Color::DarkGray)))
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        let style = if enabled { user_style() } else { Style::default().fg(Color::DarkGray) };
        Paragraph::new(visible_text).style(style)
    };

    frame.render_widget(input.block(input_block), area);

    if editing && enabled {
        let cursor_x = u16::try_from(cursor_pos - scroll_offset).unwrap_or(0);
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" VIEW ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let disabled_style = Style::default().bg(Color::Black).fg(Color::DarkGray);

    let mut hints = match app.input_mode {
        InputMode::Editing => {
            let send_style = if app.can_submit() { label_style } else { disabled_style };
            vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", send_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ]
        }
        InputMode::Normal => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };
    if app.is_busy() {
        hints.push(Span::styled(" waiting for the agent ", disabled_style));
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::FakeBackend;
    use crate::chat::ERROR_RESPONSE;
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn buffer_rows(buffer: &Buffer) -> Vec<String> {
        let width = usize::from(buffer.area.width);
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect()
    }

    fn draw(app: &mut App, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        buffer_rows(terminal.backend().buffer())
    }

    async fn converse(app: &mut App, text: &str) {
        app.input = text.to_string();
        assert!(app.submit_input());
        let outcome = app.session.wait_outcome().await;
        app.finish_query(outcome);
    }

    #[test]
    fn test_empty_conversation_shows_placeholder() {
        let mut app = App::new(FakeBackend::new(vec![]));
        let screen = draw(&mut app, 80, 20).join("\n");

        assert!(screen.contains(PLACEHOLDER_TITLE));
        assert!(screen.contains(INPUT_PLACEHOLDER));
        assert!(!screen.contains("Thinking"));
    }

    #[tokio::test]
    async fn test_pending_indicator_while_busy() {
        let gate = Arc::new(Notify::new());
        let mut app = App::new(FakeBackend::gated(vec![], gate));
        app.input = "hello".to_string();
        assert!(app.submit_input());

        let screen = draw(&mut app, 80, 20).join("\n");
        assert!(screen.contains("Thinking."));
        assert!(screen.contains("Waiting for response"));
        assert!(!screen.contains(PLACEHOLDER_TITLE));
    }

    #[tokio::test]
    async fn test_turns_are_aligned_by_role() {
        let mut app = App::new(FakeBackend::new(vec![Ok(Some("4".to_string()))]));
        converse(&mut app, "2+2").await;

        let rows = draw(&mut app, 40, 20);
        let user_row = rows.iter().find(|r| r.contains("2+2")).unwrap();
        assert!(user_row.trim_end().ends_with("2+2│"));

        let answer_row = rows.iter().find(|r| r.starts_with("│4")).unwrap();
        assert!(answer_row.contains('4'));
        assert!(!rows.join("\n").contains("Thinking"));
    }

    #[tokio::test]
    async fn test_error_turn_is_rendered() {
        let mut app = App::new(FakeBackend::new(vec![Err(crate::client::QueryError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            detail: None,
        })]));
        converse(&mut app, "hello").await;

        let screen = draw(&mut app, 120, 20).join("\n");
        assert!(screen.contains(ERROR_RESPONSE));
    }

    #[tokio::test]
    async fn test_newest_turn_stays_visible() {
        let replies = (0..8).map(|i| Ok(Some(format!("answer {i}")))).collect();
        let mut app = App::new(FakeBackend::new(replies));

        for i in 0..8 {
            converse(&mut app, &format!("question {i}")).await;
            draw(&mut app, 40, 14);
        }

        let screen = draw(&mut app, 40, 14).join("\n");
        assert!(screen.contains("answer 7"));
        assert!(!screen.contains("question 0"));
        assert!(app.follow);
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("the **answer** is 4");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "answer");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let open = parse_markdown_line("unclosed **bold");
        let rendered: String = open.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(rendered, "unclosed **bold");
    }
}
