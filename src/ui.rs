pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{HomeState, ResultState},
    message::{Message, MessageKind, Role},
    session::{CommandKind, InputMode, SessionView},
    util::format_time,
};

const HORIZONTAL_MARGIN: u16 = 2;
const HINT_ATTACHED: &str = "[hint graph attached: press ctrl+o to open]";

pub struct HomePanel<'a> {
    pub home: &'a HomeState,
}

impl Widget for HomePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Percentage(35),
                Constraint::Length(2), // title
                Constraint::Length(2), // tagline
                Constraint::Length(2), // button
                Constraint::Length(2), // notice
                Constraint::Min(0),
                Constraint::Length(1), // instructions
            ])
            .split(area);

        Paragraph::new(Span::styled("FunGuessr", bold_style.fg(Color::Cyan)))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        Paragraph::new(Span::styled(
            "Guess the hidden function before time runs out.",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        let button = if self.home.starting {
            Span::styled("Preparing...", Style::default().fg(Color::Gray))
        } else {
            Span::styled("[ Start game ]", bold_style.fg(Color::Blue))
        };
        Paragraph::new(button)
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

        if let Some(notice) = &self.home.notice {
            Paragraph::new(Span::styled(notice.as_str(), Style::default().fg(Color::Red)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[4], buf);
        }

        Paragraph::new("(enter) start   (esc) quit")
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
            .alignment(Alignment::Center)
            .render(chunks[6], buf);
    }
}

/// Areas of the session screen, top to bottom
pub struct SessionLayout {
    pub header: Rect,
    pub log: Rect,
    pub notice: Rect,
    pub tabs: Rect,
    pub input: Rect,
    pub help: Rect,
}

impl SessionLayout {
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(area);
        Self {
            header: chunks[0],
            log: chunks[1],
            notice: chunks[2],
            tabs: chunks[3],
            input: chunks[4],
            help: chunks[5],
        }
    }
}

pub struct SessionPanel<'a> {
    pub id: &'a str,
    /// `None` while the session is still being checked
    pub view: Option<&'a SessionView>,
    pub input: &'a str,
    pub scroll: u16,
    pub notice: Option<&'a str>,
}

impl Widget for SessionPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let layout = SessionLayout::new(area);
        let bold_style = Style::default().add_modifier(Modifier::BOLD);

        // header
        let header = Block::default().borders(Borders::ALL).title(Span::styled(
            "FunGuessr",
            bold_style,
        ));
        let inner = header.inner(layout.header);
        header.render(layout.header, buf);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(9)])
            .split(inner);
        Paragraph::new(Span::styled(
            format!("ID: {}", self.id),
            Style::default().add_modifier(Modifier::DIM),
        ))
        .render(columns[0], buf);

        let (timer_text, timer) = match self.view.and_then(|v| v.remaining().map(|r| (v, r))) {
            Some((view, remaining)) => (format_time(remaining), timer_style(view, remaining)),
            None => ("--:--".to_string(), bold_style.fg(Color::Gray)),
        };
        Paragraph::new(Span::styled(timer_text, timer))
            .alignment(Alignment::Right)
            .render(columns[1], buf);

        // message log
        let log_block = Block::default().borders(Borders::ALL).title("Log");
        let log_inner = log_block.inner(layout.log);
        log_block.render(layout.log, buf);

        let lines = match self.view {
            Some(view) => message_lines(view.messages().as_slice()),
            None => vec![Line::from(Span::styled(
                "Connecting to session...",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ))],
        };
        let total = wrapped_height(&lines, log_inner.width);
        let offset = total
            .saturating_sub(log_inner.height)
            .saturating_sub(self.scroll);
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((offset, 0))
            .render(log_inner, buf);

        if let Some(notice) = self.notice {
            Paragraph::new(Span::styled(notice, Style::default().fg(Color::Yellow)))
                .render(layout.notice, buf);
        }

        // controls
        let Some(view) = self.view else {
            return;
        };
        let active = Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD);
        let inactive = Style::default().fg(Color::Gray);
        let mut tabs = vec![
            Span::styled(
                " ⚙️ Command ",
                if matches!(view.mode(), InputMode::Command(_)) {
                    active
                } else {
                    inactive
                },
            ),
            Span::raw(" "),
            Span::styled(
                " 🗣️ Chat ",
                if view.mode() == InputMode::Chat {
                    active.bg(Color::Magenta)
                } else {
                    inactive
                },
            ),
        ];
        if let InputMode::Command(kind) = view.mode() {
            tabs.push(Span::raw("   "));
            tabs.push(Span::styled(format!("[{}]", kind), bold_style.fg(Color::Cyan)));
        }
        Paragraph::new(Line::from(tabs)).render(layout.tabs, buf);

        let send_label = if view.is_loading() { "..." } else { "SEND" };
        let input_block = Block::default().borders(Borders::ALL).title(send_label);
        let content = if self.input.is_empty() {
            Span::styled(
                placeholder(view),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )
        } else {
            Span::raw(self.input)
        };
        let input_style = if view.controls_disabled() {
            Style::default().fg(Color::Gray)
        } else {
            Style::default()
        };
        Paragraph::new(content)
            .style(input_style)
            .block(input_block)
            .render(layout.input, buf);

        Paragraph::new(
            "(enter) send  (tab) command/chat  (shift+tab) ANS/INPUT  (ctrl+o) hint  (↑/↓) scroll  (esc) quit",
        )
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center)
        .render(layout.help, buf);
    }
}

pub struct ResultPanel<'a> {
    pub state: Option<&'a ResultState>,
}

impl Widget for ResultPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(area);

        let session = self.state.map(|s| s.session.as_str()).unwrap_or_default();
        Paragraph::new(Span::styled("Result", bold_style.fg(Color::Cyan)))
            .block(Block::default().borders(Borders::ALL).title(format!("ID: {}", session)))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let mut lines = vec![];
        match self.state.and_then(|s| s.result.as_ref()) {
            None => lines.push(Line::from(Span::styled(
                "Loading result...",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ))),
            Some(result) => {
                match result.is_succeed {
                    Some(true) => lines.push(Line::from(Span::styled(
                        "🎉 Cleared!",
                        bold_style.fg(Color::Green),
                    ))),
                    Some(false) => lines.push(Line::from(Span::styled(
                        "Not cleared",
                        bold_style.fg(Color::Red),
                    ))),
                    None => {}
                }
                if let Some(secs) = result.clear_time {
                    lines.push(Line::from(format!("Clear time: {:.1}s", secs)));
                }
                if let Some(formula) = &result.correct_formula {
                    lines.push(Line::from(format!("Correct formula: {}", formula)));
                }
                lines.push(Line::from(""));
                let raw = serde_json::to_string_pretty(&result.raw).unwrap_or_default();
                lines.extend(raw.lines().map(|l| {
                    Line::from(Span::styled(
                        l.to_string(),
                        Style::default().add_modifier(Modifier::DIM),
                    ))
                }));
            }
        }
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false })
            .render(chunks[1], buf);

        Paragraph::new("(n) new game   (h) home   (esc) quit")
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    }
}

/// Rows the session log can scroll up when drawn inside `area`
pub fn log_scroll_limit(view: Option<&SessionView>, area: Rect) -> u16 {
    let Some(view) = view else {
        return 0;
    };
    let log = Block::default()
        .borders(Borders::ALL)
        .inner(SessionLayout::new(area).log);
    let lines = message_lines(view.messages().as_slice());
    wrapped_height(&lines, log.width).saturating_sub(log.height)
}

pub fn timer_style(view: &SessionView, remaining: u64) -> Style {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    if view.is_ended() && remaining > 0 {
        bold.fg(Color::Green)
    } else if remaining < 60 {
        bold.fg(Color::Red).add_modifier(Modifier::SLOW_BLINK)
    } else {
        bold
    }
}

pub fn placeholder(view: &SessionView) -> &'static str {
    if view.is_ended() {
        return "Game over";
    }
    match view.mode() {
        InputMode::Chat => "Ask the AI about the function's features",
        InputMode::Command(CommandKind::Answer) => "Enter a formula (e.g. x^2 + sin(x))",
        InputMode::Command(CommandKind::Substitute) => "Enter a value for x (e.g. 1.5)",
    }
}

fn role_label(role: Role) -> String {
    let icon = match role {
        Role::User => "👤",
        Role::System => "💻",
        Role::Ai => "🤖",
    };
    format!("{} {}", icon, role)
}

fn message_style(message: &Message) -> Style {
    match (message.role, message.kind) {
        (Role::User, _) => Style::default().fg(Color::Blue),
        (Role::Ai, _) => Style::default().fg(Color::Magenta),
        (_, MessageKind::Error) => Style::default().fg(Color::Red),
        (_, MessageKind::Success) => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        (_, MessageKind::Image) => Style::default().fg(Color::Yellow),
        (_, MessageKind::Text) => Style::default(),
    }
}

pub fn message_lines(messages: &[Message]) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .add_modifier(Modifier::BOLD)
        .add_modifier(Modifier::DIM);

    let mut lines = vec![];
    for message in messages {
        let style = message_style(message);
        lines.push(Line::from(Span::styled(role_label(message.role), label_style)));
        for body in message.body.lines() {
            lines.push(Line::from(Span::styled(body.to_string(), style)));
        }
        if message.kind == MessageKind::Image && message.image.is_some() {
            lines.push(Line::from(Span::styled(
                HINT_ATTACHED,
                Style::default().add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::from(""));
    }
    lines
}

/// Row count of `lines` once wrapped to `width` columns
pub fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let rows: usize = lines
        .iter()
        .map(|line| {
            let w: usize = line.spans.iter().map(|s| s.content.width()).sum();
            w.div_ceil(width as usize).max(1)
        })
        .sum();
    rows.min(u16::MAX as usize) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatResponse, GameResult, ImageResponse};
    use crate::session::{Reply, Request, Ticket};
    use ratatui::{buffer::Buffer, layout::Rect};
    use serde_json::json;

    const NOW: f64 = 1_700_000_000.0;

    fn rendered(buffer: &Buffer) -> String {
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    fn view(total: f64) -> SessionView {
        let mut view = SessionView::new("abc");
        view.begin();
        view.on_image(
            Ok(ImageResponse {
                image_base64: "iVBORw0KGgo=".into(),
                start_time: NOW,
                end_time: NOW + total,
            }),
            NOW,
        );
        view
    }

    #[test]
    fn test_home_panel_shows_start_and_notice() {
        let home = HomeState {
            starting: false,
            notice: Some("server down".into()),
        };
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        HomePanel { home: &home }.render(area, &mut buffer);

        let text = rendered(&buffer);
        assert!(text.contains("FunGuessr"));
        assert!(text.contains("Start game"));
        assert!(text.contains("server down"));
    }

    #[test]
    fn test_home_panel_while_starting() {
        let home = HomeState {
            starting: true,
            notice: None,
        };
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        HomePanel { home: &home }.render(area, &mut buffer);
        assert!(rendered(&buffer).contains("Preparing..."));
    }

    #[test]
    fn test_session_panel_connecting() {
        let area = Rect::new(0, 0, 100, 24);
        let mut buffer = Buffer::empty(area);
        SessionPanel {
            id: "abc",
            view: None,
            input: "",
            scroll: 0,
            notice: None,
        }
        .render(area, &mut buffer);

        let text = rendered(&buffer);
        assert!(text.contains("--:--"));
        assert!(text.contains("Connecting"));
        assert!(text.contains("ID: abc"));
    }

    #[test]
    fn test_session_panel_timer_and_placeholder() {
        let view = view(600.0);
        let area = Rect::new(0, 0, 120, 30);
        let mut buffer = Buffer::empty(area);
        SessionPanel {
            id: "abc",
            view: Some(&view),
            input: "",
            scroll: 0,
            notice: Some("Hint saved"),
        }
        .render(area, &mut buffer);

        let text = rendered(&buffer);
        assert!(text.contains("10:00"));
        assert!(text.contains("Enter a formula"));
        assert!(text.contains("[ANS]"));
        assert!(text.contains("SEND"));
        assert!(text.contains("Hint saved"));
    }

    #[test]
    fn test_session_panel_shows_input_text() {
        let view = view(600.0);
        let area = Rect::new(0, 0, 120, 30);
        let mut buffer = Buffer::empty(area);
        SessionPanel {
            id: "abc",
            view: Some(&view),
            input: "x^2+1",
            scroll: 0,
            notice: None,
        }
        .render(area, &mut buffer);
        assert!(rendered(&buffer).contains("x^2+1"));
    }

    #[test]
    fn test_session_panel_small_area() {
        let view = view(600.0);
        let area = Rect::new(0, 0, 20, 5);
        let mut buffer = Buffer::empty(area);
        SessionPanel {
            id: "abc",
            view: Some(&view),
            input: "",
            scroll: 3,
            notice: None,
        }
        .render(area, &mut buffer);
    }

    #[test]
    fn test_placeholder_follows_mode() {
        let mut view = view(600.0);
        assert_eq!(placeholder(&view), "Enter a formula (e.g. x^2 + sin(x))");
        view.toggle_command();
        assert_eq!(placeholder(&view), "Enter a value for x (e.g. 1.5)");
        view.toggle_mode();
        assert_eq!(placeholder(&view), "Ask the AI about the function's features");

        view.on_countdown(NOW + 700.0);
        assert_eq!(placeholder(&view), "Game over");
    }

    #[test]
    fn test_timer_style_colours() {
        let mut view = view(600.0);
        assert_eq!(timer_style(&view, 300).fg, None);
        assert_eq!(timer_style(&view, 30).fg, Some(Color::Red));
        view.on_countdown(NOW + 700.0);
        assert_eq!(timer_style(&view, 0).fg, Some(Color::Red));
    }

    #[test]
    fn test_message_lines_layout() {
        let messages = vec![
            Message::user("hello"),
            Message::system("line one\nline two"),
            Message::image("hint", "data:image/png;base64,AA==".into()),
        ];
        let lines = message_lines(&messages);
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();

        assert_eq!(text[0], "👤 You");
        assert_eq!(text[1], "hello");
        assert_eq!(text[2], "");
        assert_eq!(text[3], "💻 System");
        assert_eq!(text[4], "line one");
        assert_eq!(text[5], "line two");
        assert!(text.contains(&HINT_ATTACHED.to_string()));
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("abcdefghij"), Line::from(""), Line::from("abc")];
        assert_eq!(wrapped_height(&lines, 5), 2 + 1 + 1);
        assert_eq!(wrapped_height(&lines, 20), 3);
        assert_eq!(wrapped_height(&lines, 0), 0);
    }

    #[test]
    fn test_log_scroll_limit() {
        assert_eq!(log_scroll_limit(None, Rect::new(0, 0, 80, 24)), 0);

        let mut view = view(600.0);
        // one message fits comfortably in a tall terminal
        assert_eq!(log_scroll_limit(Some(&view), Rect::new(0, 0, 80, 40)), 0);

        view.toggle_mode();
        for i in 0..20 {
            view.submit(&format!("question {}", i));
            view.on_reply(
                Ticket {
                    epoch: view.epoch(),
                    request: Request::Chat {
                        question: format!("question {}", i),
                    },
                },
                Ok(Reply::Chat(ChatResponse {
                    response: "answer".into(),
                })),
            );
        }
        let area = Rect::new(0, 0, 80, 24);
        let limit = log_scroll_limit(Some(&view), area);
        assert!(limit > 0);

        // the limit is exactly what is hidden above the log box
        let log = Block::default()
            .borders(Borders::ALL)
            .inner(SessionLayout::new(area).log);
        let total = wrapped_height(&message_lines(view.messages().as_slice()), log.width);
        assert_eq!(limit, total - log.height);
    }

    #[test]
    fn test_result_panel_renders_fields() {
        let state = ResultState {
            session: "abc".into(),
            result: Some(GameResult::from_value(json!({
                "is_succeed": true,
                "clear_time": 42.25,
                "correct_formula": "x^{2}"
            }))),
        };
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        ResultPanel {
            state: Some(&state),
        }
        .render(area, &mut buffer);

        let text = rendered(&buffer);
        assert!(text.contains("Cleared!"));
        assert!(text.contains("Clear time: 42.2s") || text.contains("Clear time: 42.3s"));
        assert!(text.contains("Correct formula: x^{2}"));
        assert!(text.contains("\"is_succeed\": true"));
    }

    #[test]
    fn test_result_panel_loading() {
        let state = ResultState {
            session: "abc".into(),
            result: None,
        };
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        ResultPanel {
            state: Some(&state),
        }
        .render(area, &mut buffer);
        assert!(rendered(&buffer).contains("Loading result..."));
    }
}
