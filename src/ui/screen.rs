use ratatui::{layout::Rect, Frame};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{App, AppState},
    ui::{log_scroll_limit, HomePanel, ResultPanel, SessionLayout, SessionPanel},
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

pub struct HomeScreen;

impl Screen for HomeScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(HomePanel { home: &app.home }, f.area());
    }
}

/// Session screen; also places the terminal cursor in the input box
pub struct SessionScreen;

impl Screen for SessionScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        app.set_scroll_limit(log_scroll_limit(app.session.as_ref(), area));
        f.render_widget(
            SessionPanel {
                id: app.session_id.as_deref().unwrap_or_default(),
                view: app.session.as_ref(),
                input: &app.input,
                scroll: app.scroll,
                notice: app.notice.as_deref(),
            },
            area,
        );

        if let Some(view) = app.session.as_ref() {
            if !view.controls_disabled() {
                let (x, y) = input_cursor(SessionLayout::new(area).input, &app.input);
                f.set_cursor_position((x, y));
            }
        }
    }
}

/// Cursor cell after `text` inside the bordered input box, pinned to its last column
pub fn input_cursor(input: Rect, text: &str) -> (u16, u16) {
    let width = u16::try_from(text.width()).unwrap_or(u16::MAX);
    let x = input.x.saturating_add(1).saturating_add(width);
    let max_x = input.x.saturating_add(input.width.saturating_sub(2));
    (x.min(max_x), input.y.saturating_add(1))
}

pub struct ResultScreen;

impl Screen for ResultScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(
            ResultPanel {
                state: app.result.as_ref(),
            },
            f.area(),
        );
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Home => Box::new(HomeScreen),
        AppState::Session => Box::new(SessionScreen),
        AppState::Result => Box::new(ResultScreen),
    }
}

pub fn draw(app: &App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}
