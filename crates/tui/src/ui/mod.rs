pub mod components;
pub mod keymap;
pub mod screens;

mod terminal;
mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};

use grid_engine::{ExpansionMode, Field};

use crate::app::AppState;

pub use terminal::{AppTerminal as Terminal, restore_terminal, setup_terminal};
pub use theme::Theme;

pub fn render(frame: &mut Frame<'_>, state: &AppState) {
    let area = frame.area();
    let theme = Theme::default();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info bar
            Constraint::Min(0),    // Grid
            Constraint::Length(1), // Split balance
            Constraint::Length(1), // Bottom bar
        ])
        .split(area);

    render_info_bar(frame, layout[0], state, &theme);
    screens::grid::render(frame, layout[1], state);
    render_balance(frame, layout[2], state, &theme);
    render_bottom_bar(frame, layout[3], state, &theme);
    components::toast::render(frame, area, state.toast.as_ref());
}

fn render_info_bar(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let controller = &state.controller;
    let mode = match controller.expansion().state().mode {
        ExpansionMode::Collapse => "expanded",
        ExpansionMode::Expand => "collapsed",
    };
    let save = if controller.is_save_pending() {
        "saving"
    } else {
        "idle"
    };

    let mut line = vec![
        Span::styled("Currency", Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {}  ", controller.codec().currency())),
        Span::styled("Splits", Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {mode}  ")),
        Span::styled("Store", Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {save}")),
    ];
    if controller.expansion().state().is_transitioning() {
        line.push(Span::styled("  switching…", Style::default().fg(theme.accent)));
    }
    frame.render_widget(Paragraph::new(Line::from(line)), area);
}

/// Shows how far the focused split family is from balancing.
fn render_balance(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let controller = &state.controller;
    let Some(id) = controller
        .focus()
        .map(|focus| focus.id.clone())
        .or_else(|| controller.rows().get(state.cursor).map(|tx| tx.id.clone()))
    else {
        return;
    };
    let Some(tx) = controller.get(&id) else {
        return;
    };
    let parent = match &tx.parent_id {
        Some(parent_id) => controller.get(parent_id),
        None => Some(tx),
    };
    let Some(error) = parent.and_then(|parent| parent.error) else {
        return;
    };

    let line = Line::from(Span::styled(
        format!(
            "Split off by {}",
            controller.codec().format(error.difference().abs())
        ),
        Style::default().fg(theme.error),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_bottom_bar(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let editing = state.controller.focus().map(|focus| focus.field);
    let mut parts = match editing {
        Some(field) => editing_hints(field, theme),
        None => vec![
            key("↑↓", theme),
            Span::raw(" move  "),
            key("Enter", theme),
            Span::raw(" edit  "),
            key("Space", theme),
            Span::raw(" fold  "),
            key("Ctrl+E", theme),
            Span::raw(" fold all  "),
            key("Ctrl+R", theme),
            Span::raw(" reload"),
        ],
    };

    parts.push(Span::styled("  │  ", Style::default().fg(theme.border)));
    if editing.is_some() {
        parts.push(key("Esc", theme));
        parts.push(Span::raw(" leave"));
    } else {
        parts.push(key("q", theme));
        parts.push(Span::raw(" quit"));
    }

    frame.render_widget(Paragraph::new(Line::from(parts)), area);
}

fn editing_hints(field: Field, theme: &Theme) -> Vec<Span<'static>> {
    let mut parts = vec![
        key("Tab", theme),
        Span::raw(" next  "),
        key("Enter", theme),
        Span::raw(" save  "),
        key("Ctrl+Enter", theme),
        Span::raw(" force  "),
        key("Ctrl+S", theme),
        Span::raw(" split  "),
        key("Ctrl+A", theme),
        Span::raw(" add split  "),
        key("Ctrl+D", theme),
        Span::raw(" delete"),
    ];
    match field {
        Field::Select => {
            parts.push(Span::raw("  "));
            parts.push(key("Space", theme));
            parts.push(Span::raw(" select/fold"));
        }
        Field::Cleared => {
            parts.push(Span::raw("  "));
            parts.push(key("Space", theme));
            parts.push(Span::raw(" cleared"));
        }
        _ => {}
    }
    parts
}

fn key(label: &'static str, theme: &Theme) -> Span<'static> {
    Span::styled(label, Style::default().fg(theme.accent))
}
