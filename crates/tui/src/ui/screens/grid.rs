use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table},
};

use grid_engine::{Columns, Field, Transaction};

use crate::{app::AppState, ui::theme::Theme};

/// Columns shown for the given layout, left to right.
pub fn visible_fields(columns: Columns) -> Vec<Field> {
    let mut fields = vec![Field::Select, Field::Date];
    if columns.show_account {
        fields.push(Field::Account);
    }
    fields.extend([Field::Payee, Field::Notes]);
    if columns.show_category {
        fields.push(Field::Category);
    }
    fields.extend([Field::Debit, Field::Credit, Field::Cleared]);
    fields
}

fn header_label(field: Field) -> &'static str {
    match field {
        Field::Select => "",
        Field::Date => "Date",
        Field::Account => "Account",
        Field::Payee => "Payee",
        Field::Notes => "Notes",
        Field::Category => "Category",
        Field::Debit => "Payment",
        Field::Credit => "Deposit",
        Field::Cleared => "C",
    }
}

fn width(field: Field) -> Constraint {
    match field {
        Field::Select | Field::Cleared => Constraint::Length(3),
        Field::Date => Constraint::Length(10),
        Field::Account | Field::Category => Constraint::Length(14),
        Field::Payee => Constraint::Min(16),
        Field::Notes => Constraint::Min(12),
        Field::Debit | Field::Credit => Constraint::Length(12),
    }
}

pub fn render(frame: &mut Frame<'_>, area: Rect, state: &AppState) {
    let theme = Theme::default();
    let fields = visible_fields(state.controller.columns());
    let focus = state.controller.focus();

    let header = Row::new(
        fields
            .iter()
            .map(|field| Cell::from(header_label(*field)))
            .collect::<Vec<_>>(),
    )
    .style(
        Style::default()
            .fg(theme.text_muted)
            .add_modifier(Modifier::BOLD),
    );

    let rows = state
        .controller
        .rows()
        .into_iter()
        .enumerate()
        .map(|(index, tx)| {
            let cells = fields
                .iter()
                .map(|field| {
                    let focused = focus.is_some_and(|f| f.id == tx.id && f.field == *field);
                    let mut cell = Cell::from(cell_span(state, tx, *field, &theme));
                    if focused {
                        cell = cell.style(Style::default().add_modifier(Modifier::REVERSED));
                    }
                    cell
                })
                .collect::<Vec<_>>();

            let mut style = if tx.id.is_draft() {
                Style::default().fg(theme.draft)
            } else if tx.id.is_preview() {
                Style::default().fg(theme.text_muted)
            } else {
                Style::default().fg(theme.text)
            };
            if tx.is_parent && tx.error.is_some() {
                style = style.fg(theme.error);
            }
            if index == state.cursor {
                style = style.bg(theme.cursor);
            }
            Row::new(cells).style(style)
        })
        .collect::<Vec<_>>();

    let widths = fields.iter().map(|field| width(*field)).collect::<Vec<_>>();
    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title("Ledger"),
    );
    frame.render_widget(table, area);
}

fn cell_span(state: &AppState, tx: &Transaction, field: Field, theme: &Theme) -> Span<'static> {
    if let Some(input) = &state.input
        && input.focus.id == tx.id
        && input.focus.field == field
    {
        return Span::raw(format!("{}▏", input.text));
    }

    match field {
        Field::Select => Span::raw(select_marker(state, tx)),
        Field::Cleared => Span::raw(if tx.cleared { "✓" } else { "" }),
        Field::Payee if tx.is_child() => {
            Span::raw(format!("└ {}", state.cell_text(&tx.id, field)))
        }
        Field::Date | Field::Account if tx.is_child() => Span::raw(""),
        Field::Debit => Span::styled(
            state.cell_text(&tx.id, field),
            Style::default().fg(theme.negative),
        ),
        Field::Credit => Span::styled(
            state.cell_text(&tx.id, field),
            Style::default().fg(theme.positive),
        ),
        _ => Span::raw(state.cell_text(&tx.id, field)),
    }
}

fn select_marker(state: &AppState, tx: &Transaction) -> &'static str {
    if tx.id.is_draft() {
        return if tx.is_child() { "" } else { "+" };
    }
    if state.controller.is_selected(&tx.id) {
        return "●";
    }
    if !tx.is_parent {
        return "";
    }
    if state.controller.expansion().is_expanded(&tx.id) {
        "▾"
    } else {
        "▸"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_columns_are_skipped() {
        let fields = visible_fields(Columns {
            show_account: false,
            show_category: true,
        });
        assert!(!fields.contains(&Field::Account));
        assert!(fields.contains(&Field::Category));
        assert_eq!(fields.first(), Some(&Field::Select));
        assert_eq!(fields.last(), Some(&Field::Cleared));
    }
}
