//! Keyboard focus over the grid.
//!
//! Every row kind has an ordered field set; the order is the Tab/Enter
//! traversal order. Requests for a field outside a row's set are ignored.

use serde::{Deserialize, Serialize};

use crate::{Transaction, TxId, staging::Diff};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Select,
    Date,
    Account,
    Payee,
    Notes,
    Category,
    Debit,
    Credit,
    Cleared,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Date => "date",
            Self::Account => "account",
            Self::Payee => "payee",
            Self::Notes => "notes",
            Self::Category => "category",
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Cleared => "cleared",
        }
    }

    /// Cells edited as free text (everything but the two toggles).
    pub fn is_text(self) -> bool {
        !matches!(self, Self::Select | Self::Cleared)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowShape {
    Normal,
    Child,
    Preview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowKind {
    pub shape: RowShape,
    pub draft: bool,
}

impl RowKind {
    #[must_use]
    pub fn of(tx: &Transaction) -> Self {
        let shape = if tx.id.is_preview() {
            RowShape::Preview
        } else if tx.is_child() {
            RowShape::Child
        } else {
            RowShape::Normal
        };
        Self {
            shape,
            draft: tx.id.is_draft(),
        }
    }
}

/// Optional columns of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Columns {
    pub show_account: bool,
    pub show_category: bool,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            show_account: true,
            show_category: true,
        }
    }
}

/// Ordered editable fields of a row.
#[must_use]
pub fn fields_for(kind: RowKind, columns: Columns) -> Vec<Field> {
    let mut fields = match kind.shape {
        RowShape::Preview => vec![Field::Select, Field::Cleared],
        RowShape::Child => vec![
            Field::Select,
            Field::Payee,
            Field::Notes,
            Field::Category,
            Field::Debit,
            Field::Credit,
        ],
        RowShape::Normal => {
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
    };
    // Unsaved rows cannot be bulk-selected; their leftmost cell deletes the draft.
    if kind.draft {
        fields.retain(|field| *field != Field::Select);
    }
    fields
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Focus {
    pub id: TxId,
    pub field: Field,
}

impl Focus {
    pub fn new(id: TxId, field: Field) -> Self {
        Self { id, field }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Navigator {
    columns: Columns,
    focus: Option<Focus>,
}

impl Navigator {
    #[must_use]
    pub fn new(columns: Columns) -> Self {
        Self {
            columns,
            focus: None,
        }
    }

    pub fn columns(&self) -> Columns {
        self.columns
    }

    pub fn focus(&self) -> Option<&Focus> {
        self.focus.as_ref()
    }

    pub fn editing_id(&self) -> Option<&TxId> {
        self.focus.as_ref().map(|focus| &focus.id)
    }

    pub fn focused_field(&self) -> Option<Field> {
        self.focus.as_ref().map(|focus| focus.field)
    }

    pub fn fields(&self, tx: &Transaction) -> Vec<Field> {
        fields_for(RowKind::of(tx), self.columns)
    }

    /// Moves focus to `field` of `tx`. No-op when the row has no such field.
    pub fn edit(&mut self, tx: &Transaction, field: Field) -> bool {
        if !self.fields(tx).contains(&field) {
            return false;
        }
        self.focus = Some(Focus::new(tx.id.clone(), field));
        true
    }

    /// Focuses the first field of `tx`.
    pub fn edit_first(&mut self, tx: &Transaction) -> bool {
        match self.fields(tx).first() {
            Some(field) => {
                self.focus = Some(Focus::new(tx.id.clone(), *field));
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) {
        self.focus = None;
    }

    /// Drops focus when the edited row is no longer among `rows`.
    pub fn retain(&mut self, rows: &[&Transaction]) {
        if let Some(focus) = &self.focus
            && !rows.iter().any(|tx| tx.id == focus.id)
        {
            self.focus = None;
        }
    }

    /// Tab: next field, wrapping onto the first field of the next row.
    pub fn next_field(&mut self, rows: &[&Transaction]) -> bool {
        self.step_field(rows, true)
    }

    /// Shift-Tab: previous field, wrapping onto the last field of the
    /// previous row.
    pub fn prev_field(&mut self, rows: &[&Transaction]) -> bool {
        self.step_field(rows, false)
    }

    fn step_field(&mut self, rows: &[&Transaction], forward: bool) -> bool {
        let Some(focus) = &self.focus else {
            return false;
        };
        let Some(index) = rows.iter().position(|tx| tx.id == focus.id) else {
            return false;
        };
        let fields = self.fields(rows[index]);
        let position = fields.iter().position(|field| *field == focus.field);

        let within = match (position, forward) {
            (Some(pos), true) => fields.get(pos + 1).copied(),
            (Some(pos), false) => pos.checked_sub(1).and_then(|p| fields.get(p).copied()),
            (None, _) => None,
        };
        if let Some(field) = within {
            self.focus = Some(Focus::new(rows[index].id.clone(), field));
            return true;
        }

        let neighbour = if forward {
            rows.get(index + 1)
        } else {
            index.checked_sub(1).and_then(|i| rows.get(i))
        };
        let Some(neighbour) = neighbour else {
            return false;
        };
        let fields = self.fields(neighbour);
        let field = if forward {
            fields.first()
        } else {
            fields.last()
        };
        match field {
            Some(field) => {
                self.focus = Some(Focus::new(neighbour.id.clone(), *field));
                true
            }
            None => false,
        }
    }

    /// Up/Down: same field on the adjacent row, or that row's first field
    /// when it lacks it.
    pub fn move_row(&mut self, rows: &[&Transaction], delta: isize) -> bool {
        let Some(focus) = &self.focus else {
            return match rows.first() {
                Some(first) => self.edit_first(first),
                None => false,
            };
        };
        let Some(index) = rows.iter().position(|tx| tx.id == focus.id) else {
            return false;
        };
        let Some(target) = index.checked_add_signed(delta).and_then(|i| rows.get(i)) else {
            return false;
        };
        let field = focus.field;
        if self.edit(target, field) {
            return true;
        }
        self.edit_first(target)
    }

    /// Moves focus after a structural operation produced `diff`.
    ///
    /// When `anchor` has no amount yet the user is sent to its debit cell,
    /// since a split without an amount is meaningless. Otherwise focus lands
    /// on the first added row, keeping the current field when that row has
    /// it.
    pub fn commit_and_advance(&mut self, anchor: &Transaction, diff: &Diff) -> Option<&Focus> {
        if anchor.amount.is_none() && self.edit(anchor, Field::Debit) {
            return self.focus.as_ref();
        }
        let added = diff.added.first()?;
        let previous = self.focused_field();
        let fields = self.fields(added);
        let field = previous
            .filter(|field| fields.contains(field))
            .or_else(|| fields.iter().copied().find(|field| *field != Field::Select))?;
        self.focus = Some(Focus::new(added.id.clone(), field));
        self.focus.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal() -> RowKind {
        RowKind {
            shape: RowShape::Normal,
            draft: false,
        }
    }

    #[test]
    fn field_sets_follow_row_kind() {
        let columns = Columns::default();
        assert_eq!(
            fields_for(normal(), columns),
            vec![
                Field::Select,
                Field::Date,
                Field::Account,
                Field::Payee,
                Field::Notes,
                Field::Category,
                Field::Debit,
                Field::Credit,
                Field::Cleared,
            ]
        );
        let hidden = Columns {
            show_account: false,
            show_category: false,
        };
        assert!(!fields_for(normal(), hidden).contains(&Field::Account));
        assert!(!fields_for(normal(), hidden).contains(&Field::Category));

        let child = RowKind {
            shape: RowShape::Child,
            draft: false,
        };
        assert_eq!(
            fields_for(child, hidden),
            vec![
                Field::Select,
                Field::Payee,
                Field::Notes,
                Field::Category,
                Field::Debit,
                Field::Credit,
            ]
        );

        let preview = RowKind {
            shape: RowShape::Preview,
            draft: false,
        };
        assert_eq!(fields_for(preview, columns), vec![Field::Select, Field::Cleared]);

        let draft = RowKind {
            shape: RowShape::Normal,
            draft: true,
        };
        assert_eq!(fields_for(draft, columns).first(), Some(&Field::Date));
    }

    #[test]
    fn edit_outside_field_set_is_ignored() {
        let mut nav = Navigator::new(Columns::default());
        let child = Transaction::new("c").with_parent("p");
        assert!(!nav.edit(&child, Field::Date));
        assert!(nav.focus().is_none());
        assert!(nav.edit(&child, Field::Category));
        assert_eq!(nav.focused_field(), Some(Field::Category));
    }

    #[test]
    fn tab_wraps_to_next_row() {
        let mut nav = Navigator::new(Columns::default());
        let a = Transaction::new("a");
        let b = Transaction::new("b");
        let rows = [&a, &b];
        assert!(nav.edit(&a, Field::Cleared));
        assert!(nav.next_field(&rows));
        assert_eq!(nav.focus(), Some(&Focus::new("b".into(), Field::Select)));
        assert!(nav.prev_field(&rows));
        assert_eq!(nav.focus(), Some(&Focus::new("a".into(), Field::Cleared)));
        assert!(nav.edit(&b, Field::Cleared));
        assert!(!nav.next_field(&rows));
    }

    #[test]
    fn move_row_keeps_field_when_possible() {
        let mut nav = Navigator::new(Columns::default());
        let parent = Transaction::new("p").as_parent();
        let child = Transaction::new("c").with_parent("p");
        let rows = [&parent, &child];
        nav.edit(&parent, Field::Notes);
        assert!(nav.move_row(&rows, 1));
        assert_eq!(nav.focus(), Some(&Focus::new("c".into(), Field::Notes)));
        nav.edit(&parent, Field::Date);
        nav.move_row(&rows, 1);
        assert_eq!(nav.focus(), Some(&Focus::new("c".into(), Field::Select)));
        assert!(!nav.move_row(&rows, 1));
    }

    #[test]
    fn advance_goes_to_anchor_debit_without_amount() {
        let mut nav = Navigator::new(Columns::default());
        let anchor = Transaction::new("temp");
        let child = Transaction::new("temp-child").with_parent("temp");
        nav.edit(&anchor, Field::Category);
        let diff = Diff {
            added: vec![child],
        };
        let focus = nav.commit_and_advance(&anchor, &diff).cloned();
        assert_eq!(focus, Some(Focus::new("temp".into(), Field::Debit)));
    }

    #[test]
    fn advance_keeps_field_on_new_row() {
        let mut nav = Navigator::new(Columns::default());
        let anchor = Transaction::new("temp").with_amount(-500);
        let child = Transaction::new("temp-child").with_parent("temp");
        nav.edit(&anchor, Field::Notes);
        let diff = Diff {
            added: vec![child.clone()],
        };
        nav.commit_and_advance(&anchor, &diff);
        assert_eq!(nav.focus(), Some(&Focus::new(child.id.clone(), Field::Notes)));

        nav.edit(&anchor, Field::Date);
        nav.commit_and_advance(&anchor, &diff);
        assert_eq!(nav.focus(), Some(&Focus::new(child.id, Field::Payee)));
    }
}
