//! Maps a signed amount onto separate debit/credit text cells and back.

use crate::{Currency, Money, Transaction, navigator::Field, transaction::parse_date};

/// A transaction as the grid edits it: amount split into two text cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayTransaction {
    /// Every non-amount, non-date field, carried through unchanged.
    pub base: Transaction,
    pub date: String,
    pub debit: String,
    pub credit: String,
    amount_edited: bool,
}

impl DisplayTransaction {
    /// Writes `text` into one cell.
    ///
    /// Typing into `debit` empties `credit` and the other way round, so the
    /// two cells never both hold a value. Once either cell has been touched,
    /// leaving both empty means "no amount" instead of "unchanged".
    ///
    /// Returns `false` for fields that are not text cells.
    pub fn set_field(&mut self, field: Field, text: &str) -> bool {
        let optional = |text: &str| {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        match field {
            Field::Date => self.date = text.to_string(),
            Field::Debit => {
                self.debit = text.to_string();
                self.credit.clear();
                self.amount_edited = true;
            }
            Field::Credit => {
                self.credit = text.to_string();
                self.debit.clear();
                self.amount_edited = true;
            }
            Field::Payee => self.base.payee_id = optional(text),
            Field::Account => self.base.account_id = optional(text),
            Field::Category => self.base.category_id = optional(text),
            Field::Notes => self.base.notes = optional(text),
            Field::Select | Field::Cleared => return false,
        }
        true
    }

    /// Current text of a cell, as the editor shows it.
    #[must_use]
    pub fn field_text(&self, field: Field) -> String {
        match field {
            Field::Date => self.date.clone(),
            Field::Debit => self.debit.clone(),
            Field::Credit => self.credit.clone(),
            Field::Payee => self.base.payee_id.clone().unwrap_or_default(),
            Field::Account => self.base.account_id.clone().unwrap_or_default(),
            Field::Category => self.base.category_id.clone().unwrap_or_default(),
            Field::Notes => self.base.notes.clone().unwrap_or_default(),
            Field::Cleared => if self.base.cleared { "✓" } else { "" }.to_string(),
            Field::Select => String::new(),
        }
    }

    #[must_use]
    pub fn amount_edited(&self) -> bool {
        self.amount_edited
    }
}

/// Amount codec bound to the ledger currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Codec {
    currency: Currency,
}

impl Codec {
    #[must_use]
    pub const fn new(currency: Currency) -> Self {
        Self { currency }
    }

    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Splits `tx.amount` into debit/credit text.
    ///
    /// A zero amount is shown in exactly one cell: credit when
    /// `show_zero_in_deposit`, debit otherwise. An unset amount leaves both
    /// cells empty.
    #[must_use]
    pub fn serialize(&self, tx: &Transaction, show_zero_in_deposit: bool) -> DisplayTransaction {
        let (debit, credit) = match tx.amount {
            None => (String::new(), String::new()),
            Some(amount) if amount.is_negative() => {
                (amount.format_magnitude(self.currency), String::new())
            }
            Some(amount) if amount.is_positive() => (String::new(), self.format(amount)),
            Some(_) if show_zero_in_deposit => (String::new(), self.format(Money::ZERO)),
            Some(_) => (self.format(Money::ZERO), String::new()),
        };
        DisplayTransaction {
            base: tx.clone(),
            date: tx
                .date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            debit,
            credit,
            amount_edited: false,
        }
    }

    /// Rebuilds a transaction from its display form.
    ///
    /// The first non-empty cell wins: debit becomes a negative amount, credit
    /// a positive one. Text that does not evaluate falls back to
    /// `original.amount`, as does an untouched pair of empty cells. Invalid
    /// date text becomes `None`.
    #[must_use]
    pub fn deserialize(&self, display: &DisplayTransaction, original: &Transaction) -> Transaction {
        let parsed = if !display.debit.trim().is_empty() {
            Some(Money::parse_major_negated(&display.debit, self.currency))
        } else if !display.credit.trim().is_empty() {
            Some(self.parse(&display.credit))
        } else {
            None
        };

        let amount = match parsed {
            Some(Some(amount)) => Some(amount),
            Some(None) => original.amount,
            None if display.amount_edited => None,
            None => original.amount,
        };

        Transaction {
            amount,
            date: parse_date(&display.date),
            ..display.base.clone()
        }
    }

    /// Formats an amount the way the grid shows it in a cell.
    #[must_use]
    pub fn format(&self, amount: Money) -> String {
        amount.format_major(self.currency)
    }

    /// Evaluates cell text; `None` when it is not a valid expression.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<Money> {
        Money::parse_major(text, self.currency)
    }
}
