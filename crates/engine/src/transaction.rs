//! Transaction primitives shown by the grid.
//!
//! A `Transaction` is either a plain row, a split parent owning children, or a
//! split child. Ids carry their tier (committed, draft, preview) by
//! convention so the grid can tell which fields are editable.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::Money;

/// Reserved substring marking an id as a not-yet-persisted draft.
pub const DRAFT_MARKER: &str = "temp";
/// Prefix of ids synthesized from upcoming scheduled transactions.
pub const PREVIEW_PREFIX: &str = "preview/";

/// Current shape of [`TransactionError::SplitTransactionError`].
pub const SPLIT_ERROR_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdTier {
    Committed,
    Draft,
    Preview,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Fresh id for a draft row.
    #[must_use]
    pub fn new_draft() -> Self {
        Self(format!("{DRAFT_MARKER}-{}", Uuid::new_v4()))
    }

    /// Fresh id for a persisted row.
    #[must_use]
    pub fn new_committed() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Id of the preview row for `schedule_id` due on `date`.
    #[must_use]
    pub fn preview(schedule_id: &str, date: NaiveDate) -> Self {
        Self(format!("{PREVIEW_PREFIX}{schedule_id}/{date}"))
    }

    /// Tiers are mutually exclusive; the preview prefix wins over the draft
    /// marker.
    #[must_use]
    pub fn tier(&self) -> IdTier {
        if self.0.starts_with(PREVIEW_PREFIX) {
            IdTier::Preview
        } else if self.0.contains(DRAFT_MARKER) {
            IdTier::Draft
        } else {
            IdTier::Committed
        }
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.tier() == IdTier::Draft
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.tier() == IdTier::Preview
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Non-blocking validation fault attached to a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransactionError {
    /// `children total + difference == parent amount`.
    SplitTransactionError { version: u8, difference: Money },
}

impl TransactionError {
    #[must_use]
    pub fn split(difference: Money) -> Self {
        Self::SplitTransactionError {
            version: SPLIT_ERROR_VERSION,
            difference,
        }
    }

    #[must_use]
    pub fn difference(&self) -> Money {
        match self {
            Self::SplitTransactionError { difference, .. } => *difference,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub payee_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub cleared: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub parent_id: Option<TxId>,
    #[serde(default)]
    pub is_parent: bool,
    #[serde(default)]
    pub error: Option<TransactionError>,
}

impl Transaction {
    pub fn new(id: impl Into<TxId>) -> Self {
        Self {
            id: id.into(),
            date: None,
            amount: None,
            payee_id: None,
            account_id: None,
            category_id: None,
            cleared: false,
            notes: None,
            parent_id: None,
            is_parent: false,
            error: None,
        }
    }

    /// Empty draft row carrying the given account and date.
    #[must_use]
    pub fn draft(account_id: Option<String>, date: Option<NaiveDate>) -> Self {
        Self {
            account_id,
            date,
            ..Self::new(TxId::new_draft())
        }
    }

    /// New child of `parent`, inheriting date, account and cleared state.
    #[must_use]
    pub fn child_of(parent: &Transaction, id: TxId) -> Self {
        Self {
            date: parent.date,
            account_id: parent.account_id.clone(),
            cleared: parent.cleared,
            parent_id: Some(parent.id.clone()),
            ..Self::new(id)
        }
    }

    #[must_use]
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    #[must_use]
    pub fn with_amount(mut self, minor: i64) -> Self {
        self.amount = Some(Money::new(minor));
        self
    }

    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    #[must_use]
    pub fn with_payee(mut self, payee_id: impl Into<String>) -> Self {
        self.payee_id = Some(payee_id.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<TxId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn as_parent(mut self) -> Self {
        self.is_parent = true;
        self
    }

    /// Applies every field set in `patch`.
    pub fn apply(&mut self, patch: &TransactionPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(payee_id) = &patch.payee_id {
            self.payee_id = payee_id.clone();
        }
        if let Some(account_id) = &patch.account_id {
            self.account_id = account_id.clone();
        }
        if let Some(category_id) = &patch.category_id {
            self.category_id = category_id.clone();
        }
        if let Some(cleared) = patch.cleared {
            self.cleared = cleared;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
    }
}

impl From<&str> for Transaction {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Partial update of a transaction.
///
/// Outer `None` leaves the field untouched; `Some(None)` clears a nullable one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub date: Option<Option<NaiveDate>>,
    pub amount: Option<Option<Money>>,
    pub payee_id: Option<Option<String>>,
    pub account_id: Option<Option<String>>,
    pub category_id: Option<Option<String>>,
    pub cleared: Option<bool>,
    pub notes: Option<Option<String>>,
}

impl TransactionPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn amount(mut self, minor: Option<i64>) -> Self {
        self.amount = Some(minor.map(Money::new));
        self
    }

    #[must_use]
    pub fn date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn payee(mut self, payee_id: Option<String>) -> Self {
        self.payee_id = Some(payee_id);
        self
    }

    #[must_use]
    pub fn account(mut self, account_id: Option<String>) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: Option<String>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn cleared(mut self, cleared: bool) -> Self {
        self.cleared = Some(cleared);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Builds the patch that turns `before` into `after`.
    #[must_use]
    pub fn diff(before: &Transaction, after: &Transaction) -> Self {
        fn changed<T: Clone + PartialEq>(a: &T, b: &T) -> Option<T> {
            (a != b).then(|| b.clone())
        }
        Self {
            date: changed(&before.date, &after.date),
            amount: changed(&before.amount, &after.amount),
            payee_id: changed(&before.payee_id, &after.payee_id),
            account_id: changed(&before.account_id, &after.account_id),
            category_id: changed(&before.category_id, &after.category_id),
            cleared: changed(&before.cleared, &after.cleared),
            notes: changed(&before.notes, &after.notes),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `true` if the patch can change a split family's balance.
    #[must_use]
    pub fn touches_amount(&self) -> bool {
        self.amount.is_some()
    }

    /// Patch restricted to the fields children inherit from their parent.
    #[must_use]
    pub fn inherited(&self) -> Self {
        Self {
            date: self.date,
            account_id: self.account_id.clone(),
            cleared: self.cleared,
            ..Self::default()
        }
    }
}

/// Accepts any string; dates that are not valid calendar days become `None`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}

/// Parses an ISO `YYYY-MM-DD` date; invalid calendar days yield `None`.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_tiers_are_exclusive() {
        assert_eq!(TxId::new_draft().tier(), IdTier::Draft);
        assert_eq!(TxId::new_committed().tier(), IdTier::Committed);
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let preview = TxId::preview("temp-schedule", date);
        assert_eq!(preview.tier(), IdTier::Preview);
        assert!(!preview.is_draft());
    }

    #[test]
    fn invalid_stored_dates_become_null() {
        let tx: Transaction =
            serde_json::from_str(r#"{"id":"a","date":"2026-02-30","amount":-500}"#).unwrap();
        assert_eq!(tx.date, None);
        assert_eq!(tx.amount, Some(Money::new(-500)));

        let tx: Transaction = serde_json::from_str(r#"{"id":"b","date":"2026-02-28"}"#).unwrap();
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2026, 2, 28));
    }

    #[test]
    fn split_error_serializes_with_type_tag() {
        let json = serde_json::to_value(TransactionError::split(Money::new(-200))).unwrap();
        assert_eq!(json["type"], "SplitTransactionError");
        assert_eq!(json["difference"], -200);
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn patch_diff_only_lists_changes() {
        let before = Transaction::new("a").with_amount(-500);
        let mut after = before.clone();
        after.notes = Some("lunch".to_string());
        let patch = TransactionPatch::diff(&before, &after);
        assert_eq!(patch, TransactionPatch::new().notes(Some("lunch".to_string())));
        assert!(!patch.touches_amount());
    }
}
