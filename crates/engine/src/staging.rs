//! Staging buffer for the draft entry family.
//!
//! The buffer holds one not-yet-persisted family: an anchor row at index 0
//! plus, once split, its children. Every operation returns a brand new
//! buffer together with a [`Diff`] of inserted rows; the input is never
//! mutated, so callers can detect changes by comparing buffers.

use std::collections::HashMap;

use tracing::debug;

use crate::{Money, Transaction, TransactionError, TransactionPatch, TxId};

/// Rows inserted by a structural operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diff {
    pub added: Vec<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingResult {
    pub data: StagingBuffer,
    pub diff: Diff,
}

/// Balance of a split family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitBalance {
    /// Sum of the children, unset amounts counted as zero.
    pub total: Money,
    /// `parent - total`; zero when balanced.
    pub difference: Money,
    /// At least one child has no amount yet.
    pub incomplete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingBuffer {
    rows: Vec<Transaction>,
}

impl StagingBuffer {
    /// Buffer holding only `anchor`.
    #[must_use]
    pub fn new(anchor: Transaction) -> Self {
        Self { rows: vec![anchor] }
    }

    /// Returns `None` for an empty sequence: a buffer always has an anchor.
    #[must_use]
    pub fn from_rows(rows: Vec<Transaction>) -> Option<Self> {
        (!rows.is_empty()).then_some(Self { rows })
    }

    #[must_use]
    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    /// The anchor row.
    #[must_use]
    pub fn root(&self) -> &Transaction {
        &self.rows[0]
    }

    #[must_use]
    pub fn last(&self) -> &Transaction {
        &self.rows[self.rows.len() - 1]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn get(&self, id: &TxId) -> Option<&Transaction> {
        self.rows.iter().find(|tx| &tx.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &TxId) -> bool {
        self.get(id).is_some()
    }

    /// Split fault of the family, if any.
    #[must_use]
    pub fn error(&self) -> Option<TransactionError> {
        self.root().error
    }

    fn unchanged(&self) -> StagingResult {
        StagingResult {
            data: self.clone(),
            diff: Diff::default(),
        }
    }

    /// Applies `patch` to the row `id`.
    ///
    /// Date, account and cleared edits on a parent flow down to its
    /// children; amount edits inside a family recompute its balance.
    #[must_use]
    pub fn update(&self, id: &TxId, patch: &TransactionPatch) -> StagingResult {
        let Some(index) = self.position(id) else {
            return self.unchanged();
        };
        let mut rows = self.rows.clone();
        rows[index].apply(patch);

        let target = rows[index].clone();
        if target.is_parent {
            let inherited = patch.inherited();
            if !inherited.is_empty() {
                for child in rows.iter_mut().filter(|tx| tx.parent_id.as_ref() == Some(id)) {
                    child.apply(&inherited);
                }
            }
        }

        if patch.touches_amount() {
            let family = if target.is_parent {
                Some(target.id.clone())
            } else {
                target.parent_id.clone()
            };
            if let Some(parent_id) = family {
                recalculate_family(&mut rows, &parent_id);
            }
        }

        StagingResult {
            data: Self { rows },
            diff: Diff::default(),
        }
    }

    /// Turns `id` into a split parent and inserts one empty child.
    ///
    /// Splitting an existing parent appends another child instead. Children
    /// cannot be split.
    #[must_use]
    pub fn split(&self, id: &TxId) -> StagingResult {
        let Some(index) = self.position(id) else {
            return self.unchanged();
        };
        if self.rows[index].is_child() {
            return self.unchanged();
        }
        if self.rows[index].is_parent {
            return self.add_split(id);
        }

        let mut rows = self.rows.clone();
        let parent = &mut rows[index];
        parent.is_parent = true;
        parent.category_id = None;
        let child = Transaction::child_of(parent, TxId::new_draft());
        rows.insert(index + 1, child.clone());
        recalculate_family(&mut rows, id);
        debug!(parent = %id, child = %child.id, "split draft transaction");

        StagingResult {
            data: Self { rows },
            diff: Diff { added: vec![child] },
        }
    }

    /// Appends one more child to an existing parent.
    #[must_use]
    pub fn add_split(&self, parent_id: &TxId) -> StagingResult {
        let Some(index) = self.position(parent_id) else {
            return self.unchanged();
        };
        if !self.rows[index].is_parent {
            return self.unchanged();
        }

        let insert_at = self
            .rows
            .iter()
            .rposition(|tx| tx.parent_id.as_ref() == Some(parent_id))
            .unwrap_or(index)
            + 1;
        let mut rows = self.rows.clone();
        let child = Transaction::child_of(&rows[index], TxId::new_draft());
        rows.insert(insert_at, child.clone());
        recalculate_family(&mut rows, parent_id);
        debug!(parent = %parent_id, child = %child.id, "added split to draft");

        StagingResult {
            data: Self { rows },
            diff: Diff { added: vec![child] },
        }
    }

    /// Removes a row. The anchor cannot be deleted.
    ///
    /// Removing a parent also removes its children; removing the last child
    /// of a parent turns it back into a plain transaction.
    #[must_use]
    pub fn delete(&self, id: &TxId) -> StagingResult {
        let Some(index) = self.position(id) else {
            return self.unchanged();
        };
        if index == 0 {
            debug!(id = %id, "refusing to delete draft anchor");
            return self.unchanged();
        }

        let removed = self.rows[index].clone();
        let mut rows: Vec<Transaction> = self
            .rows
            .iter()
            .filter(|tx| &tx.id != id && tx.parent_id.as_ref() != Some(id))
            .cloned()
            .collect();

        if let Some(parent_id) = &removed.parent_id {
            let has_children = rows
                .iter()
                .any(|tx| tx.parent_id.as_ref() == Some(parent_id));
            if has_children {
                recalculate_family(&mut rows, parent_id);
            } else if let Some(parent) = rows.iter_mut().find(|tx| &tx.id == parent_id) {
                parent.is_parent = false;
                parent.error = None;
            }
        }
        debug!(id = %id, "deleted draft row");

        StagingResult {
            data: Self { rows },
            diff: Diff::default(),
        }
    }

    /// Rows with every draft id replaced by a fresh committed id and parent
    /// links remapped accordingly.
    #[must_use]
    pub fn realize(&self) -> Vec<Transaction> {
        let mapping: HashMap<TxId, TxId> = self
            .rows
            .iter()
            .filter(|tx| tx.id.is_draft())
            .map(|tx| (tx.id.clone(), TxId::new_committed()))
            .collect();
        self.rows
            .iter()
            .cloned()
            .map(|mut tx| {
                if let Some(id) = mapping.get(&tx.id) {
                    tx.id = id.clone();
                }
                if let Some(parent) = tx.parent_id.as_ref().and_then(|p| mapping.get(p)) {
                    tx.parent_id = Some(parent.clone());
                }
                tx
            })
            .collect()
    }

    fn position(&self, id: &TxId) -> Option<usize> {
        self.rows.iter().position(|tx| &tx.id == id)
    }
}

/// Balance of the family owned by `parent_id` among `rows`.
#[must_use]
pub fn family_balance(rows: &[Transaction], parent_id: &TxId) -> Option<SplitBalance> {
    let parent = rows.iter().find(|tx| &tx.id == parent_id && tx.is_parent)?;
    // Summed in i128 so a huge family never wraps into a false balance.
    let mut total = 0i128;
    let mut incomplete = false;
    for child in rows.iter().filter(|tx| tx.parent_id.as_ref() == Some(parent_id)) {
        match child.amount {
            Some(amount) => total += i128::from(amount.minor()),
            None => incomplete = true,
        }
    }
    let parent_amount = i128::from(parent.amount.unwrap_or(Money::ZERO).minor());
    Some(SplitBalance {
        total: Money::saturating_from_i128(total),
        difference: Money::saturating_from_i128(parent_amount - total),
        incomplete,
    })
}

/// Recomputes the split fault of the family owned by `parent_id`.
///
/// The fault is stored on the parent and mirrored on its first child; the
/// other children carry none.
pub fn recalculate_family(rows: &mut [Transaction], parent_id: &TxId) {
    let Some(balance) = family_balance(rows, parent_id) else {
        return;
    };
    let error = (!balance.difference.is_zero()).then(|| TransactionError::split(balance.difference));

    let mut first_child = true;
    for tx in rows.iter_mut() {
        if &tx.id == parent_id {
            tx.error = error;
        } else if tx.parent_id.as_ref() == Some(parent_id) {
            tx.error = if first_child { error } else { None };
            first_child = false;
        }
    }
}
