//! Collaborators owning committed transactions.

use crate::{ResultEngine, Transaction, TxId};

/// Persistent side of the grid.
///
/// The engine only manages the draft family locally; every mutation of a
/// committed family goes through this trait.
#[allow(async_fn_in_trait)]
pub trait TransactionStore {
    /// Persists an edited committed transaction.
    async fn save(&mut self, tx: &Transaction) -> ResultEngine<()>;

    /// Persists a freshly committed draft family (parent first).
    async fn add(&mut self, family: &[Transaction]) -> ResultEngine<()>;

    fn delete(&mut self, id: &TxId) -> ResultEngine<()>;

    /// Splits a committed transaction, returning the new child id.
    fn split(&mut self, id: &TxId) -> ResultEngine<TxId>;

    /// Adds one more child to a committed parent, returning its id.
    fn add_split(&mut self, parent_id: &TxId) -> ResultEngine<TxId>;

    /// Optional transform (e.g. auto-categorization) run before a commit.
    async fn apply_rules(&self, tx: Transaction) -> Transaction {
        tx
    }
}
