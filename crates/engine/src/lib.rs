//! Editing engine behind an interactive ledger grid.
//!
//! The grid shows committed transactions, split families (a parent whose
//! amount is distributed over children) and one unsaved draft family. This
//! crate owns the parts with real invariants:
//!
//! - [`Codec`]: signed amount ⇄ debit/credit text cells.
//! - [`SplitExpansion`]: which split families are expanded, including the
//!   animated global mode switch.
//! - [`StagingBuffer`]: the draft family and its structural operations.
//! - [`Navigator`]: focused row/field and traversal order.
//! - [`TableController`]: wires user intents to the above and to a
//!   [`TransactionStore`].

pub use codec::{Codec, DisplayTransaction};
pub use controller::{
    AfterSave, CommitTicket, ControllerConfig, Notification, NotificationLevel, Region,
    TableController,
};
pub use currency::Currency;
pub use error::EngineError;
pub use expansion::{
    ExpansionAction, ExpansionCache, ExpansionMode, ExpansionSnapshot, MemoryCache,
    SETTLE_DELAY, SplitExpansion, SplitExpansionState,
};
pub use money::Money;
pub use navigator::{Columns, Field, Focus, Navigator, RowKind, RowShape};
pub use reference::{Record, ReferenceData};
pub use staging::{Diff, SplitBalance, StagingBuffer, StagingResult};
pub use store::TransactionStore;
pub use transaction::{IdTier, Transaction, TransactionError, TransactionPatch, TxId};

pub mod arithmetic;
pub mod codec;
pub mod controller;
pub mod currency;
pub mod error;
pub mod expansion;
pub mod money;
pub mod navigator;
pub mod reference;
pub mod staging;
pub mod store;
pub mod transaction;

type ResultEngine<T> = Result<T, EngineError>;
