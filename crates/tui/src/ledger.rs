//! Local transaction store backing the grid.
//!
//! Transactions live in memory, newest first with children right after their
//! parent, and are written back to the ledger file after every change.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use grid_engine::{
    EngineError, Record, ReferenceData, Transaction, TransactionStore, TxId,
    staging::recalculate_family,
};

use crate::error::Result;

/// Category assigned to new transactions from a payee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayeeRule {
    pub payee_id: String,
    pub category_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerFile {
    #[serde(default)]
    pub accounts: Vec<Record>,
    #[serde(default)]
    pub payees: Vec<Record>,
    #[serde(default)]
    pub categories: Vec<Record>,
    #[serde(default)]
    pub rules: Vec<PayeeRule>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug)]
pub struct Ledger {
    file: LedgerFile,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Loads the ledger at `path`; a missing file starts from demo data that
    /// is written there on the first change.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::in_memory(demo(Local::now().date_naive())));
        };
        let path = PathBuf::from(path);
        let file = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no ledger file, starting from demo data");
                demo(Local::now().date_naive())
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            file,
            path: Some(path),
        })
    }

    pub fn in_memory(file: LedgerFile) -> Self {
        Self { file, path: None }
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.file.transactions.clone()
    }

    pub fn reference(&self) -> ReferenceData {
        ReferenceData::default()
            .with_accounts(self.file.accounts.iter().cloned())
            .with_payees(self.file.payees.iter().cloned())
            .with_categories(self.file.categories.iter().cloned())
    }

    fn position(&self, id: &TxId) -> std::result::Result<usize, EngineError> {
        self.file
            .transactions
            .iter()
            .position(|tx| &tx.id == id)
            .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))
    }

    fn insert_child(&mut self, parent_id: &TxId) -> std::result::Result<TxId, EngineError> {
        let index = self.position(parent_id)?;
        let child = Transaction::child_of(&self.file.transactions[index], TxId::new_committed());
        let child_id = child.id.clone();
        let insert_at = self
            .file
            .transactions
            .iter()
            .rposition(|tx| tx.parent_id.as_ref() == Some(parent_id))
            .unwrap_or(index)
            + 1;
        self.file.transactions.insert(insert_at, child);
        recalculate_family(&mut self.file.transactions, parent_id);
        Ok(child_id)
    }

    fn flush(&self) -> std::result::Result<(), EngineError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_file(path, &self.file).map_err(|err| EngineError::Rejected(err.to_string()))
    }

    /// Writes the file, restoring `before` in memory when the write fails.
    fn flush_or_restore(
        &mut self,
        before: Vec<Transaction>,
    ) -> std::result::Result<(), EngineError> {
        if let Err(err) = self.flush() {
            warn!("ledger write failed, change reverted: {err}");
            self.file.transactions = before;
            return Err(err);
        }
        Ok(())
    }
}

fn write_file(path: &Path, file: &LedgerFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let payload = serde_json::to_string_pretty(file)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, payload)?;
    if fs::rename(&tmp, path).is_err() {
        fs::copy(&tmp, path)?;
        let _ = fs::remove_file(&tmp);
    }
    Ok(())
}

impl TransactionStore for Ledger {
    async fn save(&mut self, tx: &Transaction) -> std::result::Result<(), EngineError> {
        let index = self.position(&tx.id)?;
        let before = self.file.transactions.clone();
        self.file.transactions[index] = tx.clone();
        if tx.is_parent {
            for child in self
                .file
                .transactions
                .iter_mut()
                .filter(|child| child.parent_id.as_ref() == Some(&tx.id))
            {
                child.date = tx.date;
                child.account_id = tx.account_id.clone();
                child.cleared = tx.cleared;
            }
        }
        let family = if tx.is_parent {
            Some(tx.id.clone())
        } else {
            tx.parent_id.clone()
        };
        if let Some(parent_id) = family {
            recalculate_family(&mut self.file.transactions, &parent_id);
        }
        debug!(id = %tx.id, "saved transaction");
        self.flush_or_restore(before)
    }

    async fn add(&mut self, family: &[Transaction]) -> std::result::Result<(), EngineError> {
        let before = self.file.transactions.clone();
        self.file.transactions.splice(0..0, family.iter().cloned());
        info!(rows = family.len(), "added transactions");
        self.flush_or_restore(before)
    }

    fn delete(&mut self, id: &TxId) -> std::result::Result<(), EngineError> {
        let index = self.position(id)?;
        let parent_id = self.file.transactions[index].parent_id.clone();
        let before = self.file.transactions.clone();
        self.file
            .transactions
            .retain(|tx| &tx.id != id && tx.parent_id.as_ref() != Some(id));

        if let Some(parent_id) = parent_id {
            let has_children = self
                .file
                .transactions
                .iter()
                .any(|tx| tx.parent_id.as_ref() == Some(&parent_id));
            if has_children {
                recalculate_family(&mut self.file.transactions, &parent_id);
            } else if let Some(parent) = self
                .file
                .transactions
                .iter_mut()
                .find(|tx| tx.id == parent_id)
            {
                parent.is_parent = false;
                parent.error = None;
            }
        }
        self.flush_or_restore(before)
    }

    fn split(&mut self, id: &TxId) -> std::result::Result<TxId, EngineError> {
        let index = self.position(id)?;
        let before = self.file.transactions.clone();
        let tx = &mut self.file.transactions[index];
        if tx.is_child() {
            return Err(EngineError::Rejected(
                "a split line cannot be split again".to_string(),
            ));
        }
        if !tx.is_parent {
            tx.is_parent = true;
            tx.category_id = None;
        }
        let child_id = self.insert_child(id)?;
        self.flush_or_restore(before)?;
        Ok(child_id)
    }

    fn add_split(&mut self, parent_id: &TxId) -> std::result::Result<TxId, EngineError> {
        let index = self.position(parent_id)?;
        if !self.file.transactions[index].is_parent {
            return Err(EngineError::Rejected(format!(
                "{parent_id} is not a split transaction"
            )));
        }
        let before = self.file.transactions.clone();
        let child_id = self.insert_child(parent_id)?;
        self.flush_or_restore(before)?;
        Ok(child_id)
    }

    async fn apply_rules(&self, mut tx: Transaction) -> Transaction {
        if tx.category_id.is_some() || tx.is_parent {
            return tx;
        }
        if let Some(payee_id) = &tx.payee_id
            && let Some(rule) = self
                .file
                .rules
                .iter()
                .find(|rule| &rule.payee_id == payee_id)
        {
            tx.category_id = Some(rule.category_id.clone());
        }
        tx
    }
}

/// Small ledger shown when no file is configured.
pub fn demo(today: NaiveDate) -> LedgerFile {
    let days_ago = |days: u64| today.checked_sub_days(Days::new(days)).unwrap_or(today);

    let groceries = TxId::new_committed();
    let market = TxId::new_committed();
    let mut transactions = vec![
        Transaction::new(TxId::preview(
            "rent",
            today.checked_add_days(Days::new(20)).unwrap_or(today),
        ))
        .with_amount(-120_000)
        .with_account("checking")
        .with_payee("landlord")
        .with_category("rent"),
        Transaction::new(groceries.clone())
            .with_amount(-8450)
            .with_date(days_ago(1))
            .with_account("checking")
            .with_payee("grocer")
            .as_parent(),
        Transaction::new(TxId::new_committed())
            .with_parent(groceries.clone())
            .with_amount(-6000)
            .with_date(days_ago(1))
            .with_account("checking")
            .with_category("food"),
        Transaction::new(TxId::new_committed())
            .with_parent(groceries.clone())
            .with_amount(-2450)
            .with_date(days_ago(1))
            .with_account("checking")
            .with_category("household"),
        Transaction::new(market.clone())
            .with_amount(-5000)
            .with_date(days_ago(3))
            .with_account("checking")
            .with_payee("grocer")
            .as_parent(),
        Transaction::new(TxId::new_committed())
            .with_parent(market.clone())
            .with_amount(-3000)
            .with_date(days_ago(3))
            .with_account("checking")
            .with_category("food"),
        Transaction::new(TxId::new_committed())
            .with_amount(-120_000)
            .with_date(days_ago(5))
            .with_account("checking")
            .with_payee("landlord")
            .with_category("rent"),
        Transaction::new(TxId::new_committed())
            .with_amount(250_000)
            .with_date(days_ago(10))
            .with_account("checking")
            .with_payee("employer")
            .with_category("salary"),
    ];
    for tx in &mut transactions[..6] {
        tx.cleared = !tx.id.is_preview();
    }
    recalculate_family(&mut transactions, &groceries);
    recalculate_family(&mut transactions, &market);

    LedgerFile {
        accounts: vec![
            Record::new("checking", "Checking"),
            Record::new("savings", "Savings"),
        ],
        payees: vec![
            Record::new("grocer", "Grocer"),
            Record::new("landlord", "Landlord"),
            Record::new("employer", "Employer"),
        ],
        categories: vec![
            Record::new("food", "Food"),
            Record::new("household", "Household"),
            Record::new("rent", "Rent"),
            Record::new("salary", "Salary"),
        ],
        rules: vec![PayeeRule {
            payee_id: "landlord".to_string(),
            category_id: "rent".to_string(),
        }],
        transactions,
    }
}

#[cfg(test)]
mod tests {
    use grid_engine::{Money, TransactionError};

    use super::*;

    fn ledger() -> Ledger {
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        Ledger::in_memory(demo(today))
    }

    fn single(id: &str) -> Ledger {
        Ledger::in_memory(LedgerFile {
            transactions: vec![
                Transaction::new(TxId::new(id))
                    .with_amount(-1000)
                    .with_category("food"),
            ],
            ..LedgerFile::default()
        })
    }

    #[test]
    fn demo_families_carry_split_errors() {
        let ledger = ledger();
        let parents: Vec<_> = ledger
            .transactions()
            .into_iter()
            .filter(|tx| tx.is_parent)
            .collect();
        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0].error, None);
        assert_eq!(
            parents[1].error,
            Some(TransactionError::split(Money::new(-2000)))
        );
    }

    #[test]
    fn split_clears_category_and_appends_children() {
        let mut ledger = single("a");
        let first = ledger.split(&TxId::new("a")).unwrap();
        let second = ledger.add_split(&TxId::new("a")).unwrap();

        let rows = ledger.transactions();
        assert!(rows[0].is_parent);
        assert_eq!(rows[0].category_id, None);
        assert_eq!(rows[1].id, first);
        assert_eq!(rows[2].id, second);
        assert_eq!(
            rows[0].error,
            Some(TransactionError::split(Money::new(-1000)))
        );
    }

    #[test]
    fn split_of_child_is_rejected() {
        let mut ledger = single("a");
        let child = ledger.split(&TxId::new("a")).unwrap();
        assert!(matches!(
            ledger.split(&child),
            Err(EngineError::Rejected(_))
        ));
    }

    #[test]
    fn deleting_last_child_unsplits() {
        let mut ledger = single("a");
        let child = ledger.split(&TxId::new("a")).unwrap();
        ledger.delete(&child).unwrap();

        let rows = ledger.transactions();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_parent);
        assert_eq!(rows[0].error, None);
    }

    #[test]
    fn unknown_id_is_reported() {
        let mut ledger = single("a");
        assert_eq!(
            ledger.delete(&TxId::new("zz")),
            Err(EngineError::KeyNotFound("zz".to_string()))
        );
    }

    #[tokio::test]
    async fn saving_a_child_rebalances_family() {
        let mut ledger = single("a");
        let child_id = ledger.split(&TxId::new("a")).unwrap();
        let child = ledger.transactions()[1].clone();
        let mut updated = child.clone();
        updated.amount = Some(Money::new(-1000));

        ledger.save(&updated).await.unwrap();

        let rows = ledger.transactions();
        assert_eq!(rows[1].id, child_id);
        assert_eq!(rows[0].error, None);
        assert_eq!(rows[1].error, None);
    }

    #[tokio::test]
    async fn rules_fill_missing_category() {
        let ledger = ledger();
        let tx = Transaction::new(TxId::new_committed()).with_payee("landlord");
        let ruled = ledger.apply_rules(tx).await;
        assert_eq!(ruled.category_id.as_deref(), Some("rent"));

        let tx = Transaction::new(TxId::new_committed())
            .with_payee("landlord")
            .with_category("food");
        let ruled = ledger.apply_rules(tx).await;
        assert_eq!(ruled.category_id.as_deref(), Some("food"));
    }

    #[tokio::test]
    async fn changes_are_written_back() {
        let dir = std::env::temp_dir().join(format!("grid_ledger_{}", uuid::Uuid::new_v4()));
        let path = dir.join("ledger.json");
        let path_str = path.to_string_lossy().to_string();

        let mut ledger = Ledger::open(Some(&path_str)).unwrap();
        assert!(!path.exists());
        let family = vec![
            Transaction::new(TxId::new("fresh"))
                .with_amount(-300)
                .with_account("checking"),
        ];
        ledger.add(&family).await.unwrap();

        let reopened = Ledger::open(Some(&path_str)).unwrap();
        assert_eq!(reopened.transactions()[0].id, TxId::new("fresh"));
        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn failed_write_leaves_rows_untouched() {
        let dir = std::env::temp_dir().join(format!("grid_ledger_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut ledger = single("a");
        let child_id = ledger.split(&TxId::new("a")).unwrap();
        ledger.path = Some(blocker.join("ledger.json"));
        let before = ledger.transactions();

        assert!(matches!(
            ledger.add_split(&TxId::new("a")),
            Err(EngineError::Rejected(_))
        ));
        assert_eq!(ledger.transactions(), before);

        let mut updated = before[1].clone();
        updated.amount = Some(Money::new(-1000));
        assert!(ledger.save(&updated).await.is_err());
        assert_eq!(ledger.transactions(), before);

        let fresh = vec![Transaction::new(TxId::new("fresh")).with_amount(-300)];
        assert!(ledger.add(&fresh).await.is_err());
        assert_eq!(ledger.transactions(), before);

        assert!(ledger.delete(&child_id).is_err());
        assert_eq!(ledger.transactions(), before);
        let _ = fs::remove_dir_all(dir);
    }
}
