//! Read-only lookup tables (accounts, payees, categories).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::navigator::Field;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
}

impl Record {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub accounts: HashMap<String, Record>,
    #[serde(default)]
    pub payees: HashMap<String, Record>,
    #[serde(default)]
    pub categories: HashMap<String, Record>,
}

impl ReferenceData {
    #[must_use]
    pub fn with_accounts(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.accounts
            .extend(records.into_iter().map(|r| (r.id.clone(), r)));
        self
    }

    #[must_use]
    pub fn with_payees(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.payees
            .extend(records.into_iter().map(|r| (r.id.clone(), r)));
        self
    }

    #[must_use]
    pub fn with_categories(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.categories
            .extend(records.into_iter().map(|r| (r.id.clone(), r)));
        self
    }

    fn table(&self, field: Field) -> Option<&HashMap<String, Record>> {
        match field {
            Field::Account => Some(&self.accounts),
            Field::Payee => Some(&self.payees),
            Field::Category => Some(&self.categories),
            _ => None,
        }
    }

    /// Display name for an id, falling back to the id itself.
    #[must_use]
    pub fn name<'a>(&'a self, field: Field, id: &'a str) -> &'a str {
        self.table(field)
            .and_then(|table| table.get(id))
            .map_or(id, |record| record.name.as_str())
    }

    /// Maps typed text to an id: exact id first, then a case-insensitive
    /// name match. Unknown text is returned unchanged.
    #[must_use]
    pub fn resolve(&self, field: Field, text: &str) -> String {
        let trimmed = text.trim();
        let Some(table) = self.table(field) else {
            return text.to_string();
        };
        if table.contains_key(trimmed) {
            return trimmed.to_string();
        }
        table
            .values()
            .find(|record| record.name.eq_ignore_ascii_case(trimmed))
            .map_or_else(|| trimmed.to_string(), |record| record.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_and_ids() {
        let data = ReferenceData::default()
            .with_payees([Record::new("p1", "Grocer")])
            .with_accounts([Record::new("a1", "Checking")]);
        assert_eq!(data.resolve(Field::Payee, "grocer"), "p1");
        assert_eq!(data.resolve(Field::Payee, "p1"), "p1");
        assert_eq!(data.resolve(Field::Payee, "Bakery"), "Bakery");
        assert_eq!(data.name(Field::Account, "a1"), "Checking");
        assert_eq!(data.name(Field::Account, "zz"), "zz");
        assert_eq!(data.resolve(Field::Notes, " hi "), " hi ");
    }
}
