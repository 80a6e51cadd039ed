use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::BankTransaction;

/// Marks the last transaction handed to the ledger, or skipped on purpose.
/// Transactions are ordered by `(created, id)`; everything at or before the
/// cursor is considered synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub created: DateTime<Utc>,
    pub transaction_id: Option<String>,
}

impl SyncCursor {
    pub fn starting_at(created: DateTime<Utc>) -> Self {
        Self {
            created,
            transaction_id: None,
        }
    }

    pub fn has_passed(&self, txn: &BankTransaction) -> bool {
        match txn.created.cmp(&self.created) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => match &self.transaction_id {
                Some(id) => txn.id.as_str() <= id.as_str(),
                None => true,
            },
        }
    }

    /// Moves the cursor to `txn`. Returns false, leaving the cursor untouched,
    /// when that would move it backwards.
    pub fn advance(&mut self, txn: &BankTransaction) -> bool {
        if self.has_passed(txn) {
            return false;
        }

        self.created = txn.created;
        self.transaction_id = Some(txn.id.clone());
        true
    }

    /// Value for the bank API's `since` parameter. The bank treats a
    /// transaction id as exclusive, so it is preferred over the timestamp.
    pub fn since_param(&self) -> String {
        match &self.transaction_id {
            Some(id) => id.clone(),
            None => self.created.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
