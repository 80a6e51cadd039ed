use serde::{Deserialize, Serialize};

/// An account held at the bank, as listed by the bank API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub closed: bool,
}

/// A bank account tracked by the budgeting ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccount {
    pub bank_account_id: String,
    pub name: String,
}
