pub mod monetr;

use axum::async_trait;
use thiserror::Error;

use crate::core::{LedgerAccount, LedgerTransaction};

#[derive(Debug, Error)]
pub enum Error {
    #[error("ledger unreachable: {0}")]
    Unreachable(String),
    #[error("ledger rejected the configured credentials: {0}")]
    AuthFailed(String),
    #[error("ledger rejected the transaction: {0}")]
    Rejected(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Write side of the budgeting service. Creating a transaction is not
/// idempotent; callers must not submit the same source transaction twice.
#[async_trait]
pub trait Ledger {
    async fn list_accounts(&mut self) -> Result<Vec<LedgerAccount>>;

    async fn create_transaction(
        &mut self,
        bank_account_id: &str,
        txn: &LedgerTransaction,
    ) -> Result<()>;
}
