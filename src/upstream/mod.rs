pub mod monzo;

use axum::async_trait;
use thiserror::Error;

use crate::core::{BankAccount, BankTransaction, SyncCursor};

#[derive(Debug, Error)]
pub enum Error {
    #[error("bank rejected the access token")]
    Unauthorized,
    #[error("bank refused access, the app may still need approval: {0}")]
    Forbidden(String),
    #[error("bank API unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected bank API response: {0}")]
    Protocol(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

#[async_trait]
pub trait AccountSource {
    async fn accounts(&self, access_token: &str) -> Result<Vec<BankAccount>>;
}

#[async_trait]
pub trait TransactionSource {
    /// Transactions on `account_id` after `since`, following pagination until
    /// the feed is exhausted.
    async fn transactions(
        &self,
        access_token: &str,
        account_id: &str,
        since: &SyncCursor,
    ) -> Result<Vec<BankTransaction>>;
}
