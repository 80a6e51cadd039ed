mod account;
mod cursor;
mod txn;

pub use account::{BankAccount, LedgerAccount};
pub use cursor::SyncCursor;
pub use txn::{BankTransaction, LedgerTransaction, Merchant};
