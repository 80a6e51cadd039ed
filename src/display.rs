use std::io::Write;

use anyhow::Result;
use tabwriter::TabWriter;

use crate::core::{BankAccount, LedgerAccount};

pub fn print_bank_accounts<T: Write>(wr: T, accounts: &[BankAccount], selected: Option<&str>) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "\tAccount\tAccount ID\tType\tStatus")?;

    for account in accounts.iter() {
        let marker = if Some(account.id.as_str()) == selected { "*" } else { "" };
        let status = if account.closed { "closed" } else { "open" };
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t{}",
            marker, account.description, account.id, account.ty, status,
        )?;
    }

    tw.flush()?;

    Ok(())
}

pub fn print_ledger_accounts<T: Write>(wr: T, accounts: &[LedgerAccount], target: &str) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "\tLedger Account\tBank Account ID")?;

    for account in accounts.iter() {
        let marker = if account.bank_account_id == target { "*" } else { "" };
        writeln!(tw, "{}\t{}\t{}", marker, account.name, account.bank_account_id)?;
    }

    tw.flush()?;

    Ok(())
}
