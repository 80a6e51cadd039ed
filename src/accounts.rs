use anyhow::{Context, Result};

use crate::display::{print_bank_accounts, print_ledger_accounts};
use crate::ledger::Ledger;
use crate::model::BridgeConfig;
use crate::secrets::SecretStore;
use crate::settings::Settings;
use crate::upstream::AccountSource;

pub(crate) async fn run<S>(settings: &Settings, store: S) -> Result<()>
where
    S: SecretStore + Clone + Send + Sync,
{
    let conf = BridgeConfig::load(&store)?;

    let mut oauth = crate::clients::oauth_client(settings, &conf.bank, store)?;
    let token = oauth.get_valid_token().await?;
    let accounts = crate::clients::bank_source(settings)?
        .accounts(&token)
        .await
        .context("listing Monzo accounts")?;

    println!("Monzo accounts");
    print_bank_accounts(std::io::stdout(), &accounts, conf.bank.account_id.as_deref())?;

    let ledger_accounts = crate::clients::ledger_client(settings, &conf.ledger)?
        .list_accounts()
        .await
        .context("listing Monetr accounts")?;

    println!("\nMonetr accounts");
    print_ledger_accounts(
        std::io::stdout(),
        &ledger_accounts,
        &conf.ledger.bank_account_id,
    )?;

    Ok(())
}
