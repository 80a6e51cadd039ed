use anyhow::Result;
use tracing::info;

use crate::model::BridgeConfig;
use crate::prompt::Prompt;
use crate::secrets::{self, SecretStore};
use crate::settings::Settings;

const ALL_KEYS: [&str; 4] = [
    secrets::BANK_CREDENTIALS,
    secrets::SYNC_CURSOR,
    secrets::BANK_CONFIG,
    secrets::LEDGER_CONFIG,
];

/// Forgets the bank tokens. Configuration and sync position are kept.
pub(crate) fn logout<S>(settings: &Settings, store: S) -> Result<()>
where
    S: SecretStore + Clone + Send + Sync,
{
    match BridgeConfig::load_bank(&store)? {
        Some(bank) => crate::clients::oauth_client(settings, &bank, store)?.logout()?,
        None => store.delete(secrets::BANK_CREDENTIALS)?,
    }

    println!("Logged out of Monzo. Run `monzo-bridge connect` to authorize again.");
    Ok(())
}

fn clear<S: SecretStore>(store: &S) -> Result<()> {
    for key in ALL_KEYS {
        store.delete(key)?;
        info!(key, "deleted");
    }

    Ok(())
}

/// Deletes everything the bridge stored.
pub(crate) fn reset<S: SecretStore>(store: &S, confirmed: bool) -> Result<()> {
    if !confirmed
        && !Prompt::stdio().confirm(
            "Delete all stored credentials, configuration and sync progress?",
            false,
        )?
    {
        println!("Nothing was deleted.");
        return Ok(());
    }

    clear(store)?;
    println!("All stored data removed. Run `monzo-bridge init` to set up again.");
    Ok(())
}
