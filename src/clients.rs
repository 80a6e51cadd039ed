use anyhow::{Context, Result};

use crate::auth::{monzo::Grant, OAuthClient};
use crate::ledger::monetr;
use crate::model::{BankConfig, LedgerConfig};
use crate::secrets::SecretStore;
use crate::settings::Settings;
use crate::upstream::monzo::Source;

pub(crate) fn oauth_client<S>(
    settings: &Settings,
    bank: &BankConfig,
    store: S,
) -> Result<OAuthClient<Grant, S>>
where
    S: SecretStore + Send + Sync,
{
    let grant = Grant::new(
        bank,
        settings.bank.auth_url.clone(),
        &settings.bank.api_url,
        settings.redirect_uri(),
        settings.http_timeout(),
    )
    .context("building bank token client")?;

    Ok(OAuthClient::new(grant, store, settings.refresh_margin()))
}

pub(crate) fn bank_source(settings: &Settings) -> Result<Source> {
    Source::new(
        settings.bank.api_url.clone(),
        settings.bank.page_size,
        settings.http_timeout(),
    )
    .context("building bank API client")
}

pub(crate) fn ledger_client(settings: &Settings, conf: &LedgerConfig) -> Result<monetr::Client> {
    monetr::Client::new(conf, settings.http_timeout()).context("building ledger client")
}
