use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::secrets::{self, SecretStore};

pub const BANK_ACCOUNT_PREFIX: &str = "bac_";

/// Everything the setup wizard collects. Lives in the secret store, never on
/// disk.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub ledger: LedgerConfig,
    pub bank: BankConfig,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    pub url: String,
    pub email: String,
    pub password: String,
    /// Target ledger account, immutable once setup completes.
    pub bank_account_id: String,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Bank account polled for transactions, picked during `connect`.
    #[serde(default)]
    pub account_id: Option<String>,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("url", &self.url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("bank_account_id", &self.bank_account_id)
            .finish()
    }
}

impl std::fmt::Debug for BankConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl LedgerConfig {
    pub fn new(url: &str, email: &str, password: &str, bank_account_id: &str) -> Result<Self> {
        let url = url.trim().trim_end_matches('/');
        Url::parse(url).map_err(|e| anyhow!("ledger URL {:?} is not valid: {}", url, e))?;

        if email.trim().is_empty() {
            return Err(anyhow!("ledger email must not be empty"));
        }

        if password.is_empty() {
            return Err(anyhow!("ledger password must not be empty"));
        }

        if bank_account_id.trim().is_empty() {
            return Err(anyhow!("ledger bank account ID must not be empty"));
        }

        Ok(Self {
            url: url.to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            bank_account_id: bank_account_id.trim().to_string(),
        })
    }

    pub fn has_expected_account_prefix(&self) -> bool {
        self.bank_account_id.starts_with(BANK_ACCOUNT_PREFIX)
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!("{}/", self.url))?)
    }
}

impl BankConfig {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        if client_id.trim().is_empty() {
            return Err(anyhow!("bank client ID must not be empty"));
        }

        if client_secret.trim().is_empty() {
            return Err(anyhow!("bank client secret must not be empty"));
        }

        Ok(Self {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
            account_id: None,
        })
    }
}

impl BridgeConfig {
    pub fn load<S: SecretStore>(store: &S) -> Result<Self> {
        let ledger = Self::load_ledger(store)?
            .ok_or_else(|| anyhow!("ledger is not configured, run `monzo-bridge init`"))?;
        let bank = Self::load_bank(store)?
            .ok_or_else(|| anyhow!("bank is not configured, run `monzo-bridge init`"))?;

        Ok(Self { ledger, bank })
    }

    pub fn load_ledger<S: SecretStore>(store: &S) -> Result<Option<LedgerConfig>> {
        store
            .load(secrets::LEDGER_CONFIG)
            .context("reading ledger configuration")
    }

    pub fn load_bank<S: SecretStore>(store: &S) -> Result<Option<BankConfig>> {
        store
            .load(secrets::BANK_CONFIG)
            .context("reading bank configuration")
    }

    pub fn save_ledger<S: SecretStore>(store: &S, conf: &LedgerConfig) -> Result<()> {
        store
            .save(secrets::LEDGER_CONFIG, conf)
            .context("saving ledger configuration")
    }

    pub fn save_bank<S: SecretStore>(store: &S, conf: &BankConfig) -> Result<()> {
        store
            .save(secrets::BANK_CONFIG, conf)
            .context("saving bank configuration")
    }

    /// Checks the configuration is complete enough to start polling.
    pub fn validate_for_sync(&self) -> Result<&str> {
        self.ledger.base_url()?;

        self.bank
            .account_id
            .as_deref()
            .ok_or_else(|| anyhow!("no bank account selected, run `monzo-bridge connect`"))
    }
}
