use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use tracing::info;

use crate::core::SyncCursor;
use crate::model::BridgeConfig;
use crate::poller::{Poller, TickOutcome};
use crate::secrets::{self, SecretStore};
use crate::settings::Settings;

fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("--since {:?} is not an RFC 3339 timestamp", value))
}

/// Stores a cursor at `since` unless a sync position already exists.
/// Returns whether the cursor was written.
fn seed_cursor<S: SecretStore>(store: &S, since: DateTime<Utc>) -> Result<bool> {
    if store.get(secrets::SYNC_CURSOR)?.is_some() {
        return Ok(false);
    }

    info!(%since, "seeding sync cursor");
    store.save(secrets::SYNC_CURSOR, &SyncCursor::starting_at(since))?;
    Ok(true)
}

#[tracing::instrument(skip_all)]
pub(crate) async fn run<S>(matches: &ArgMatches, settings: &Settings, store: S) -> Result<()>
where
    S: SecretStore + Clone + Send + Sync,
{
    let conf = BridgeConfig::load(&store)?;
    let source_account = conf.validate_for_sync()?.to_string();
    let since = matches.value_of("since").map(parse_since).transpose()?;

    let oauth = crate::clients::oauth_client(settings, &conf.bank, store.clone())?;
    let bank = crate::clients::bank_source(settings)?;
    let ledger = crate::clients::ledger_client(settings, &conf.ledger)?;

    if let Some(since) = since {
        if !seed_cursor(&store, since)? {
            println!("A sync position is already stored, ignoring --since. Use `monzo-bridge reset` to start over.");
        }
    }

    let mut poller = Poller::new(
        bank,
        ledger,
        oauth,
        store.clone(),
        source_account,
        conf.ledger.bank_account_id.clone(),
        settings.poll_interval(),
        settings.max_backoff(),
    );

    if matches.is_present("once") {
        return match poller.tick().await {
            TickOutcome::Synced(report) => {
                println!(
                    "Forwarded {} transaction(s), skipped {} rejected and {} declined.",
                    report.forwarded, report.rejected, report.declined
                );
                Ok(())
            }
            TickOutcome::Retry(reason) => Err(anyhow!("sync failed, try again later: {}", reason)),
            TickOutcome::ReauthorizationRequired => Err(anyhow!(
                "bank authorization expired or was revoked, run `monzo-bridge connect`"
            )),
            TickOutcome::LedgerAuthFailed(reason) => Err(anyhow!(
                "Monetr rejected the configured credentials ({}), run `monzo-bridge init`",
                reason
            )),
        };
    }

    info!(interval = ?settings.poll_interval(), "starting sync");
    println!(
        "Syncing every {}s into Monetr account {}. Press Ctrl+C to stop.",
        settings.poll_interval().as_secs(),
        conf.ledger.bank_account_id
    );
    poller.run(crate::shutdown::signal()).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::secrets::memory::MemoryStore;

    #[test]
    fn since_accepts_rfc3339() {
        assert_eq!(
            parse_since("2024-03-09T10:00:00+01:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap()
        );
        assert!(parse_since("2024-03-09").is_err());
    }

    #[test]
    fn since_seeds_empty_store() {
        let store = MemoryStore::default();
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        assert!(seed_cursor(&store, since).unwrap());

        let cursor: SyncCursor = store.load(secrets::SYNC_CURSOR).unwrap().unwrap();
        assert_eq!(cursor, SyncCursor::starting_at(since));
    }

    #[test]
    fn since_ignored_when_cursor_exists() {
        let store = MemoryStore::default();
        let existing = SyncCursor {
            created: Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap(),
            transaction_id: Some("tx_0000AAA".to_string()),
        };
        store.save(secrets::SYNC_CURSOR, &existing).unwrap();

        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(!seed_cursor(&store, since).unwrap());

        let cursor: SyncCursor = store.load(secrets::SYNC_CURSOR).unwrap().unwrap();
        assert_eq!(cursor, existing);
    }
}
