use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::auth::{self, OAuthClient, TokenGrant};
use crate::core::{BankTransaction, SyncCursor};
use crate::ledger::{self, Ledger};
use crate::secrets::{self, SecretStore};
use crate::upstream::{self, TransactionSource};

/// Result of a single polling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Synced(TickReport),
    /// Transient failure; the batch is retried on a later tick.
    Retry(String),
    /// No usable bank credentials. Polling pauses until authorization is
    /// repeated.
    ReauthorizationRequired,
    /// The ledger refused the configured credentials.
    LedgerAuthFailed(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub forwarded: usize,
    pub rejected: usize,
    pub declined: usize,
}

/// Exponential delay between ticks after repeated failures, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures.min(16));
        self.failures = self.failures.saturating_add(1);

        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

fn forwarded_line(txn: &BankTransaction) -> String {
    let mut line = format!(
        "Forwarded {} at {} ({})",
        txn.display_amount(),
        txn.payee(),
        txn.created.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(label) = txn.category_label() {
        line.push_str(&format!("\n   Category: {}", label));
    }
    line
}

pub struct Poller<B, L, G, S> {
    bank: B,
    ledger: L,
    oauth: OAuthClient<G, S>,
    store: S,
    source_account: String,
    ledger_account: String,
    interval: Duration,
    backoff: Backoff,
}

impl<B, L, G, S> Poller<B, L, G, S>
where
    B: TransactionSource + Send + Sync,
    L: Ledger + Send,
    G: TokenGrant + Send + Sync,
    S: SecretStore + Send + Sync,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bank: B,
        ledger: L,
        oauth: OAuthClient<G, S>,
        store: S,
        source_account: String,
        ledger_account: String,
        interval: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            bank,
            ledger,
            oauth,
            store,
            source_account,
            ledger_account,
            interval,
            backoff: Backoff::new(interval, max_backoff),
        }
    }

    /// Loads the persisted cursor, creating one at `start` when none exists.
    fn cursor_or_start(&self, start: SyncCursor) -> secrets::Result<SyncCursor> {
        match self.store.load(secrets::SYNC_CURSOR)? {
            Some(cursor) => Ok(cursor),
            None => {
                info!(since = %start.created, "no sync cursor found, starting fresh");
                self.store.save(secrets::SYNC_CURSOR, &start)?;
                Ok(start)
            }
        }
    }

    /// Runs a single pass: token, fetch, forward in order, persist progress.
    pub async fn tick(&mut self) -> TickOutcome {
        let token = match self.oauth.get_valid_token().await {
            Ok(token) => token,
            Err(auth::Error::ReauthorizationRequired) => {
                return TickOutcome::ReauthorizationRequired
            }
            Err(e) => return TickOutcome::Retry(e.to_string()),
        };

        let mut cursor = match self.cursor_or_start(SyncCursor::starting_at(Utc::now())) {
            Ok(cursor) => cursor,
            Err(e) => return TickOutcome::Retry(e.to_string()),
        };

        let mut txns = match self
            .bank
            .transactions(&token, &self.source_account, &cursor)
            .await
        {
            Ok(txns) => txns,
            Err(upstream::Error::Unauthorized) => {
                return match self.oauth.refresh_now().await {
                    Err(auth::Error::ReauthorizationRequired) => {
                        TickOutcome::ReauthorizationRequired
                    }
                    _ => TickOutcome::Retry("bank rejected the access token".into()),
                };
            }
            Err(e) => return TickOutcome::Retry(e.to_string()),
        };

        txns.retain(|t| !cursor.has_passed(t));
        txns.sort_by(|a, b| (a.created, &a.id).cmp(&(b.created, &b.id)));
        debug!(count = txns.len(), "new bank transactions");

        let mut report = TickReport::default();
        for txn in &txns {
            if txn.is_declined() {
                info!(id = %txn.id, reason = ?txn.decline_reason, "skipping declined transaction");
                report.declined += 1;
            } else {
                let target = txn.to_ledger(&self.ledger_account);
                match self
                    .ledger
                    .create_transaction(&self.ledger_account, &target)
                    .await
                {
                    Ok(()) => {
                        println!("{}", forwarded_line(txn));
                        report.forwarded += 1;
                    }
                    Err(ledger::Error::Rejected(reason)) => {
                        warn!(id = %txn.id, %reason, "ledger rejected transaction, skipping it");
                        report.rejected += 1;
                    }
                    Err(ledger::Error::Unreachable(reason)) => {
                        return TickOutcome::Retry(format!(
                            "ledger unreachable after {} transaction(s): {}",
                            report.forwarded, reason
                        ));
                    }
                    Err(ledger::Error::AuthFailed(reason)) => {
                        return TickOutcome::LedgerAuthFailed(reason);
                    }
                }
            }

            if let Err(e) = self.advance(&mut cursor, txn) {
                return TickOutcome::Retry(e.to_string());
            }
        }

        TickOutcome::Synced(report)
    }

    fn advance(&self, cursor: &mut SyncCursor, txn: &BankTransaction) -> secrets::Result<()> {
        if cursor.advance(txn) {
            self.store.save(secrets::SYNC_CURSOR, cursor)?;
        }
        Ok(())
    }

    /// Polls until `shutdown` resolves. Shutdown only interrupts the wait
    /// between ticks, never a tick in progress.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut paused = false;

        loop {
            let delay = match self.tick().await {
                TickOutcome::Synced(report) => {
                    if paused {
                        println!("Bank authorization restored, resuming sync.");
                        paused = false;
                    }
                    self.backoff.reset();
                    if report != TickReport::default() {
                        info!(
                            forwarded = report.forwarded,
                            rejected = report.rejected,
                            declined = report.declined,
                            "sync pass complete"
                        );
                    }
                    self.interval
                }
                TickOutcome::Retry(reason) => {
                    let delay = self.backoff.next_delay();
                    warn!(%reason, retry_in = ?delay, "sync pass failed");
                    delay
                }
                TickOutcome::ReauthorizationRequired => {
                    if !paused {
                        println!(
                            "Bank authorization expired or was revoked. Sync is paused, \
                             run `monzo-bridge connect` to resume."
                        );
                        paused = true;
                    }
                    self.interval
                }
                TickOutcome::LedgerAuthFailed(reason) => {
                    error!(%reason, "ledger rejected credentials");
                    println!(
                        "The ledger rejected the configured credentials ({}). Sync is stopped, \
                         run `monzo-bridge init` to reconfigure and restart.",
                        reason
                    );
                    (&mut shutdown).await;
                    break;
                }
            };

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("sync stopped");
    }
}
