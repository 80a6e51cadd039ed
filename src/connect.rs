use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use oauth_callback::{CallbackServer, Grant, Outcome};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::auth::{OAuthClient, PendingAuthorization, TokenGrant};
use crate::core::BankAccount;
use crate::display::print_bank_accounts;
use crate::model::{BankConfig, BridgeConfig};
use crate::prompt::Prompt;
use crate::secrets::{self, SecretStore};
use crate::settings::Settings;
use crate::upstream::{self, AccountSource};

async fn shutdown_signal(mut on_grant: broadcast::Receiver<Outcome>, timeout: Duration) {
    tokio::select! {
        _ = crate::shutdown::signal() => {},
        _ = on_grant.recv() => debug!("authorization redirect received"),
        _ = tokio::time::sleep(timeout) => println!("timed out waiting for the authorization redirect"),
    }
}

/// Serves the redirect target until the bank hands back a code or a denial,
/// the user interrupts, or `timeout` passes.
async fn wait_for_grant(pending: &PendingAuthorization, port: u16, timeout: Duration) -> Result<Grant> {
    let callback = CallbackServer::new(pending.state.clone());
    let mut received = callback.on_grant();
    let done = callback.on_grant();

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("listening for the authorization redirect on {}", addr))?
        .serve(callback.start().into_make_service())
        .with_graceful_shutdown(shutdown_signal(done, timeout));

    println!("Visit the following URL to authorize access to your Monzo account:\n\n{}\n", pending.url);
    server.await.context("authorization redirect listener failed")?;

    match received.try_recv() {
        Ok(Ok(grant)) => Ok(grant),
        Ok(Err(e)) => Err(anyhow!(e).context("Monzo authorization failed")),
        Err(_) => Err(anyhow!("authorization was not completed")),
    }
}

/// Lists accounts until the user has approved access in the Monzo app.
async fn wait_for_approval<G, S, B, R, W>(
    oauth: &mut OAuthClient<G, S>,
    bank: &B,
    prompt: &mut Prompt<R, W>,
) -> Result<Vec<BankAccount>>
where
    G: TokenGrant + Send + Sync,
    S: SecretStore + Send + Sync,
    B: AccountSource,
    R: BufRead,
    W: Write,
{
    loop {
        let token = oauth.get_valid_token().await?;
        match bank.accounts(&token).await {
            Ok(accounts) => return Ok(accounts),
            Err(upstream::Error::Forbidden(reason)) => {
                debug!(%reason, "bank access not approved yet");
                prompt.say("Open the Monzo app and approve access for this client.")?;
                if !prompt.confirm("Approved?", true)? {
                    return Err(anyhow!(
                        "access was not approved in the Monzo app, run `monzo-bridge connect` again"
                    ));
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Picks the account to sync. A single open account is chosen without asking.
fn select_account<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    accounts: &[BankAccount],
    current: Option<&str>,
) -> Result<String> {
    let open: Vec<BankAccount> = accounts.iter().filter(|a| !a.closed).cloned().collect();

    match open.as_slice() {
        [] => Err(anyhow!("no open Monzo accounts found")),
        [only] => {
            prompt.say(&format!("Syncing {} ({}).", only.description, only.id))?;
            Ok(only.id.clone())
        }
        _ => {
            let mut table = vec![];
            print_bank_accounts(&mut table, &open, current)?;
            prompt.say(String::from_utf8(table)?.trim_end())?;

            let default = current
                .filter(|id| open.iter().any(|a| a.id == *id))
                .unwrap_or(open[0].id.as_str());
            loop {
                let id = prompt.ask("Account ID to sync", Some(default))?;
                if open.iter().any(|a| a.id == id) {
                    return Ok(id);
                }
                prompt.say(&format!("{} is not one of the listed accounts.", id))?;
            }
        }
    }
}

/// Stores the account to sync. Switching accounts drops the sync position,
/// which only applies to the feed it was taken from.
fn save_selection<S: SecretStore>(store: &S, bank: &mut BankConfig, selected: String) -> Result<()> {
    if bank.account_id.as_deref() != Some(selected.as_str()) {
        store.delete(secrets::SYNC_CURSOR)?;
        info!(previous = ?bank.account_id, "source account changed, syncing restarts from now");
    }

    bank.account_id = Some(selected);
    BridgeConfig::save_bank(store, bank)
}

pub(crate) async fn run<S>(settings: &Settings, store: S) -> Result<()>
where
    S: SecretStore + Clone + Send + Sync,
{
    let mut bank_conf = BridgeConfig::load_bank(&store)?
        .ok_or_else(|| anyhow!("bank is not configured, run `monzo-bridge init`"))?;
    let mut oauth = crate::clients::oauth_client(settings, &bank_conf, store.clone())?;
    let source = crate::clients::bank_source(settings)?;

    let pending = oauth.begin_authorization();
    let grant = wait_for_grant(&pending, settings.callback_port, settings.callback_timeout()).await?;
    oauth
        .complete_authorization(pending, &grant.code, &grant.state)
        .await
        .context("exchanging the authorization code")?;
    debug!(state = ?oauth.state(), "authorization code exchanged");
    println!("Authorization received.");

    let mut prompt = Prompt::stdio();
    let accounts = wait_for_approval(&mut oauth, &source, &mut prompt).await?;
    let selected = select_account(&mut prompt, &accounts, bank_conf.account_id.as_deref())?;

    save_selection(&store, &mut bank_conf, selected)?;
    info!(account = ?bank_conf.account_id, "bank account selected");
    println!("Connected. Run `monzo-bridge sync` to start forwarding transactions.");

    Ok(())
}
