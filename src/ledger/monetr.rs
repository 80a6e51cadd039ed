use std::time::Duration;

use axum::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::core::{LedgerAccount, LedgerTransaction};
use crate::ledger::{Error, Ledger, Result};
use crate::model::LedgerConfig;

#[derive(Serialize)]
struct Login<'a> {
    email: &'a str,
    password: &'a str,
}

/// Monetr API client. The session lives in a cookie kept by the HTTP client.
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    email: String,
    password: String,
    logged_in: bool,
}

impl Client {
    pub fn new(conf: &LedgerConfig, timeout: Duration) -> Result<Self> {
        let base_url = conf
            .base_url()
            .map_err(|e| Error::Unreachable(e.to_string()))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unreachable(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            email: conf.email.clone(),
            password: conf.password.clone(),
            logged_in: false,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Unreachable(format!("invalid ledger url: {}", e)))
    }

    pub async fn login(&mut self) -> Result<()> {
        let resp = self
            .http
            .post(self.endpoint("api/authentication/login")?)
            .json(&Login {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status.is_success() {
            self.logged_in = true;
            info!(url = %self.base_url, "logged in to ledger");
            return Ok(());
        }

        self.logged_in = false;
        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() && !is_transient(status) {
            return Err(Error::AuthFailed(format!("{}: {}", status, body)));
        }

        Err(Error::Unreachable(format!("{}: {}", status, body)))
    }

    /// Sends the request built by `build`, logging in first when there is no
    /// session and once more if the ledger reports the session expired.
    async fn send<F>(&mut self, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> Result<RequestBuilder> + Send,
    {
        if !self.logged_in {
            self.login().await?;
        }

        let resp = build(&self.http)?.send().await.map_err(transport)?;
        if !is_auth_failure(resp.status()) {
            return Ok(resp);
        }

        debug!(status = %resp.status(), "ledger session rejected, logging in again");
        self.login().await?;

        let resp = build(&self.http)?.send().await.map_err(transport)?;
        if is_auth_failure(resp.status()) {
            self.logged_in = false;
            return Err(Error::AuthFailed(resp.status().to_string()));
        }

        Ok(resp)
    }
}

#[async_trait]
impl Ledger for Client {
    async fn list_accounts(&mut self) -> Result<Vec<LedgerAccount>> {
        let url = self.endpoint("api/bank_accounts")?;
        let resp = self.send(|http| Ok(http.get(url.clone()))).await?;

        check(resp)
            .await?
            .json()
            .await
            .map_err(|e| Error::Unreachable(format!("unexpected accounts response: {}", e)))
    }

    async fn create_transaction(
        &mut self,
        bank_account_id: &str,
        txn: &LedgerTransaction,
    ) -> Result<()> {
        let url = self.endpoint(&format!("api/bank_accounts/{}/transactions", bank_account_id))?;
        let resp = self.send(|http| Ok(http.post(url.clone()).json(txn))).await?;

        check(resp).await?;
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> Error {
    Error::Unreachable(err.to_string())
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let msg = format!("{}: {}", status, body);
    if status.is_client_error() && !is_transient(status) {
        Err(Error::Rejected(msg))
    } else {
        Err(Error::Unreachable(msg))
    }
}
