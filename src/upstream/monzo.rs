use std::time::Duration;

use axum::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::core::{BankAccount, BankTransaction, SyncCursor};
use crate::upstream::{AccountSource, Error, Result, TransactionSource};

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<BankAccount>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<BankTransaction>,
}

pub struct Source {
    client: Client,
    api_url: Url,
    page_size: u32,
}

impl Source {
    pub fn new(api_url: Url, page_size: u32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            page_size: page_size.max(1),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| Error::Protocol(format!("invalid bank API url: {}", e)))
    }

    async fn page(
        &self,
        access_token: &str,
        account_id: &str,
        since: &str,
    ) -> Result<Vec<BankTransaction>> {
        let limit = self.page_size.to_string();
        let resp = self
            .client
            .get(self.endpoint("transactions")?)
            .bearer_auth(access_token)
            .query(&[
                ("account_id", account_id),
                ("since", since),
                ("expand[]", "merchant"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let body: TransactionsResponse = check(resp)
            .await?
            .json()
            .await
            .map_err(|e| Error::Protocol(e.to_string()))?;

        Ok(body.transactions)
    }
}

#[async_trait]
impl AccountSource for Source {
    async fn accounts(&self, access_token: &str) -> Result<Vec<BankAccount>> {
        let resp = self
            .client
            .get(self.endpoint("accounts")?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        let body: AccountsResponse = check(resp)
            .await?
            .json()
            .await
            .map_err(|e| Error::Protocol(e.to_string()))?;

        Ok(body.accounts)
    }
}

#[async_trait]
impl TransactionSource for Source {
    #[tracing::instrument(skip(self, access_token, since))]
    async fn transactions(
        &self,
        access_token: &str,
        account_id: &str,
        since: &SyncCursor,
    ) -> Result<Vec<BankTransaction>> {
        let mut txns = vec![];
        let mut since = since.since_param();

        loop {
            let page = self.page(access_token, account_id, &since).await?;
            let full = page.len() as u32 >= self.page_size;
            debug!(count = page.len(), since = %since, "fetched transaction page");

            let next = match page.last() {
                Some(last) if full => Some(last.id.clone()),
                _ => None,
            };
            txns.extend(page);

            match next {
                Some(id) => since = id,
                None => break,
            }
        }

        Ok(txns)
    }
}

fn transport(err: reqwest::Error) -> Error {
    Error::Unavailable(err.to_string())
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::FORBIDDEN => Error::Forbidden(body),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            Error::Unavailable(format!("{}: {}", s, body))
        }
        s => Error::Protocol(format!("{}: {}", s, body)),
    })
}
