use std::time::Duration;

use axum::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::auth::{Error, Result, TokenGrant, TokenResponse};
use crate::model::BankConfig;

pub const SERVICE: &str = "monzo";

pub struct Grant {
    http: Client,
    auth_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl Grant {
    pub fn new(
        conf: &BankConfig,
        auth_url: Url,
        api_url: &Url,
        redirect_uri: String,
        timeout: Duration,
    ) -> Result<Self> {
        let token_url = api_url
            .join("oauth2/token")
            .map_err(|e| Error::Transport(format!("invalid bank API url: {}", e)))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            auth_url,
            token_url,
            client_id: conf.client_id.clone(),
            client_secret: conf.client_secret.clone(),
            redirect_uri,
        })
    }

    async fn request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let resp = self
            .http
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json()
                .await
                .map_err(|e| Error::Transport(format!("unexpected token response: {}", e)));
        }

        let body = resp.text().await.unwrap_or_default();
        debug!(%status, "token endpoint refused request");
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(Error::Transport(format!("{}: {}", status, body)))
        } else {
            Err(Error::GrantRejected(format!("{}: {}", status, body)))
        }
    }
}

#[async_trait]
impl TokenGrant for Grant {
    fn service(&self) -> &str {
        SERVICE
    }

    fn authorization_url(&self, state: &str) -> Url {
        oauth_callback::authorization_url(&self.auth_url, &self.client_id, &self.redirect_uri, state)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.request(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
