pub mod monzo;

use axum::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::secrets::{self, SecretStore};

#[derive(Debug, Error)]
pub enum Error {
    #[error("bank authorization required, run `monzo-bridge connect`")]
    ReauthorizationRequired,
    #[error("returned state does not match the pending authorization")]
    StateMismatch,
    #[error("token endpoint rejected the grant: {0}")]
    GrantRejected(String),
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    #[error(transparent)]
    Store(#[from] secrets::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AuthorizationPending,
    Authenticated,
    Refreshing,
}

/// Tokens issued by the bank. Persisted after every change.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub service: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("service", &self.service)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CredentialRecord {
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at > now + margin
    }
}

/// Token endpoint response.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    /// Some providers omit a new refresh token, the previous one stays valid.
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// The provider side of the authorization-code grant.
#[async_trait]
pub trait TokenGrant {
    fn service(&self) -> &str;

    fn authorization_url(&self, state: &str) -> Url;

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// An authorization started by `begin_authorization` and waiting for the
/// provider's redirect.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    pub url: Url,
}

/// Keeps a valid bank access token available, refreshing it through `grant`
/// and persisting every change to `store`.
pub struct OAuthClient<G, S> {
    grant: G,
    store: S,
    margin: Duration,
    state: AuthState,
}

impl<G, S> OAuthClient<G, S>
where
    G: TokenGrant + Send + Sync,
    S: SecretStore + Send + Sync,
{
    pub fn new(grant: G, store: S, margin: Duration) -> Self {
        Self {
            grant,
            store,
            margin,
            state: AuthState::Unauthenticated,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn credentials(&self) -> Result<Option<CredentialRecord>> {
        Ok(self.store.load(secrets::BANK_CREDENTIALS)?)
    }

    pub fn begin_authorization(&mut self) -> PendingAuthorization {
        let state = ulid::Ulid::new().to_string();
        let url = self.grant.authorization_url(&state);
        self.state = AuthState::AuthorizationPending;

        PendingAuthorization { state, url }
    }

    /// Exchanges the code delivered by the redirect and stores the resulting
    /// credentials.
    pub async fn complete_authorization(
        &mut self,
        pending: PendingAuthorization,
        code: &str,
        returned_state: &str,
    ) -> Result<()> {
        if self.state != AuthState::AuthorizationPending || pending.state != returned_state {
            self.state = AuthState::Unauthenticated;
            return Err(Error::StateMismatch);
        }

        match self.grant.exchange_code(code).await {
            Ok(resp) => {
                self.persist(resp, None)?;
                self.state = AuthState::Authenticated;
                info!(service = self.grant.service(), "bank authorization complete");
                Ok(())
            }
            Err(e) => {
                self.state = AuthState::Unauthenticated;
                Err(e)
            }
        }
    }

    /// Returns a token valid for at least the safety margin, refreshing it
    /// first when needed.
    pub async fn get_valid_token(&mut self) -> Result<String> {
        let record = match self.credentials()? {
            Some(record) => record,
            None => {
                self.state = AuthState::Unauthenticated;
                return Err(Error::ReauthorizationRequired);
            }
        };

        if record.is_fresh(Utc::now(), self.margin) {
            self.state = AuthState::Authenticated;
            return Ok(record.access_token);
        }

        info!("bank access token expires at {}, refreshing", record.expires_at);
        self.refresh(record).await
    }

    /// Refreshes regardless of expiry, used after the bank rejects a token.
    pub async fn refresh_now(&mut self) -> Result<String> {
        match self.credentials()? {
            Some(record) => self.refresh(record).await,
            None => {
                self.state = AuthState::Unauthenticated;
                Err(Error::ReauthorizationRequired)
            }
        }
    }

    pub fn logout(&mut self) -> Result<()> {
        self.store.delete(secrets::BANK_CREDENTIALS)?;
        self.state = AuthState::Unauthenticated;
        Ok(())
    }

    async fn refresh(&mut self, record: CredentialRecord) -> Result<String> {
        self.state = AuthState::Refreshing;

        match self.grant.refresh(&record.refresh_token).await {
            Ok(resp) => {
                let persisted = self.persist(resp, Some(record.refresh_token));
                self.state = AuthState::Authenticated;
                persisted
            }
            Err(Error::GrantRejected(reason)) => {
                warn!(%reason, "refresh token rejected, authorization must be repeated");
                self.store.delete(secrets::BANK_CREDENTIALS)?;
                self.state = AuthState::Unauthenticated;
                Err(Error::ReauthorizationRequired)
            }
            Err(e) => {
                self.state = AuthState::Authenticated;
                Err(e)
            }
        }
    }

    fn persist(&self, resp: TokenResponse, previous_refresh: Option<String>) -> Result<String> {
        let refresh_token = resp
            .refresh_token
            .or(previous_refresh)
            .ok_or_else(|| Error::GrantRejected("no refresh token issued".into()))?;

        let expires_at = Some(resp.expires_in)
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                Error::Transport(format!(
                    "token endpoint returned an invalid expires_in of {}",
                    resp.expires_in
                ))
            })?;

        let record = CredentialRecord {
            service: self.grant.service().to_string(),
            access_token: resp.access_token,
            refresh_token,
            expires_at,
        };
        self.store.save(secrets::BANK_CREDENTIALS, &record)?;

        Ok(record.access_token)
    }
}
