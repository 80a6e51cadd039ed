use std::sync::Arc;

use axum::{
    async_trait,
    extract::{Extension, FromRequest, RequestParts},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use lazy_static::lazy_static;
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

pub const CALLBACK_PATH: &str = "/callback";

lazy_static! {
    // HACK: Url doesn't provide a good way to initialize a Url from a relative
    // path and axum uri returns only the path partial. __Do not depend on the host,
    // scheme, or any non path part of the Url constructed with this as a base.__
    static ref BASE_URL: Url = {
        Url::parse("http://localhost").unwrap()
    };
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("state parameter does not match the pending authorization")]
    StateMismatch,
    #[error("nobody is waiting for the authorization code")]
    Closed,
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let status = match self {
            CallbackError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        (status, Html(failure_page(&self.to_string()))).into_response()
    }
}

/// Grant is the authorization code handed back by the provider's redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Single use authorization code to exchange at the token endpoint.
    pub code: String,
    /// The opaque state value echoed back by the provider.
    pub state: String,
}

#[async_trait]
impl<B> FromRequest<B> for Grant
where
    B: Send,
{
    type Rejection = CallbackError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let url = Url::options()
            .base_url(Some(&BASE_URL))
            .parse(&req.uri().to_string())
            .map_err(|_| CallbackError::InvalidArgument("invalid uri".into()))?;

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key.as_ref() == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(err) = param("error") {
            return Err(CallbackError::Denied(
                param("error_description").unwrap_or(err),
            ));
        }

        match (param("code"), param("state")) {
            (Some(code), Some(state)) if !code.is_empty() => Ok(Grant { code, state }),
            (Some(_), None) => Err(CallbackError::InvalidArgument(
                "callback must include state".into(),
            )),
            _ => Err(CallbackError::InvalidArgument(
                "callback must include an authorization code".into(),
            )),
        }
    }
}

/// What the redirect ended with: a code to exchange, or the provider's refusal.
pub type Outcome = Result<Grant, CallbackError>;

/// Builds the URL the user visits to start the authorization-code flow.
pub fn authorization_url(base: &Url, client_id: &str, redirect_uri: &str, state: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("state", state);

    url
}

pub struct CallbackServer {
    expected_state: String,
    grant_channel: broadcast::Sender<Outcome>,
}

impl CallbackServer {
    pub fn new(expected_state: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);

        Self {
            expected_state: expected_state.into(),
            grant_channel: tx,
        }
    }

    /// Subscribes to the final outcome of the redirect: a code with matching
    /// state, or a denial. Malformed or forged requests are answered but not
    /// published. Subscribe before serving so an early redirect is not missed.
    pub fn on_grant(&self) -> broadcast::Receiver<Outcome> {
        self.grant_channel.subscribe()
    }

    pub fn start(self) -> Router {
        Router::new()
            .route(CALLBACK_PATH, get(receive_grant))
            .layer(Extension(Arc::new(self.expected_state)))
            .layer(Extension(self.grant_channel))
    }
}

async fn receive_grant(
    grant: Result<Grant, CallbackError>,
    expected_state: Extension<Arc<String>>,
    on_grant: Extension<broadcast::Sender<Outcome>>,
) -> Result<Html<String>, CallbackError> {
    let grant = match grant {
        Ok(grant) => grant,
        Err(denied @ CallbackError::Denied(_)) => {
            on_grant
                .send(Err(denied.clone()))
                .map_err(|_| CallbackError::Closed)?;
            return Err(denied);
        }
        Err(e) => return Err(e),
    };

    if grant.state != expected_state.as_str() {
        return Err(CallbackError::StateMismatch);
    }

    on_grant.send(Ok(grant)).map_err(|_| CallbackError::Closed)?;

    Ok(Html(success_page()))
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; max-width: 600px; margin: 40px auto; text-align: center;">
    <h2>Authorization received</h2>
    <p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

fn failure_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; max-width: 600px; margin: 40px auto; text-align: center;">
    <h2>Authorization failed</h2>
    <p>{}</p>
    <p>Close this window and try again.</p>
</body>
</html>"#,
        escape_html(message)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
