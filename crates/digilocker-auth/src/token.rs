//! Authorization code exchange
//!
//! The callback hands us a one-time code; we POST it to the token endpoint
//! together with the PKCE verifier and the client credentials. The provider
//! body is kept intact because the relay returns it verbatim to the caller.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::ClientConfig;
use crate::error::{Error, Result};

/// Fields of the token response the relay reads itself. Everything else is
/// only passed back to the caller through [`TokenGrant::body`].
#[derive(Debug, Deserialize)]
struct TokenFields {
    access_token: String,
}

/// Outcome of a successful exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Full token endpoint response
    pub body: Value,
}

/// Exchange an authorization code for an access token.
///
/// Non-2xx answers become `Error::Upstream` with the provider's status and
/// body. A 2xx answer without a string `access_token` is a `TokenExchange`
/// error. No retries.
pub async fn exchange_code(
    http: &reqwest::Client,
    client: &ClientConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenGrant> {
    let endpoint = client.token_endpoint();
    let response = http
        .post(&endpoint)
        .form(&[
            ("code", code),
            ("grant_type", "authorization_code"),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose().as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        warn!(status = status.as_u16(), "token endpoint rejected exchange");
        return Err(Error::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    let fields = TokenFields::deserialize(&body)
        .map_err(|e| Error::TokenExchange(format!("token response has no access_token: {e}")))?;

    debug!("authorization code exchanged");
    Ok(TokenGrant {
        access_token: fields.access_token,
        body,
    })
}
