//! Authorization URL construction

use reqwest::Url;

use crate::error::{Error, Result};

/// Build the provider authorization URL for one PKCE attempt.
///
/// Parameters are form-urlencoded, so a redirect URI such as
/// `http://localhost:3000/cb` travels as `http%3A%2F%2Flocalhost%3A3000%2Fcb`.
pub fn build_authorization_url(
    authorize_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        authorize_endpoint,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("state", state),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| Error::InvalidUrl(format!("{authorize_endpoint}: {e}")))?;
    Ok(url.into())
}
