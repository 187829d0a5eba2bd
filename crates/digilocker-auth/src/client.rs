//! Registered client identity and provider endpoint bases

use common::Secret;

use crate::constants::{
    AUTHORIZE_PATH, DEFAULT_ACCOUNT_BASE_URL, DEFAULT_API_BASE_URL, DEFAULT_REDIRECT_URI,
    TOKEN_PATH,
};

/// Everything the relay needs to talk to DigiLocker on behalf of one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    /// Host for authorize/token/document endpoints
    pub api_base_url: String,
    /// Host for the user profile endpoint
    pub account_base_url: String,
}

impl ClientConfig {
    /// Client pointing at the production DigiLocker hosts.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret.into()),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            account_base_url: DEFAULT_ACCOUNT_BASE_URL.to_string(),
        }
    }

    /// Point both hosts at one base URL (mock providers in tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.api_base_url = base.to_string();
        self.account_base_url = base.to_string();
        self
    }

    pub fn authorize_endpoint(&self) -> String {
        join(&self.api_base_url, AUTHORIZE_PATH)
    }

    pub fn token_endpoint(&self) -> String {
        join(&self.api_base_url, TOKEN_PATH)
    }
}

pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
