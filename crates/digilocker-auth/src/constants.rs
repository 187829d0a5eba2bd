//! DigiLocker endpoint constants
//!
//! The provider serves OAuth and most document APIs from the public API host,
//! while the user profile lives on the MeriPehchaan account host. Both bases
//! are overridable through configuration; these are the production values.

/// Base URL for authorization, token and document endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://api.digitallocker.gov.in";

/// Base URL for the account (profile) endpoint
pub const DEFAULT_ACCOUNT_BASE_URL: &str = "https://digilocker.meripehchaan.gov.in";

/// Redirect URI registered with the provider for the local relay
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/v1/digilocker/auth/callback";

pub const AUTHORIZE_PATH: &str = "/public/oauth2/1/authorize";
pub const TOKEN_PATH: &str = "/public/oauth2/1/token";

/// Verifier length used by the login flow (RFC 7636 minimum)
pub const DEFAULT_VERIFIER_LENGTH: usize = 43;

/// Pending authorizations older than this are discarded.
pub const PENDING_AUTHORIZATION_TTL_SECS: u64 = 600;

/// Upper bound on logins awaiting their callback; the oldest is evicted first.
pub const MAX_PENDING_AUTHORIZATIONS: usize = 1024;
