//! DigiLocker OAuth client library
//!
//! PKCE generation, the session store, authorization URL construction, code
//! exchange, authenticated resource fetches and local artifact persistence.
//! The crate has no dependency on the HTTP service and is tested on its own.
//!
//! Flow:
//! 1. `OAuthSession::begin_authorization()` creates a verifier keyed by a fresh `state`
//! 2. The user is redirected to `build_authorization_url()`
//! 3. The callback's `state` recovers the verifier via `OAuthSession::take_verifier()`
//! 4. `token::exchange_code()` trades code + verifier for an access token
//! 5. `OAuthSession::set_token()` stores it for the process lifetime
//! 6. `resource::fetch()` calls document endpoints with that bearer token

pub mod artifacts;
pub mod authorize;
pub mod client;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod resource;
pub mod session;
pub mod token;

pub use artifacts::{ArtifactStore, decode_data_uri_image, file_name_component};
pub use authorize::build_authorization_url;
pub use client::ClientConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{PkcePair, derive_challenge, generate_state, generate_verifier};
pub use resource::{Fetched, Host, Payload, Persist, Resource, fetch};
pub use session::{AuthorizationRequest, OAuthSession};
pub use token::{TokenGrant, exchange_code};
