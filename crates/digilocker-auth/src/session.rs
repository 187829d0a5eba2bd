//! OAuth session store
//!
//! Holds the single access token the relay acts with, plus the PKCE verifiers
//! of authorization attempts that have not yet come back through the
//! callback. Verifiers are keyed by the `state` value sent in the redirect so
//! concurrent or repeated logins each keep their own verifier.
//!
//! The store is an explicit object shared through request state; there is no
//! process-global token.

use std::collections::HashMap;
use std::time::Duration;

use common::Secret;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::constants::{
    DEFAULT_VERIFIER_LENGTH, MAX_PENDING_AUTHORIZATIONS, PENDING_AUTHORIZATION_TTL_SECS,
};
use crate::error::Result;
use crate::pkce::{PkcePair, generate_state};

struct PendingAuthorization {
    verifier: Secret<String>,
    created_at: Instant,
}

/// What the login redirect needs from a freshly started attempt.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub state: String,
    pub challenge: String,
}

pub struct OAuthSession {
    access_token: RwLock<Option<Secret<String>>>,
    pending: Mutex<HashMap<String, PendingAuthorization>>,
    pending_ttl: Duration,
    max_pending: usize,
}

impl Default for OAuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthSession {
    pub fn new() -> Self {
        Self::with_pending_ttl(Duration::from_secs(PENDING_AUTHORIZATION_TTL_SECS))
    }

    pub fn with_pending_ttl(pending_ttl: Duration) -> Self {
        Self::with_pending_limits(pending_ttl, MAX_PENDING_AUTHORIZATIONS)
    }

    /// Session whose pending logins expire after `pending_ttl` and never
    /// number more than `max_pending` (at least one).
    pub fn with_pending_limits(pending_ttl: Duration, max_pending: usize) -> Self {
        Self {
            access_token: RwLock::new(None),
            pending: Mutex::new(HashMap::new()),
            pending_ttl,
            max_pending: max_pending.max(1),
        }
    }

    /// Start an authorization attempt: new verifier, new state.
    ///
    /// Expired attempts are dropped while the lock is held; at capacity the
    /// oldest pending attempt is evicted.
    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let pair = PkcePair::generate(DEFAULT_VERIFIER_LENGTH)?;
        let state = generate_state();

        let mut pending = self.pending.lock().await;
        let ttl = self.pending_ttl;
        pending.retain(|_, p| p.created_at.elapsed() < ttl);
        while pending.len() >= self.max_pending {
            let Some(oldest) = pending
                .iter()
                .min_by_key(|(_, p)| p.created_at)
                .map(|(state, _)| state.clone())
            else {
                break;
            };
            pending.remove(&oldest);
            debug!("oldest pending authorization evicted");
        }
        pending.insert(
            state.clone(),
            PendingAuthorization {
                verifier: Secret::new(pair.verifier),
                created_at: Instant::now(),
            },
        );
        debug!(pending = pending.len(), "authorization attempt registered");

        Ok(AuthorizationRequest {
            state,
            challenge: pair.challenge,
        })
    }

    /// Remove and return the verifier issued for `state`.
    ///
    /// Returns `None` for unknown states and for attempts older than the TTL.
    pub async fn take_verifier(&self, state: &str) -> Option<Secret<String>> {
        let entry = self.pending.lock().await.remove(state)?;
        if entry.created_at.elapsed() >= self.pending_ttl {
            debug!("authorization attempt expired");
            return None;
        }
        Some(entry.verifier)
    }

    /// Overwrite the stored access token.
    pub async fn set_token(&self, token: String) {
        *self.access_token.write().await = Some(Secret::new(token));
    }

    /// Current access token, if one has been obtained. Empty tokens count as absent.
    pub async fn token(&self) -> Option<Secret<String>> {
        self.access_token
            .read()
            .await
            .as_ref()
            .filter(|t| !t.is_blank())
            .cloned()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token().await.is_some()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
