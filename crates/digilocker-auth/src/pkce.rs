//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The verifier is kept server-side and disclosed only in the token exchange;
//! the S256 challenge travels in the authorization redirect so the provider
//! can bind the two requests together.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// RFC 7636 unreserved characters: `[A-Za-z0-9-._~]`
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

pub const MIN_VERIFIER_LENGTH: usize = 43;
pub const MAX_VERIFIER_LENGTH: usize = 128;

const STATE_LENGTH: usize = 32;

/// A verifier together with its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair with a verifier of `length` characters.
    pub fn generate(length: usize) -> Result<Self> {
        let verifier = generate_verifier(length)?;
        let challenge = derive_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

/// Generate a random code verifier of `length` unreserved characters.
///
/// Characters are drawn uniformly from the 66-character unreserved set using
/// the thread-local CSPRNG. `length` must be within 43..=128.
pub fn generate_verifier(length: usize) -> Result<String> {
    if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
        return Err(Error::InvalidVerifierLength(length));
    }
    Ok(random_unreserved(length))
}

/// Generate an opaque `state` value for one authorization attempt.
pub fn generate_state() -> String {
    random_unreserved(STATE_LENGTH)
}

fn random_unreserved(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| UNRESERVED[rng.random_range(0..UNRESERVED.len())] as char)
        .collect()
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL-NOPAD(SHA256(verifier))`
pub fn derive_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unreserved(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
    }

    #[test]
    fn unreserved_set_has_66_characters() {
        assert_eq!(UNRESERVED.len(), 66);
    }

    #[test]
    fn verifier_has_requested_length_and_charset() {
        for length in [43, 64, 128] {
            let verifier = generate_verifier(length).unwrap();
            assert_eq!(verifier.len(), length);
            assert!(
                verifier.chars().all(is_unreserved),
                "verifier must only use unreserved characters: {verifier}"
            );
        }
    }

    #[test]
    fn verifier_length_bounds_enforced() {
        assert!(matches!(
            generate_verifier(42),
            Err(Error::InvalidVerifierLength(42))
        ));
        assert!(matches!(
            generate_verifier(129),
            Err(Error::InvalidVerifierLength(129))
        ));
    }

    #[test]
    fn verifiers_are_unique() {
        let a = generate_verifier(43).unwrap();
        let b = generate_verifier(43).unwrap();
        assert_ne!(a, b, "two verifiers must not collide");
    }

    #[test]
    fn challenge_is_deterministic_across_lengths() {
        for length in MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH {
            let verifier = generate_verifier(length).unwrap();
            assert_eq!(derive_challenge(&verifier), derive_challenge(&verifier));
        }
    }

    #[test]
    fn distinct_verifiers_give_distinct_challenges() {
        let a = generate_verifier(43).unwrap();
        let b = generate_verifier(43).unwrap();
        assert_ne!(derive_challenge(&a), derive_challenge(&b));
    }

    #[test]
    fn challenge_is_unpadded_base64url() {
        for _ in 0..64 {
            let challenge = derive_challenge(&generate_verifier(96).unwrap());
            assert_eq!(challenge.len(), 43);
            assert!(
                !challenge.contains(['=', '+', '/']),
                "challenge must be base64url without padding: {challenge}"
            );
        }
    }

    #[test]
    fn challenge_matches_reference_sha256() {
        // SHA256("A" x 43), base64url without padding
        let verifier = "A".repeat(43);
        assert_eq!(
            derive_challenge(&verifier),
            "DwBzhbb51LfusnSGBa_hqYSgo7-j8BTQnip4TOnlzRo"
        );
        // SHA256("hello") = 2cf24dba...
        assert_eq!(
            derive_challenge("hello"),
            "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ"
        );
    }

    #[test]
    fn pair_challenge_belongs_to_verifier() {
        let pair = PkcePair::generate(43).unwrap();
        assert_eq!(pair.challenge, derive_challenge(&pair.verifier));
        let decoded = URL_SAFE_NO_PAD.decode(&pair.challenge).unwrap();
        assert_eq!(decoded.len(), 32, "SHA-256 digest must be 32 bytes");
    }

    #[test]
    fn state_is_random_and_url_safe() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), STATE_LENGTH);
        assert!(a.chars().all(is_unreserved));
        assert_ne!(a, b);
    }
}
