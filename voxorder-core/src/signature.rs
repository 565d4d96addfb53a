//! Callback signature verification.
//!
//! The provider signs the exact request body with HMAC-SHA256 and sends the
//! lowercase hex digest in a header. Verification must run over the raw
//! bytes; a re-serialized body will not hash the same.

use std::fmt;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a callback failed verification. Only ever logged; clients see a
/// single authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureRejection {
    SecretNotConfigured,
    MissingSignature,
    MalformedSignature,
    Mismatch,
}

impl fmt::Display for SignatureRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SignatureRejection::SecretNotConfigured => "webhook secret is not configured",
            SignatureRejection::MissingSignature => "signature header is missing",
            SignatureRejection::MalformedSignature => "signature is not valid hex",
            SignatureRejection::Mismatch => "signature does not match body",
        };
        f.write_str(reason)
    }
}

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid(SignatureRejection),
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Valid)
    }
}

/// Verifies callback signatures against the pre-shared secret.
///
/// Fails closed: with no secret configured every callback is rejected.
#[derive(Debug)]
pub struct WebhookVerifier {
    secret: Option<SecretString>,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret: Some(secret),
        }
    }

    /// A verifier that rejects everything.
    pub fn unconfigured() -> Self {
        Self { secret: None }
    }

    /// Empty secrets are treated as unset.
    pub fn from_optional(secret: Option<SecretString>) -> Self {
        let secret = secret.filter(|s| !s.expose_secret().is_empty());
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Lowercase hex HMAC-SHA256 of `body`, or `None` without a secret.
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let mut mac = self.mac()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check `signature` against the raw `body`.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> SignatureCheck {
        let Some(mut mac) = self.mac() else {
            return SignatureCheck::Invalid(SignatureRejection::SecretNotConfigured);
        };

        let signature = match signature.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return SignatureCheck::Invalid(SignatureRejection::MissingSignature),
        };

        let Ok(expected) = hex::decode(signature) else {
            return SignatureCheck::Invalid(SignatureRejection::MalformedSignature);
        };

        mac.update(body);
        // verify_slice compares in constant time
        match mac.verify_slice(&expected) {
            Ok(()) => SignatureCheck::Valid,
            Err(_) => SignatureCheck::Invalid(SignatureRejection::Mismatch),
        }
    }

    fn mac(&self) -> Option<HmacSha256> {
        let secret = self.secret.as_ref()?;
        HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()
    }
}
