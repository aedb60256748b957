//! Access tokens and request signing.
//!
//! Every Daraja call needs a bearer token obtained from `/oauth/v1/generate` with the app's consumer key and secret.
//! Tokens live for about an hour; [`AccessToken`] remembers when it expires so that [`crate::MpesaApi`] only asks
//! for a new one once the old one is no longer valid.
//!
//! Two further secrets are derived per request:
//!
//! * the STK push **password**, `base64(shortcode || passkey || timestamp)`, where the timestamp is the same value
//!   sent in the request's `Timestamp` field;
//! * the **security credential** for B2C-class operations: the initiator password, encrypted with the RSA public
//!   key from the environment's certificate using PKCS#1 v1.5 padding, then base64 encoded.

use chrono::{DateTime, Duration, Utc};
use mpg_common::Secret;
use rsa::{pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, Pkcs1v15Encrypt, RsaPublicKey};
use serde::Deserialize;
use x509_parser::pem::parse_x509_pem;

use crate::{helpers::de_u64_lenient, MpesaApiError};

/// Upper bound on a provider-declared token lifetime, so that a nonsensical `expires_in` cannot overflow the expiry.
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds. Daraja sends this as a string.
    #[serde(deserialize_with = "de_u64_lenient")]
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    token: Secret<String>,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: String, expires_at: DateTime<Utc>) -> Self {
        Self { token: Secret::new(token), expires_at }
    }

    /// Builds a token from a token-endpoint response that was fetched at `fetched_at`.
    pub fn from_response(response: TokenResponse, fetched_at: DateTime<Utc>) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let ttl = Duration::seconds(response.expires_in.min(MAX_TOKEN_TTL_SECS) as i64);
        Self::new(response.access_token, fetched_at + ttl)
    }

    /// A token is valid strictly before its expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn token(&self) -> &str {
        self.token.reveal()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.reveal())
    }
}

pub fn derive_password(shortcode: u64, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{passkey}{timestamp}"))
}

pub fn derive_security_credential(password: &str, certificate_pem: &str) -> Result<String, MpesaApiError> {
    let key = load_public_key(certificate_pem)?;
    let mut rng = rand::thread_rng();
    let encrypted = key
        .encrypt(&mut rng, Pkcs1v15Encrypt, password.as_bytes())
        .map_err(|e| MpesaApiError::CryptoError(format!("Could not encrypt the initiator password. {e}")))?;
    Ok(base64::encode(encrypted))
}

/// Reads an RSA public key from an X.509 certificate, or from a bare `PUBLIC KEY` / `RSA PUBLIC KEY` PEM block.
fn load_public_key(pem: &str) -> Result<RsaPublicKey, MpesaApiError> {
    let pem = pem.trim();
    if pem.starts_with("-----BEGIN PUBLIC KEY-----") {
        return RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| MpesaApiError::CryptoError(format!("Invalid public key. {e}")));
    }
    if pem.starts_with("-----BEGIN RSA PUBLIC KEY-----") {
        return RsaPublicKey::from_pkcs1_pem(pem)
            .map_err(|e| MpesaApiError::CryptoError(format!("Invalid RSA public key. {e}")));
    }
    let (_, pem) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| MpesaApiError::CryptoError(format!("Could not read the certificate PEM. {e}")))?;
    let cert = pem.parse_x509().map_err(|e| MpesaApiError::CryptoError(format!("Invalid certificate. {e}")))?;
    RsaPublicKey::from_public_key_der(cert.public_key().raw)
        .map_err(|e| MpesaApiError::CryptoError(format!("The certificate does not hold an RSA public key. {e}")))
}
