//! HMAC-SHA256 webhook signature verification.
//!
//! Signature header format: `t=<unix timestamp>,v1=<hex hmac>`, where the
//! HMAC is computed over `"{t}.{raw body}"`. The timestamp is checked
//! against a window to prevent replays.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-payflow-signature";

/// Default maximum age for webhook events (5 minutes).
pub const DEFAULT_MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Reasons a signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Malformed signature header: {0}")]
    Malformed(String),

    #[error("Timestamp out of range")]
    Stale,

    #[error("Timestamp is in the future")]
    FromFuture,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Parsed components of the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<hex>`. Unknown keys are ignored.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| SignatureError::Malformed("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        SignatureError::Malformed("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex::decode(value).map_err(|_| {
                        SignatureError::Malformed("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        Ok(SignatureHeader {
            timestamp: timestamp
                .ok_or_else(|| SignatureError::Malformed("missing timestamp".to_string()))?,
            v1_signature: v1_signature
                .ok_or_else(|| SignatureError::Malformed("missing v1 signature".to_string()))?,
        })
    }
}

/// Verifies and produces webhook signatures with a shared secret.
pub struct HmacSignatureVerifier {
    secret: SecretString,
    max_age_secs: i64,
}

impl HmacSignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            max_age_secs: DEFAULT_MAX_EVENT_AGE_SECS,
        }
    }

    /// Overrides the accepted event age.
    pub fn with_max_age_secs(mut self, max_age_secs: i64) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    /// Verifies `header` against `payload` using the current time.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verifies `header` against `payload` as of `now` (Unix seconds).
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let header = SignatureHeader::parse(header)?;

        // Overflow means the timestamp is nowhere near `now`.
        let age = now.checked_sub(header.timestamp).ok_or(SignatureError::Stale)?;
        if age > self.max_age_secs {
            return Err(SignatureError::Stale);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(SignatureError::FromFuture);
        }

        let expected = self.compute_signature(header.timestamp, payload)?;
        if !constant_time_compare(&expected, &header.v1_signature) {
            return Err(SignatureError::Mismatch);
        }
        Ok(())
    }

    /// Produces a header value signing `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let signature = self.compute_signature(timestamp, payload)?;
        Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Constant-time comparison so timing does not leak the expected signature.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
