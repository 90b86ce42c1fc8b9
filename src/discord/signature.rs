use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::errors::ServiceError;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Largest accepted distance between the signed timestamp and our clock.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Checks Discord's Ed25519 signature over `timestamp || body`.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn from_hex(public_key: &str) -> Result<Self, ServiceError> {
        let bytes: [u8; 32] = hex::decode(public_key.trim())
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| ServiceError::InvalidInput("Discord public key must be 32 bytes of hex".into()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| ServiceError::InvalidInput(format!("Invalid Discord public key: {e}")))?;
        Ok(Self { key })
    }

    pub fn verify(&self, signature_hex: &str, timestamp: &str, body: &[u8]) -> Result<(), ServiceError> {
        self.verify_at(signature_hex, timestamp, body, Utc::now().timestamp())
    }

    /// Like [`verify`](Self::verify), against an explicit current time in Unix seconds.
    pub fn verify_at(
        &self,
        signature_hex: &str,
        timestamp: &str,
        body: &[u8],
        now: i64,
    ) -> Result<(), ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid request signature".into());

        let raw: [u8; 64] = hex::decode(signature_hex.trim())
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(invalid)?;
        let signature = Signature::from_bytes(&raw);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).map_err(|_| invalid())?;

        let signed_at: i64 = timestamp.trim().parse().map_err(|_| invalid())?;
        if now.abs_diff(signed_at) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
            return Err(ServiceError::Unauthorized(
                "Request timestamp is outside the accepted window".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, SignatureVerifier) {
        let signing = SigningKey::from_bytes(&[42u8; 32]);
        let verifier =
            SignatureVerifier::from_hex(&hex::encode(signing.verifying_key().to_bytes())).unwrap();
        (signing, verifier)
    }

    const SIGNED_AT: i64 = 1_700_000_000;

    fn sign(signing: &SigningKey, timestamp: &str, body: &[u8]) -> String {
        hex::encode(signing.sign(&[timestamp.as_bytes(), body].concat()).to_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let (signing, verifier) = keypair();
        let body = br#"{"type":1}"#;
        let signature = sign(&signing, "1700000000", body);
        assert!(verifier
            .verify_at(&signature, "1700000000", body, SIGNED_AT + 10)
            .is_ok());
    }

    #[test]
    fn accepts_current_timestamp() {
        let (signing, verifier) = keypair();
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&signing, &timestamp, b"{}");
        assert!(verifier.verify(&signature, &timestamp, b"{}").is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let (signing, verifier) = keypair();
        let signature = sign(&signing, "1700000000", b"{\"type\":1}");
        let result = verifier.verify_at(&signature, "1700000000", b"{\"type\":2}", SIGNED_AT);
        assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
    }

    #[test]
    fn rejects_replayed_timestamps() {
        let (signing, verifier) = keypair();
        let body = br#"{"type":1}"#;
        let signature = sign(&signing, "1700000000", body);

        let edge = SIGNED_AT + TIMESTAMP_TOLERANCE_SECS;
        assert!(verifier.verify_at(&signature, "1700000000", body, edge).is_ok());

        for now in [edge + 1, SIGNED_AT - TIMESTAMP_TOLERANCE_SECS - 1, SIGNED_AT + 86_400] {
            let result = verifier.verify_at(&signature, "1700000000", body, now);
            assert!(matches!(result, Err(ServiceError::Unauthorized(_))), "now = {now}");
        }
        // signed, but not a Unix timestamp
        let garbled = sign(&signing, "yesterday", body);
        assert!(verifier.verify_at(&garbled, "yesterday", body, SIGNED_AT).is_err());
    }

    #[test]
    fn rejects_malformed_signature() {
        let (_, verifier) = keypair();
        assert!(verifier.verify("not-hex", "1", b"{}").is_err());
        assert!(verifier.verify("abcd", "1", b"{}").is_err());
    }

    #[test]
    fn rejects_bad_public_key() {
        assert!(SignatureVerifier::from_hex("1234").is_err());
    }
}
