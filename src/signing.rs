//! Deterministic ECDSA-secp256k1 request signing.
//!
//! Mirrors the authentication scheme some inference backends enforce: the
//! signature covers the canonical JSON payload bytes plus (in the non-legacy
//! form) the ASCII nanosecond timestamp and the requester's transfer address.
//! Signatures are always canonicalized to low-s form to prevent malleability.

use base64::Engine;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// Whether the signature covers just the payload (legacy) or the payload
/// plus timestamp and address (current).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    /// Sign `payload || timestamp || address`.
    Current,
    /// Sign `payload` only. Timestamp and address are still transmitted as
    /// headers, but are not mixed into the signed bytes.
    Legacy,
}

/// Holds the secp256k1 key material used to sign outgoing requests.
#[derive(Clone)]
pub struct Signer {
    secret_key: SecretKey,
    mode: SigningMode,
}

impl Signer {
    /// Construct a signer from a hex-encoded 32-byte private key.
    pub fn from_private_key_hex(private_key_hex: &str, mode: SigningMode) -> crate::Result<Self> {
        let bytes = hex::decode(private_key_hex.trim_start_matches("0x"))
            .map_err(|e| crate::Error::Signing(format!("invalid private key hex: {e}")))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| crate::Error::Signing(format!("invalid secp256k1 private key: {e}")))?;
        Ok(Self { secret_key, mode })
    }

    /// Sign `payload`, mixing in `timestamp_ns` and `transfer_address` unless
    /// [`SigningMode::Legacy`] is in effect. Returns the base64-encoded 64
    /// raw bytes `r || s`, with `s` canonicalized to its low form.
    pub fn sign(&self, payload: &[u8], timestamp_ns: i64, transfer_address: &str) -> String {
        let mut signed_bytes = payload.to_vec();
        if self.mode == SigningMode::Current {
            if timestamp_ns > 0 {
                signed_bytes.extend_from_slice(timestamp_ns.to_string().as_bytes());
            }
            signed_bytes.extend_from_slice(transfer_address.as_bytes());
        }

        let digest = Sha256::digest(&signed_bytes);
        let message = Message::from_digest_slice(&digest)
            .expect("SHA-256 digest is always exactly 32 bytes");

        let secp = Secp256k1::signing_only();
        let signature: Signature = secp.sign_ecdsa(&message, &self.secret_key);
        // rust-secp256k1 already normalizes newly-created signatures to
        // low-s form, but we normalize explicitly so the invariant holds
        // regardless of how the `Signature` was constructed.
        let mut low_s = signature;
        low_s.normalize_s();

        base64::engine::general_purpose::STANDARD.encode(low_s.serialize_compact())
    }
}

/// The three headers emitted alongside a signed request, or `None` if
/// signing is disabled entirely.
pub struct SigningHeaders {
    pub authorization: String,
    pub requester_address: String,
    pub timestamp_ns: i64,
}

/// Produce the signing headers for `payload`, or `None` when `signer` is absent.
pub fn headers_for(
    signer: Option<&Signer>,
    account_address: &str,
    payload: &[u8],
    now_ns: i64,
) -> Option<SigningHeaders> {
    let signer = signer?;
    let authorization = signer.sign(payload, now_ns, account_address);
    Some(SigningHeaders {
        authorization,
        requester_address: account_address.to_string(),
        timestamp_ns: now_ns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 32 bytes of 0x11, a valid non-zero scalar below the curve order.
    const TEST_KEY_HEX: &str = "1111111111111111111111111111111111111111111111111111111111111111";

    fn test_signer(mode: SigningMode) -> Signer {
        Signer::from_private_key_hex(TEST_KEY_HEX, mode).unwrap()
    }

    #[test]
    fn sign_is_deterministic_across_calls() {
        let signer = test_signer(SigningMode::Current);
        let a = signer.sign(b"payload-bytes", 1_700_000_000_000_000_000, "0xabc");
        let b = signer.sign(b"payload-bytes", 1_700_000_000_000_000_000, "0xabc");
        assert_eq!(a, b);
    }

    #[test]
    fn sign_changes_with_timestamp_in_current_mode() {
        let signer = test_signer(SigningMode::Current);
        let a = signer.sign(b"payload", 1, "0xabc");
        let b = signer.sign(b"payload", 2, "0xabc");
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_mode_ignores_timestamp_and_address() {
        let signer = test_signer(SigningMode::Legacy);
        let a = signer.sign(b"payload", 1, "0xabc");
        let b = signer.sign(b"payload", 999, "0xdef");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_decodes_to_64_raw_bytes() {
        let signer = test_signer(SigningMode::Current);
        let sig_b64 = signer.sign(b"payload", 0, "");
        let raw = base64::engine::general_purpose::STANDARD
            .decode(sig_b64)
            .unwrap();
        assert_eq!(raw.len(), 64);
    }

    #[test]
    fn signature_s_is_low() {
        let signer = test_signer(SigningMode::Current);
        let sig_b64 = signer.sign(b"payload", 0, "");
        let raw = base64::engine::general_purpose::STANDARD
            .decode(sig_b64)
            .unwrap();
        let s_bytes = &raw[32..64];
        // secp256k1 curve order n; low-s means s <= n/2.
        const HALF_N: [u8; 32] = [
            0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46,
            0x68, 0x1b, 0x20, 0xa0,
        ];
        assert!(s_bytes <= &HALF_N[..]);
    }

    #[test]
    fn headers_for_disabled_signer_is_none() {
        assert!(headers_for(None, "0xabc", b"payload", 1).is_none());
    }

    #[test]
    fn headers_for_enabled_signer_carries_address_and_timestamp() {
        let signer = test_signer(SigningMode::Current);
        let headers = headers_for(Some(&signer), "0xabc", b"payload", 1234).unwrap();
        assert_eq!(headers.requester_address, "0xabc");
        assert_eq!(headers.timestamp_ns, 1234);
        assert!(!headers.authorization.is_empty());
    }

    #[test]
    fn invalid_hex_key_is_rejected() {
        assert!(Signer::from_private_key_hex("not-hex", SigningMode::Current).is_err());
    }
}
