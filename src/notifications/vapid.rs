//! VAPID sender identification for Web Push (RFC 8292).
//!
//! Holds the process-wide P-256 keypair and issues the short-lived ES256
//! JWT that push services check on every request. Keys are kept as the
//! raw 32-byte scalar and the 65-byte uncompressed point, which is the
//! format browsers expect for `applicationServerKey`.

// Rust guideline compliant 2026-02

use chrono::Utc;
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;
use p256::{EncodedPoint, FieldBytes};
use serde::Serialize;
use zeroize::Zeroizing;

use super::codec;
use crate::constants::{PRIVATE_SCALAR_LEN, UNCOMPRESSED_POINT_LEN, VAPID_TOKEN_LIFETIME_SECS};
use crate::error::{PushError, Result};

/// VAPID keypair and contact subject.
///
/// Immutable for the lifetime of the process and safe to share across
/// concurrent deliveries behind an `Arc`.
#[derive(Clone)]
pub struct VapidKeyPair {
    /// Uncompressed public point (0x04 || X || Y).
    public_key: [u8; UNCOMPRESSED_POINT_LEN],
    /// Raw private scalar `d`.
    private_key: Zeroizing<[u8; PRIVATE_SCALAR_LEN]>,
    /// Contact URI asserted as `sub` (`mailto:` or `https:`).
    subject: String,
}

impl std::fmt::Debug for VapidKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeyPair")
            .field("public_key", &self.public_key_base64url())
            .field("private_key", &"<redacted>")
            .field("subject", &self.subject)
            .finish()
    }
}

impl VapidKeyPair {
    /// Generate a fresh VAPID keypair.
    pub fn generate(subject: impl Into<String>) -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let point = signing_key.verifying_key().to_encoded_point(false);

        let mut public_key = [0u8; UNCOMPRESSED_POINT_LEN];
        public_key.copy_from_slice(point.as_bytes());
        let mut private_key = Zeroizing::new([0u8; PRIVATE_SCALAR_LEN]);
        private_key.copy_from_slice(signing_key.to_bytes().as_slice());

        Self {
            public_key,
            private_key,
            subject: subject.into(),
        }
    }

    /// Build from raw bytes, checking lengths and the point marker.
    ///
    /// Does not check that the scalar matches the point; a mismatch
    /// surfaces when a token is signed.
    pub fn from_raw(public_key: &[u8], private_key: &[u8], subject: impl Into<String>) -> Result<Self> {
        if public_key.len() != UNCOMPRESSED_POINT_LEN || public_key[0] != 0x04 {
            return Err(PushError::Configuration(
                "VAPID public key must be 65-byte uncompressed P-256 point".to_string(),
            ));
        }
        if private_key.len() != PRIVATE_SCALAR_LEN {
            return Err(PushError::Configuration(format!(
                "VAPID private key must be 32-byte P-256 scalar, got {} bytes",
                private_key.len()
            )));
        }
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(PushError::Configuration("VAPID subject must not be empty".to_string()));
        }

        let mut public = [0u8; UNCOMPRESSED_POINT_LEN];
        public.copy_from_slice(public_key);
        let mut private = Zeroizing::new([0u8; PRIVATE_SCALAR_LEN]);
        private.copy_from_slice(private_key);

        Ok(Self {
            public_key: public,
            private_key: private,
            subject,
        })
    }

    /// Reconstruct from base64url-encoded strings (configuration flow).
    ///
    /// The private key may be the raw scalar or a legacy SEC1/PKCS8 DER
    /// container; DER input is normalized to the raw scalar.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str, subject: &str) -> Result<Self> {
        let public = codec::decode(public_key_b64)
            .map_err(|e| PushError::Configuration(format!("VAPID public key: {e}")))?;
        let private = Zeroizing::new(
            codec::decode(private_key_b64)
                .map_err(|e| PushError::Configuration(format!("VAPID private key: {e}")))?,
        );
        let scalar = normalize_private_key(&private)?;
        Self::from_raw(&public, scalar.as_slice(), subject)
    }

    /// Uncompressed public key bytes (65 bytes).
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    /// Base64url-encoded public key, the `k=` value of the Authorization header.
    pub fn public_key_base64url(&self) -> String {
        codec::encode(&self.public_key)
    }

    /// Base64url-encoded raw private scalar.
    pub fn private_key_base64url(&self) -> String {
        codec::encode(self.private_key.as_slice())
    }

    /// Contact subject asserted in every token.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Rebuild the signing key from the stored raw components.
    pub fn signer(&self) -> Result<VapidSigner> {
        let (x, y) = split_public_key(&self.public_key)?;
        VapidSigner::from_raw_components(&x, &y, self.private_key.as_slice())
    }
}

/// Convert a legacy SEC1 or PKCS8 DER private key to the raw scalar.
///
/// A 32-byte input is already raw and is returned as-is.
fn normalize_private_key(bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if bytes.len() == PRIVATE_SCALAR_LEN {
        return Ok(Zeroizing::new(bytes.to_vec()));
    }

    let secret = if let Ok(sk) = p256::SecretKey::from_sec1_der(bytes) {
        sk
    } else {
        use p256::pkcs8::DecodePrivateKey;
        p256::SecretKey::from_pkcs8_der(bytes).map_err(|e| {
            PushError::Configuration(format!(
                "VAPID private key is not a 32-byte scalar, SEC1 DER, or PKCS8 DER: {e}"
            ))
        })?
    };

    log::info!("[WebPush] Normalized VAPID private key from DER ({} bytes) to raw scalar", bytes.len());
    Ok(Zeroizing::new(secret.to_bytes().to_vec()))
}

/// Split an uncompressed P-256 point into its X and Y coordinates.
///
/// Byte 0 must be the 0x04 marker and is discarded; bytes 1..33 are X and
/// bytes 33..65 are Y.
pub fn split_public_key(point: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    if point.len() != UNCOMPRESSED_POINT_LEN {
        return Err(PushError::Key(format!(
            "public key must be {UNCOMPRESSED_POINT_LEN} bytes, got {}",
            point.len()
        )));
    }
    if point[0] != 0x04 {
        return Err(PushError::Key(format!(
            "public key must start with 0x04, got {:#04x}",
            point[0]
        )));
    }

    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&point[1..33]);
    y.copy_from_slice(&point[33..65]);
    Ok((x, y))
}

/// ES256 signer reconstructed from raw key components.
#[derive(Debug)]
pub struct VapidSigner {
    signing_key: SigningKey,
}

impl VapidSigner {
    /// Build a signing key from the X/Y coordinates and private scalar `d`.
    ///
    /// Fails if `d` is not a valid scalar or does not derive `(x, y)`.
    pub fn from_raw_components(x: &[u8; 32], y: &[u8; 32], d: &[u8]) -> Result<Self> {
        if d.len() != PRIVATE_SCALAR_LEN {
            return Err(PushError::Key(format!(
                "private scalar must be {PRIVATE_SCALAR_LEN} bytes, got {}",
                d.len()
            )));
        }

        let signing_key = SigningKey::from_bytes(FieldBytes::from_slice(d))
            .map_err(|e| PushError::Key(format!("invalid P-256 private scalar: {e}")))?;

        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(x),
            FieldBytes::from_slice(y),
            false,
        );
        let expected = VerifyingKey::from_encoded_point(&point)
            .map_err(|e| PushError::Key(format!("public key is not on P-256: {e}")))?;

        if signing_key.verifying_key().to_encoded_point(false) != expected.to_encoded_point(false) {
            return Err(PushError::Key(
                "VAPID private key does not match public key".to_string(),
            ));
        }

        Ok(Self { signing_key })
    }

    /// Sign `message` with ECDSA P-256/SHA-256, returning raw `r || s` (64 bytes).
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64]> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| PushError::Key(format!("ECDSA signing failed: {e}")))?;

        let mut raw = [0u8; 64];
        raw.copy_from_slice(signature.to_bytes().as_slice());
        Ok(raw)
    }

    /// Verifying half of the key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    typ: &'a str,
    alg: &'a str,
}

#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

/// A signed VAPID assertion for one push service origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidToken {
    /// Compact JWT (`header.payload.signature`).
    pub token: String,
    /// Base64url VAPID public key.
    pub public_key: String,
}

impl VapidToken {
    /// `Authorization` header value: `vapid t=<token>, k=<public_key>`.
    pub fn authorization_header(&self) -> String {
        format!("vapid t={}, k={}", self.token, self.public_key)
    }
}

/// Issue a token for `audience` that expires 12 hours from now.
///
/// Tokens are never cached; every call signs a fresh one.
pub fn issue_token(audience: &str, keys: &VapidKeyPair) -> Result<VapidToken> {
    issue_token_at(audience, keys, Utc::now().timestamp())
}

/// Issue a token as if the current time were `now` (unix seconds).
pub fn issue_token_at(audience: &str, keys: &VapidKeyPair, now: i64) -> Result<VapidToken> {
    let header = JwtHeader { typ: "JWT", alg: "ES256" };
    let claims = VapidClaims {
        aud: audience,
        exp: now + VAPID_TOKEN_LIFETIME_SECS,
        sub: keys.subject(),
    };

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| PushError::Key(format!("JWT header serialization failed: {e}")))?;
    let claims_json = serde_json::to_vec(&claims)
        .map_err(|e| PushError::Key(format!("JWT claims serialization failed: {e}")))?;

    let signing_input = format!("{}.{}", codec::encode(&header_json), codec::encode(&claims_json));
    let signature = keys.signer()?.sign(signing_input.as_bytes())?;

    Ok(VapidToken {
        token: format!("{signing_input}.{}", codec::encode(&signature)),
        public_key: keys.public_key_base64url(),
    })
}

/// Audience for an endpoint: its origin (`scheme://host`, plus the port
/// when it is not the scheme default).
pub fn audience_for(endpoint: &str) -> Result<String> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| PushError::Validation(format!("invalid endpoint URL: {e}")))?;
    if url.host_str().is_none() {
        return Err(PushError::Validation(format!("endpoint has no host: {endpoint}")));
    }
    Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;

    fn segment_json(segment: &str) -> serde_json::Value {
        let bytes = codec::decode(segment).expect("base64url segment");
        serde_json::from_slice(&bytes).expect("json segment")
    }

    #[test]
    fn test_generate_vapid_keys() {
        let keys = VapidKeyPair::generate("mailto:ops@example.com");

        let pub_bytes = keys.public_key_bytes();
        assert_eq!(pub_bytes.len(), 65, "uncompressed P-256 public key is 65 bytes");
        assert_eq!(pub_bytes[0], 0x04, "uncompressed point starts with 0x04");

        let priv_bytes = codec::decode(&keys.private_key_base64url()).expect("decode private key");
        assert_eq!(priv_bytes.len(), 32, "raw P-256 scalar is 32 bytes");
    }

    #[test]
    fn test_from_base64url_roundtrip() {
        let keys = VapidKeyPair::generate("mailto:ops@example.com");
        let reconstructed = VapidKeyPair::from_base64url(
            &keys.public_key_base64url(),
            &keys.private_key_base64url(),
            keys.subject(),
        )
        .expect("should reconstruct from base64url");

        assert_eq!(keys.public_key_base64url(), reconstructed.public_key_base64url());
        assert_eq!(keys.private_key_base64url(), reconstructed.private_key_base64url());
    }

    #[test]
    fn test_from_base64url_rejects_invalid() {
        assert!(VapidKeyPair::from_base64url("not-valid-key", "also-bad", "mailto:a@b").is_err());

        let keys = VapidKeyPair::generate("mailto:ops@example.com");
        let err = VapidKeyPair::from_base64url(&keys.public_key_base64url(), &keys.private_key_base64url(), " ")
            .expect_err("empty subject");
        assert!(matches!(err, PushError::Configuration(_)));
    }

    #[test]
    fn test_legacy_der_key_normalizes_to_raw_scalar() {
        let signing_key = SigningKey::random(&mut OsRng);
        let public = signing_key.verifying_key().to_encoded_point(false);
        let secret: p256::SecretKey = signing_key.clone().into();
        let der = secret.to_sec1_der().expect("SEC1 DER");

        let keys = VapidKeyPair::from_base64url(
            &codec::encode(public.as_bytes()),
            &codec::encode(&der),
            "mailto:ops@example.com",
        )
        .expect("SEC1 DER accepted");

        assert_eq!(
            codec::decode(&keys.private_key_base64url()).expect("decode"),
            signing_key.to_bytes().to_vec()
        );
        assert!(keys.signer().is_ok());
    }

    #[test]
    fn test_split_public_key_discards_marker() {
        let mut point = [0u8; 65];
        point[0] = 0x04;
        for (i, byte) in point.iter_mut().enumerate().skip(1) {
            *byte = i as u8;
        }

        let (x, y) = split_public_key(&point).expect("split");
        assert_eq!(x[0], 1);
        assert_eq!(x[31], 32);
        assert_eq!(y[0], 33);
        assert_eq!(y[31], 64);
    }

    #[test]
    fn test_split_public_key_rejects_bad_input() {
        assert!(split_public_key(&[0x04; 64]).is_err());
        let mut compressed = [0u8; 65];
        compressed[0] = 0x02;
        assert!(split_public_key(&compressed).is_err());
    }

    #[test]
    fn test_from_raw_components_rejects_mismatched_pair() {
        let a = VapidKeyPair::generate("mailto:ops@example.com");
        let b = VapidKeyPair::generate("mailto:ops@example.com");
        let (x, y) = split_public_key(a.public_key_bytes()).expect("split");
        let d = codec::decode(&b.private_key_base64url()).expect("decode");

        let err = VapidSigner::from_raw_components(&x, &y, &d).expect_err("mismatch");
        assert!(matches!(err, PushError::Key(_)));
    }

    #[test]
    fn test_token_structure_and_claims() {
        let keys = VapidKeyPair::generate("mailto:ops@example.com");
        let now = Utc::now().timestamp();
        let token = issue_token("https://push.example.net", &keys).expect("issue token");

        let parts: Vec<&str> = token.token.split('.').collect();
        assert_eq!(parts.len(), 3, "JWT has three segments");
        for part in &parts {
            assert!(!part.contains('='));
            assert!(!part.contains('+'));
            assert!(!part.contains('/'));
        }

        let header = segment_json(parts[0]);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["typ"], "JWT");

        let claims = segment_json(parts[1]);
        assert_eq!(claims["aud"], "https://push.example.net");
        assert_eq!(claims["sub"], "mailto:ops@example.com");
        let exp = claims["exp"].as_i64().expect("exp is integer");
        assert!(exp >= now + 1);
        assert!(exp <= Utc::now().timestamp() + VAPID_TOKEN_LIFETIME_SECS);

        assert_eq!(token.public_key, keys.public_key_base64url());
    }

    #[test]
    fn test_token_signature_is_raw_and_verifies() {
        let keys = VapidKeyPair::generate("mailto:ops@example.com");
        let token = issue_token_at("https://push.example.net", &keys, 1_700_000_000).expect("issue");

        let (signing_input, signature_b64) = token.token.rsplit_once('.').expect("three segments");
        let raw = codec::decode(signature_b64).expect("decode signature");
        assert_eq!(raw.len(), 64, "signature is fixed-length r||s, not DER");

        let signature = Signature::from_slice(&raw).expect("raw signature");
        let signer = keys.signer().expect("signer");
        signer
            .verifying_key()
            .verify(signing_input.as_bytes(), &signature)
            .expect("signature verifies");

        let claims = segment_json(signing_input.split('.').nth(1).expect("payload"));
        assert_eq!(claims["exp"], 1_700_000_000 + VAPID_TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn test_token_is_reissued_per_call() {
        let keys = VapidKeyPair::generate("mailto:ops@example.com");
        let early = issue_token_at("https://push.example.net", &keys, 1_700_000_000).expect("first");
        let later = issue_token_at("https://push.example.net", &keys, 1_700_000_060).expect("second");

        let exp = |t: &VapidToken| segment_json(t.token.split('.').nth(1).expect("payload"))["exp"].clone();
        assert_eq!(exp(&later).as_i64().expect("exp") - exp(&early).as_i64().expect("exp"), 60);
    }

    #[test]
    fn test_authorization_header_format() {
        let token = VapidToken {
            token: "aaa.bbb.ccc".to_string(),
            public_key: "BPUB".to_string(),
        };
        assert_eq!(token.authorization_header(), "vapid t=aaa.bbb.ccc, k=BPUB");
    }

    #[test]
    fn test_audience_for_endpoint() {
        assert_eq!(
            audience_for("https://fcm.googleapis.com/fcm/send/abc:def").expect("aud"),
            "https://fcm.googleapis.com"
        );
        assert_eq!(
            audience_for("https://updates.push.services.mozilla.com:443/wpush/v2/xyz").expect("aud"),
            "https://updates.push.services.mozilla.com"
        );
        assert_eq!(audience_for("http://127.0.0.1:8080/push/1").expect("aud"), "http://127.0.0.1:8080");
        assert!(audience_for("not a url").is_err());
    }
}
