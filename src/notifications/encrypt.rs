//! Message encryption for Web Push (RFC 8291, `aes128gcm` from RFC 8188).
//!
//! Every message gets a fresh ephemeral P-256 key and a fresh salt, so no
//! key material is reused across messages or subscribers.
//!
//! # Key schedule
//!
//! ```text
//! ecdh_secret = ECDH(ephemeral_private, ua_public)
//! ikm   = HKDF(salt = auth_secret, ikm = ecdh_secret,
//!              info = "WebPush: info" || 0x00 || ua_public || as_public, 32)
//! cek   = HKDF(salt = salt, ikm = ikm, info = "Content-Encoding: aes128gcm" || 0x00, 16)
//! nonce = HKDF(salt = salt, ikm = ikm, info = "Content-Encoding: nonce" || 0x00, 12)
//! ```
//!
//! # Body layout
//!
//! ```text
//! salt (16) | record size (4, BE, 4096) | idlen (1, = 65) | as_public (65) | ciphertext
//! ```

// Rust guideline compliant 2026-02

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::RngCore;
use zeroize::Zeroizing;

use super::codec;
use super::hkdf;
use super::push::PushSubscription;
use crate::constants::{
    AUTH_SECRET_LEN, HEADER_LEN, RECORD_DELIMITER, RECORD_SIZE, SALT_LEN, UNCOMPRESSED_POINT_LEN,
};
use crate::error::{PushError, Result};

/// AES-GCM authentication tag length.
const TAG_LEN: usize = 16;

/// Largest plaintext that fits in a single record with its delimiter and tag.
pub const MAX_PLAINTEXT_LEN: usize = RECORD_SIZE as usize - TAG_LEN - 1;

/// Key id length byte: the ephemeral public key is the key id.
#[allow(clippy::cast_possible_truncation, reason = "65 fits in a u8")]
const KEY_ID_LEN: u8 = UNCOMPRESSED_POINT_LEN as u8;

const WEBPUSH_INFO: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Output of one encryption: the pieces that make up the request body.
#[derive(Debug, Clone)]
pub struct EncryptedMessage {
    /// AES-128-GCM ciphertext with the 16-byte tag appended.
    pub ciphertext: Vec<u8>,
    /// Per-message HKDF salt.
    pub salt: [u8; SALT_LEN],
    /// Ephemeral sender public key (uncompressed point), carried as key id.
    pub ephemeral_public_key: [u8; UNCOMPRESSED_POINT_LEN],
}

impl EncryptedMessage {
    /// Serialize into the `aes128gcm` request body.
    pub fn to_body(&self) -> Vec<u8> {
        build_body(&self.salt, &self.ephemeral_public_key, &self.ciphertext)
    }
}

/// Frame a single-record `aes128gcm` body.
pub fn build_body(
    salt: &[u8; SALT_LEN],
    ephemeral_public_key: &[u8; UNCOMPRESSED_POINT_LEN],
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(HEADER_LEN + UNCOMPRESSED_POINT_LEN + ciphertext.len());
    body.extend_from_slice(salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(KEY_ID_LEN);
    body.extend_from_slice(ephemeral_public_key);
    body.extend_from_slice(ciphertext);
    body
}

/// Content encryption key and nonce for one message.
pub struct ContentKeys {
    /// AES-128 key.
    pub cek: Zeroizing<[u8; 16]>,
    /// GCM nonce for the single record (sequence number 0).
    pub nonce: [u8; 12],
}

impl std::fmt::Debug for ContentKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKeys").finish_non_exhaustive()
    }
}

/// Run the RFC 8291 key schedule.
///
/// `ua_public` is the subscriber's key and `as_public` the ephemeral sender
/// key; the order inside the info string matters.
pub fn derive_content_keys(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<ContentKeys> {
    let mut key_info = Vec::with_capacity(WEBPUSH_INFO.len() + ua_public.len() + as_public.len());
    key_info.extend_from_slice(WEBPUSH_INFO);
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(as_public);

    let ikm = hkdf::derive(auth_secret, ecdh_secret, &key_info, 32)?;
    let prk = hkdf::extract(salt, &ikm)?;

    let cek_bytes = hkdf::expand(prk.as_slice(), CEK_INFO, 16)?;
    let nonce_bytes = hkdf::expand(prk.as_slice(), NONCE_INFO, 12)?;

    let mut cek = Zeroizing::new([0u8; 16]);
    cek.copy_from_slice(&cek_bytes);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&nonce_bytes);

    Ok(ContentKeys { cek, nonce })
}

/// Pad and encrypt a single record with already-agreed key material.
fn seal(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8; SALT_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(PushError::Encryption(format!(
            "payload is {} bytes, limit is {MAX_PLAINTEXT_LEN}",
            plaintext.len()
        )));
    }

    let keys = derive_content_keys(ecdh_secret, auth_secret, ua_public, as_public, salt)?;

    let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
    padded.extend_from_slice(plaintext);
    padded.push(RECORD_DELIMITER);

    let cipher = Aes128Gcm::new_from_slice(keys.cek.as_slice())
        .map_err(|e| PushError::Encryption(format!("AES key init failed: {e}")))?;
    cipher
        .encrypt(Nonce::from_slice(&keys.nonce), padded.as_slice())
        .map_err(|e| PushError::Encryption(format!("AES-GCM encryption failed: {e}")))
}

/// Encrypt `plaintext` for the device behind `subscription`.
pub fn encrypt(subscription: &PushSubscription, plaintext: &[u8]) -> Result<EncryptedMessage> {
    let ua_public_bytes = codec::decode_exact(&subscription.p256dh, UNCOMPRESSED_POINT_LEN, "p256dh")?;
    let auth_secret = Zeroizing::new(codec::decode_exact(&subscription.auth, AUTH_SECRET_LEN, "auth")?);

    let ua_public = PublicKey::from_sec1_bytes(&ua_public_bytes)
        .map_err(|e| PushError::Key(format!("p256dh is not a P-256 point: {e}")))?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let mut ephemeral_public_key = [0u8; UNCOMPRESSED_POINT_LEN];
    ephemeral_public_key.copy_from_slice(ephemeral.public_key().to_encoded_point(false).as_bytes());

    let shared = ephemeral.diffie_hellman(&ua_public);

    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let ciphertext = seal(
        shared.raw_secret_bytes().as_slice(),
        &auth_secret,
        &ua_public_bytes,
        &ephemeral_public_key,
        &salt,
        plaintext,
    )?;

    Ok(EncryptedMessage {
        ciphertext,
        salt,
        ephemeral_public_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::SecretKey;

    // RFC 8291 Section 5 example
    const PLAINTEXT: &[u8] = b"When I grow up, I want to be a watermelon";
    const AS_PUBLIC: &str =
        "BP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8";
    const AS_PRIVATE: &str = "yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw";
    const UA_PUBLIC: &str =
        "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4";
    const UA_PRIVATE: &str = "q1dXpw3UpT5VOmu_cf_v6ih07Aems3njxI-JWgLcM94";
    const SALT: &str = "DGv6ra1nlYgDCS1FRnbzlw";
    const AUTH: &str = "BTBZMqHH6r4Tts7J_aSIgg";
    const ECDH: &str = "kyrL1jIIOHEzg3sM2ZWRHDRB62YACZhhSlknJ672kSs";
    const IKM: &str = "S4lYMb_L0FxCeq0WhDx813KgSYqU26kOyzWUdsXYyrg";
    const CEK: &str = "oIhVW04MRdy2XN9CiKLxTg";
    const NONCE: &str = "4h_95klXJ5E_qnoN";
    const CIPHERTEXT: &str =
        "8pfeW0KbunFT06SuDKoJH9Ql87S1QUrdirN6GcG7sFz1y1sqLgVi1VhjVkHsUoEsbI_0LpXMuGvnzQ";
    const BODY: &str = "DGv6ra1nlYgDCS1FRnbzlwAAEABBBP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A_yl95bQpu6cVPTpK4Mqgkf1CXztLVBSt2Ks3oZwbuwXPXLWyouBWLVWGNWQexSgSxsj_Qulcy4a-fN";

    fn b64(text: &str) -> Vec<u8> {
        codec::decode(text).expect("vector decodes")
    }

    fn ecdh(private_b64: &str, public_b64: &str) -> Vec<u8> {
        let secret = SecretKey::from_slice(&b64(private_b64)).expect("private key");
        let public = PublicKey::from_sec1_bytes(&b64(public_b64)).expect("public key");
        let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
        shared.raw_secret_bytes().to_vec()
    }

    /// Receiver-side decryption, as a browser would do it.
    fn decrypt_body(body: &[u8], ua_private: &SecretKey, auth: &[u8]) -> Vec<u8> {
        let salt = &body[..16];
        let key_id_len = body[20] as usize;
        let as_public = &body[21..21 + key_id_len];
        let ciphertext = &body[21 + key_id_len..];

        let sender = PublicKey::from_sec1_bytes(as_public).expect("sender key");
        let shared = p256::ecdh::diffie_hellman(ua_private.to_nonzero_scalar(), sender.as_affine());
        let ua_public = ua_private.public_key().to_encoded_point(false);

        let keys = derive_content_keys(
            shared.raw_secret_bytes().as_slice(),
            auth,
            ua_public.as_bytes(),
            as_public,
            salt,
        )
        .expect("derive");
        let cipher = Aes128Gcm::new_from_slice(keys.cek.as_slice()).expect("cek");
        cipher
            .decrypt(Nonce::from_slice(&keys.nonce), ciphertext)
            .expect("decrypts")
    }

    fn subscription_for(ua_private: &SecretKey, auth: &[u8]) -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example.net/send/abc".to_string(),
            p256dh: codec::encode(ua_private.public_key().to_encoded_point(false).as_bytes()),
            auth: codec::encode(auth),
            owner: "u1".to_string(),
        }
    }

    #[test]
    fn test_rfc8291_ecdh_agrees_both_ways() {
        assert_eq!(ecdh(AS_PRIVATE, UA_PUBLIC), b64(ECDH));
        assert_eq!(ecdh(UA_PRIVATE, AS_PUBLIC), b64(ECDH));
    }

    #[test]
    fn test_rfc8291_key_schedule() {
        let keys = derive_content_keys(&b64(ECDH), &b64(AUTH), &b64(UA_PUBLIC), &b64(AS_PUBLIC), &b64(SALT))
            .expect("derive");
        assert_eq!(keys.cek.to_vec(), b64(CEK));
        assert_eq!(keys.nonce.to_vec(), b64(NONCE));

        let mut info = WEBPUSH_INFO.to_vec();
        info.extend_from_slice(&b64(UA_PUBLIC));
        info.extend_from_slice(&b64(AS_PUBLIC));
        let ikm = hkdf::derive(&b64(AUTH), &b64(ECDH), &info, 32).expect("ikm");
        assert_eq!(ikm.to_vec(), b64(IKM));
    }

    #[test]
    fn test_rfc8291_ciphertext_and_body() {
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&b64(SALT));
        let mut as_public = [0u8; UNCOMPRESSED_POINT_LEN];
        as_public.copy_from_slice(&b64(AS_PUBLIC));

        let ciphertext = seal(&b64(ECDH), &b64(AUTH), &b64(UA_PUBLIC), &as_public, &salt, PLAINTEXT)
            .expect("seal");
        assert_eq!(ciphertext, b64(CIPHERTEXT));

        let message = EncryptedMessage {
            ciphertext,
            salt,
            ephemeral_public_key: as_public,
        };
        assert_eq!(message.to_body(), b64(BODY));
    }

    #[test]
    fn test_body_layout() {
        let salt = [0xa5u8; SALT_LEN];
        let mut key = [0u8; UNCOMPRESSED_POINT_LEN];
        key[0] = 0x04;
        key[64] = 0xee;

        for n in [0usize, 17, 300] {
            let ciphertext = vec![0x5au8; n];
            let body = build_body(&salt, &key, &ciphertext);

            assert_eq!(body.len(), 16 + 4 + 1 + 65 + n);
            assert_eq!(&body[..16], &salt);
            assert_eq!(u32::from_be_bytes([body[16], body[17], body[18], body[19]]), 4096);
            assert_eq!(body[20], 65);
            assert_eq!(&body[21..86], &key);
            assert_eq!(&body[86..], ciphertext.as_slice());
        }
    }

    #[test]
    fn test_encrypt_decrypts_on_receiver_side() {
        let ua_private = SecretKey::random(&mut OsRng);
        let auth = [7u8; 16];
        let subscription = subscription_for(&ua_private, &auth);

        let message = encrypt(&subscription, b"{\"title\":\"Hi\"}").expect("encrypt");
        assert_eq!(message.ciphertext.len(), 14 + 1 + 16);
        assert_eq!(message.ephemeral_public_key[0], 0x04);

        let padded = decrypt_body(&message.to_body(), &ua_private, &auth);
        assert_eq!(padded.last(), Some(&RECORD_DELIMITER));
        assert_eq!(&padded[..padded.len() - 1], b"{\"title\":\"Hi\"}");
    }

    #[test]
    fn test_encryption_is_unique_per_message() {
        let ua_private = SecretKey::random(&mut OsRng);
        let subscription = subscription_for(&ua_private, &[3u8; 16]);

        let a = encrypt(&subscription, b"same plaintext").expect("first");
        let b = encrypt(&subscription, b"same plaintext").expect("second");

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ephemeral_public_key, b.ephemeral_public_key);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_encrypt_rejects_bad_subscription_keys() {
        let ua_private = SecretKey::random(&mut OsRng);
        let mut subscription = subscription_for(&ua_private, &[1u8; 16]);
        subscription.auth = codec::encode(&[1u8; 8]);
        assert!(matches!(encrypt(&subscription, b"x"), Err(PushError::Decode(_))));

        let mut subscription = subscription_for(&ua_private, &[1u8; 16]);
        let mut off_curve = [0u8; 65];
        off_curve[0] = 0x04;
        subscription.p256dh = codec::encode(&off_curve);
        assert!(matches!(encrypt(&subscription, b"x"), Err(PushError::Key(_))));

        let mut subscription = subscription_for(&ua_private, &[1u8; 16]);
        subscription.p256dh = "not*base64".to_string();
        assert!(matches!(encrypt(&subscription, b"x"), Err(PushError::Decode(_))));
    }

    #[test]
    fn test_encrypt_rejects_oversized_payload() {
        let ua_private = SecretKey::random(&mut OsRng);
        let subscription = subscription_for(&ua_private, &[1u8; 16]);

        assert!(encrypt(&subscription, &vec![b'a'; MAX_PLAINTEXT_LEN]).is_ok());
        let err = encrypt(&subscription, &vec![b'a'; MAX_PLAINTEXT_LEN + 1]).expect_err("too large");
        assert!(matches!(err, PushError::Encryption(_)));
    }
}
