//! HKDF-SHA-256 (RFC 5869).
//!
//! Extract and expand are exposed separately because the RFC 8291 key
//! schedule runs one extract per salt and several expands per PRK.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{PushError, Result};

/// SHA-256 output length.
pub const HASH_LEN: usize = 32;

/// Extract a pseudorandom key from `ikm`, keyed by `salt`.
///
/// An empty salt is treated as `HASH_LEN` zero bytes.
pub fn extract(salt: &[u8], ikm: &[u8]) -> Result<Zeroizing<[u8; HASH_LEN]>> {
    let salt = (!salt.is_empty()).then_some(salt);
    let (prk, _) = Hkdf::<Sha256>::extract(salt, ikm);
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    out.copy_from_slice(prk.as_slice());
    Ok(out)
}

/// Expand `prk` into `length` bytes bound to `info`.
pub fn expand(prk: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::from_prk(prk)
        .map_err(|e| PushError::Key(format!("HKDF pseudorandom key rejected: {e}")))?;
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hk.expand(info, okm.as_mut_slice())
        .map_err(|e| PushError::Key(format!("HKDF expansion to {length} bytes failed: {e}")))?;
    Ok(okm)
}

/// Full HKDF: extract then expand.
pub fn derive(salt: &[u8], ikm: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>> {
    let prk = extract(salt, ikm)?;
    expand(prk.as_slice(), info, length)
}
