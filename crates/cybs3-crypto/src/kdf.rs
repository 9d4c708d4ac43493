//! Key derivation: mnemonic phrase → 256-bit vault key
//!
//! The chain is deliberately bit-exact and versioned by its constants:
//! changing the salts, round count, or hash breaks every existing vault.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use secrecy::ExposeSecret;
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

use cybs3_core::{CybsError, CybsResult};

use crate::mnemonic::Mnemonic;
use crate::KEY_SIZE;

/// PBKDF2 salt for the mnemonic seed stretch
const SEED_SALT: &[u8] = b"mnemonic";
/// PBKDF2 iteration count
const SEED_ROUNDS: u32 = 2048;
/// HKDF salt for the base vault key
const VAULT_SALT: &[u8] = b"cybs3-vault";
/// HKDF info for the enhanced (extra-salt) variant
const ENHANCED_INFO: &[u8] = b"cybs3-enhanced";

/// A 256-bit symmetric key derived from a mnemonic.
///
/// Never persisted; recomputed on demand and zeroized on drop so key
/// material does not linger in freed memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the base 256-bit vault key from a mnemonic.
///
/// PBKDF2-HMAC-SHA512 over the space-joined words (salt `"mnemonic"`,
/// 2048 rounds, 64-byte seed), then HKDF-SHA256 with salt `"cybs3-vault"`
/// and empty info, truncated to 32 bytes. Deterministic: the same
/// mnemonic always produces the same key, bit for bit.
pub fn derive_key(mnemonic: &Mnemonic) -> CybsResult<DerivedKey> {
    let phrase = mnemonic.phrase();

    let mut seed = [0u8; 64];
    pbkdf2_hmac::<Sha512>(
        phrase.expose_secret().as_bytes(),
        SEED_SALT,
        SEED_ROUNDS,
        &mut seed,
    );

    let hkdf = Hkdf::<Sha256>::new(Some(VAULT_SALT), &seed);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(&[], &mut okm)
        .map_err(|e| CybsError::Crypto(format!("HKDF expand failed: {e}")))?;
    seed.zeroize();

    Ok(DerivedKey::from_bytes(okm))
}

/// Enhanced variant: one extra HKDF-SHA256 pass over the base key with a
/// caller-supplied salt and info `"cybs3-enhanced"`.
///
/// With no extra salt this is the identity: the base key is returned
/// unchanged, so callers can thread an optional salt through without
/// branching.
pub fn derive_key_enhanced(
    mnemonic: &Mnemonic,
    extra_salt: Option<&[u8]>,
) -> CybsResult<DerivedKey> {
    let base = derive_key(mnemonic)?;

    let Some(salt) = extra_salt else {
        return Ok(base);
    };

    let hkdf = Hkdf::<Sha256>::new(Some(salt), base.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(ENHANCED_INFO, &mut okm)
        .map_err(|e| CybsError::Crypto(format!("HKDF expand failed: {e}")))?;

    Ok(DerivedKey::from_bytes(okm))
}
