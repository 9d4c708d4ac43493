//! AES-256-GCM frame sealing/opening and the chunk-size policy.
//!
//! Frame format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The nonce is always generated here, never supplied by the caller:
//! nonce reuse under one key breaks GCM, so the API gives callers no way
//! to cause it.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use cybs3_core::{CybsError, CybsResult};

use crate::kdf::DerivedKey;
use crate::{FRAME_OVERHEAD, NONCE_SIZE};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Plaintext chunk size for a stream of `total_size` bytes.
///
/// Small objects get small frames so progress is visible; large objects
/// get large frames to keep per-frame overhead negligible.
pub fn chunk_size_for(total_size: u64) -> usize {
    let size = if total_size < 10 * MIB {
        256 * KIB
    } else if total_size < 100 * MIB {
        MIB
    } else if total_size < 1024 * MIB {
        5 * MIB
    } else {
        16 * MIB
    };
    size as usize
}

/// Exact ciphertext length for `plain_size` bytes framed at `chunk_size`.
///
/// Every full chunk costs `chunk_size + 28`; a non-empty remainder costs
/// `remainder + 28`. Holds for all sizes, including 0 and exact
/// multiples of `chunk_size`. `chunk_size` must be non-zero.
pub fn encrypted_size(plain_size: u64, chunk_size: u64) -> u64 {
    debug_assert!(chunk_size > 0, "chunk_size must be non-zero");
    let overhead = FRAME_OVERHEAD as u64;
    let full_chunks = plain_size / chunk_size;
    let remainder = plain_size % chunk_size;

    let mut total = full_chunks * (chunk_size + overhead);
    if remainder > 0 {
        total += remainder + overhead;
    }
    total
}

/// Encrypt one plaintext chunk into one self-contained frame.
pub fn seal_frame(key: &DerivedKey, plaintext: &[u8]) -> CybsResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CybsError::Crypto(format!("frame encryption failed: {e}")))?;

    let mut frame = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    frame.extend_from_slice(&nonce_bytes);
    frame.extend_from_slice(&ciphertext);
    Ok(frame)
}

/// Open one authenticated frame.
///
/// A tag mismatch means the wrong key or corrupted/tampered ciphertext.
/// The error is deliberately opaque and the failure is terminal; retrying
/// cannot fix either cause.
pub fn open_frame(key: &DerivedKey, frame: &[u8]) -> CybsResult<Vec<u8>> {
    if frame.len() < FRAME_OVERHEAD {
        return Err(CybsError::Crypto(format!(
            "invalid frame: {} bytes (minimum {FRAME_OVERHEAD})",
            frame.len()
        )));
    }

    let (nonce_bytes, ciphertext) = frame.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CybsError::Crypto("frame decryption failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;

    fn test_key() -> DerivedKey {
        DerivedKey::from_bytes([7u8; KEY_SIZE])
    }

    #[test]
    fn test_chunk_size_policy() {
        assert_eq!(chunk_size_for(0), 256 * 1024);
        assert_eq!(chunk_size_for(10 * 1024 * 1024 - 1), 256 * 1024);
        assert_eq!(chunk_size_for(10 * 1024 * 1024), 1024 * 1024);
        assert_eq!(chunk_size_for(100 * 1024 * 1024), 5 * 1024 * 1024);
        assert_eq!(chunk_size_for(2 * 1024 * 1024 * 1024), 16 * 1024 * 1024);
    }

    #[test]
    fn test_encrypted_size_formula() {
        let c = 1000u64;
        assert_eq!(encrypted_size(0, c), 0);
        assert_eq!(encrypted_size(1, c), 1 + 28);
        assert_eq!(encrypted_size(c - 1, c), c - 1 + 28);
        assert_eq!(encrypted_size(c, c), c + 28);
        assert_eq!(encrypted_size(c + 1, c), (c + 28) + (1 + 28));
        assert_eq!(encrypted_size(2 * c, c), 2 * (c + 28));
        assert_eq!(encrypted_size(2 * c + 5, c), 2 * (c + 28) + 5 + 28);
    }

    #[test]
    #[should_panic(expected = "chunk_size must be non-zero")]
    fn test_encrypted_size_zero_chunk_size_panics() {
        encrypted_size(10, 0);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let plaintext = b"hello, sealed world";

        let frame = seal_frame(&key, plaintext).unwrap();
        assert_eq!(frame.len(), plaintext.len() + FRAME_OVERHEAD);

        let opened = open_frame(&key, &frame).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_nonce_freshness() {
        let key = test_key();
        let a = seal_frame(&key, b"same plaintext").unwrap();
        let b = seal_frame(&key, b"same plaintext").unwrap();
        assert_ne!(a, b, "every frame must carry a fresh nonce");
    }

    #[test]
    fn test_open_wrong_key_fails() {
        let frame = seal_frame(&test_key(), b"secret").unwrap();
        let wrong = DerivedKey::from_bytes([8u8; KEY_SIZE]);
        assert!(open_frame(&wrong, &frame).is_err());
    }

    #[test]
    fn test_any_bit_flip_detected() {
        let key = test_key();
        let frame = seal_frame(&key, b"tamper target").unwrap();

        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut tampered = frame.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    open_frame(&key, &tampered).is_err(),
                    "flip at byte {byte} bit {bit} must fail authentication"
                );
            }
        }
    }

    #[test]
    fn test_short_frame_rejected() {
        let key = test_key();
        assert!(matches!(
            open_frame(&key, &[0u8; 27]),
            Err(CybsError::Crypto(_))
        ));
    }

    #[test]
    fn test_empty_chunk_frame() {
        let key = test_key();
        let frame = seal_frame(&key, b"").unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD);
        assert_eq!(open_frame(&key, &frame).unwrap(), b"");
    }
}
