//! cybs3-crypto: zero-knowledge encryption core
//!
//! Key chain:
//! ```text
//! Mnemonic (user-held word list)
//!   → PBKDF2-HMAC-SHA512 (salt "mnemonic", 2048 rounds, 64-byte seed)
//!   → HKDF-SHA256 (salt "cybs3-vault", empty info) → 256-bit DerivedKey
//!   → optional HKDF-SHA256 (caller salt, info "cybs3-enhanced") → enhanced key
//! ```
//!
//! Wire format: a concatenation of independent AES-256-GCM frames,
//! `nonce(12) ‖ ciphertext ‖ tag(16)`. One frame per plaintext chunk; no
//! frame depends on any other frame's content, so frames can be opened
//! in isolation after reassembly from an arbitrarily fragmented
//! transport.

pub mod frame;
pub mod kdf;
pub mod mnemonic;
pub mod stream;

pub use frame::{chunk_size_for, encrypted_size, open_frame, seal_frame};
pub use kdf::{derive_key, derive_key_enhanced, DerivedKey};
pub use mnemonic::{generate_mnemonic, Mnemonic};
pub use stream::{decrypt_bytes, encrypt_bytes, DecryptStream, EncryptStream};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Per-frame overhead: nonce + tag
pub const FRAME_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;
