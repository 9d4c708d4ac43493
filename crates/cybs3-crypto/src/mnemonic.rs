//! Mnemonic handling: the user's root secret, a sequence of words.
//!
//! The phrase is held behind `secrecy::SecretString` so it never leaks
//! through `Debug` output, and fresh mnemonics come from BIP-39 with OS
//! entropy. Derivation accepts any well-formed word list; wordlist
//! membership is only enforced for generated mnemonics.

use bip39::Mnemonic as Bip39Mnemonic;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use cybs3_core::{CybsError, CybsResult};

/// An ordered list of secret words, joined by single spaces for
/// derivation.
#[derive(Clone)]
pub struct Mnemonic {
    phrase: SecretString,
}

impl Mnemonic {
    /// Build from an ordered word list.
    ///
    /// Malformed input (empty list, empty word, or internal whitespace in
    /// a word) is a fatal configuration error; a default key is never
    /// silently substituted.
    pub fn from_words(words: &[&str]) -> CybsResult<Self> {
        if words.is_empty() {
            return Err(CybsError::Configuration("mnemonic is empty".into()));
        }
        for word in words {
            if word.is_empty() || word.chars().any(char::is_whitespace) {
                return Err(CybsError::Configuration(format!(
                    "malformed mnemonic word: {word:?}"
                )));
            }
        }
        Ok(Self {
            phrase: SecretString::from(words.join(" ")),
        })
    }

    /// Build from a whitespace-separated phrase.
    pub fn from_phrase(phrase: &str) -> CybsResult<Self> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        Self::from_words(&words)
    }

    /// The space-joined phrase, for key derivation only.
    pub(crate) fn phrase(&self) -> &SecretString {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.expose_secret().split(' ').count()
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mnemonic")
            .field("phrase", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh 12-word BIP-39 mnemonic from 128 bits of OS entropy.
///
/// Shown to the user exactly once at vault initialisation; never stored.
pub fn generate_mnemonic() -> CybsResult<Mnemonic> {
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);

    let mnemonic = Bip39Mnemonic::from_entropy(&entropy)
        .map_err(|e| CybsError::Configuration(format!("mnemonic generation failed: {e}")))?;

    Mnemonic::from_phrase(&mnemonic.to_string())
}
