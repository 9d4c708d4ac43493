//! Cross-module property: data encrypted under a mnemonic-derived key is
//! recoverable with nothing but the same mnemonic.

use cybs3_crypto::{
    chunk_size_for, decrypt_bytes, derive_key, derive_key_enhanced, encrypt_bytes, Mnemonic,
    FRAME_OVERHEAD,
};

const PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

#[test]
fn mnemonic_alone_recovers_the_plaintext() {
    let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let chunk_size = chunk_size_for(data.len() as u64);

    let encrypted = {
        let key = derive_key(&Mnemonic::from_phrase(PHRASE).unwrap()).unwrap();
        encrypt_bytes(&key, &data, chunk_size).unwrap()
    };

    // A fresh derivation from the same words opens the stream.
    let key = derive_key(&Mnemonic::from_phrase(PHRASE).unwrap()).unwrap();
    let decrypted = decrypt_bytes(&key, &encrypted, chunk_size + FRAME_OVERHEAD).unwrap();
    assert_eq!(decrypted, data);
}

#[test]
fn enhanced_key_does_not_open_base_ciphertext() {
    let mnemonic = Mnemonic::from_phrase(PHRASE).unwrap();
    let base = derive_key(&mnemonic).unwrap();
    let enhanced = derive_key_enhanced(&mnemonic, Some(b"device-salt")).unwrap();

    let encrypted = encrypt_bytes(&base, b"vault contents", 1024).unwrap();
    assert!(decrypt_bytes(&enhanced, &encrypted, 1024 + FRAME_OVERHEAD).is_err());
}
