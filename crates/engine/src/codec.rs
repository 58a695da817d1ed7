//! Reversible encryption and display masking for card numbers.
//!
//! Card numbers are stored only in encrypted form. Encryption is
//! **deterministic** (AES-256 in ECB mode with PKCS#7 padding and a single
//! static key): the same number always yields the same ciphertext, which
//! is what lets the engine look a number up for uniqueness without decrypting
//! every stored card. The price is that equal numbers are recognizable in the
//! store and the key cannot be rotated without re-encrypting every row.

use std::fmt;

use aes::{
    Aes256,
    cipher::{BlockDecryptMut, BlockEncryptMut, InvalidLength, KeyInit, block_padding::Pkcs7},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::{EngineError, ResultEngine, card_number::CARD_NUMBER_LEN};

type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

/// Key length required by [`CardNumberCodec`], in bytes.
pub const KEY_LEN: usize = 32;

/// Encrypts, decrypts and masks card numbers.
#[derive(Clone)]
pub struct CardNumberCodec {
    encryptor: Aes256EcbEnc,
    decryptor: Aes256EcbDec,
}

impl fmt::Debug for CardNumberCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardNumberCodec").finish_non_exhaustive()
    }
}

impl CardNumberCodec {
    /// Builds a codec from a raw 32 byte key.
    pub fn new(key: &[u8]) -> ResultEngine<Self> {
        let bad_key = |_: InvalidLength| {
            EngineError::Encryption(format!("encryption key must be {KEY_LEN} bytes"))
        };
        Ok(Self {
            encryptor: Aes256EcbEnc::new_from_slice(key).map_err(bad_key)?,
            decryptor: Aes256EcbDec::new_from_slice(key).map_err(bad_key)?,
        })
    }

    /// Builds a codec from a base64 encoded 32 byte key (the configuration
    /// format).
    pub fn from_base64_key(encoded: &str) -> ResultEngine<Self> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| EngineError::Encryption("encryption key is not base64".to_string()))?;
        Self::new(&key)
    }

    /// Encrypts `plain` and returns the base64 ciphertext.
    pub fn encrypt(&self, plain: &str) -> String {
        let sealed = self
            .encryptor
            .clone()
            .encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());
        STANDARD.encode(sealed)
    }

    /// Decrypts a value produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, opaque: &str) -> ResultEngine<String> {
        let corrupt = |reason: &str| EngineError::Encryption(format!("corrupt ciphertext: {reason}"));

        let sealed = STANDARD
            .decode(opaque.trim())
            .map_err(|_| corrupt("not base64"))?;
        if sealed.is_empty() {
            return Err(corrupt("empty"));
        }
        let plain = self
            .decryptor
            .clone()
            .decrypt_padded_vec_mut::<Pkcs7>(&sealed)
            .map_err(|_| corrupt("bad length or padding"))?;

        String::from_utf8(plain).map_err(|_| corrupt("not utf-8"))
    }

    /// Display form of a card number: `**** **** **** 1234`.
    ///
    /// Returns `None` unless `plain` is exactly 16 ASCII digits.
    pub fn mask(plain: &str) -> Option<String> {
        if plain.len() != CARD_NUMBER_LEN || !plain.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(format!("**** **** **** {}", &plain[CARD_NUMBER_LEN - 4..]))
    }
}
