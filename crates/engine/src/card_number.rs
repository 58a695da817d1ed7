//! Card number generation.
//!
//! A card number is 16 decimal digits satisfying the Luhn checksum. Numbers
//! are sampled at random and a candidate is only accepted when its encrypted
//! form is not already stored.

use std::future::Future;

use rand::Rng;

use crate::{EngineError, ResultEngine, codec::CardNumberCodec};

pub const CARD_NUMBER_LEN: usize = 16;

/// Upper bound on sampled candidates before giving up.
///
/// About one random candidate in ten passes the checksum, and collisions are
/// negligible while the store holds far fewer than 10^15 cards.
pub const MAX_GENERATION_ATTEMPTS: usize = 10_000;

/// A freshly generated card number together with its stored form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedNumber {
    pub plain: String,
    pub encrypted: String,
}

/// Luhn checksum over a string of ASCII digits.
///
/// Starting from the rightmost digit, every second digit is doubled (minus 9
/// when the result exceeds 9); the number is valid when the total is a
/// multiple of 10. Empty input or any non-digit character is invalid.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    for (i, byte) in number.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(byte - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// Samples 16 uniformly random digits. The result is not checksum-filtered.
pub fn random_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CARD_NUMBER_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Generates a Luhn-valid number whose encrypted form is not yet taken.
///
/// `exists` answers whether an encrypted number is already stored.
pub async fn generate_unique<F, Fut>(
    codec: &CardNumberCodec,
    mut exists: F,
) -> ResultEngine<GeneratedNumber>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ResultEngine<bool>>,
{
    for attempt in 1..=MAX_GENERATION_ATTEMPTS {
        let candidate = {
            let mut rng = rand::thread_rng();
            random_number(&mut rng)
        };
        if !luhn_valid(&candidate) {
            continue;
        }

        let encrypted = codec.encrypt(&candidate);
        if exists(encrypted.clone()).await? {
            tracing::debug!(attempt, "card number already issued, sampling again");
            continue;
        }

        return Ok(GeneratedNumber {
            plain: candidate,
            encrypted,
        });
    }

    Err(EngineError::ExistingKey(
        "no unique card number found".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashSet};

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::codec::KEY_LEN;

    fn codec() -> CardNumberCodec {
        CardNumberCodec::new(&[42u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn luhn_accepts_known_numbers() {
        assert!(luhn_valid("4539578763621486"));
        assert!(luhn_valid("79927398713"));
        assert!(luhn_valid("0000000000000000"));
    }

    #[test]
    fn luhn_rejects_bad_input() {
        assert!(!luhn_valid("4539578763621487"));
        assert!(!luhn_valid("79927398710"));
        assert!(!luhn_valid("4539 5787 6362 1486"));
        assert!(!luhn_valid(""));
    }

    #[test]
    fn random_number_has_sixteen_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let n = random_number(&mut rng);
            assert_eq!(n.len(), CARD_NUMBER_LEN);
            assert!(n.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn generated_numbers_are_valid_and_unique() {
        let codec = codec();
        let taken = RefCell::new(HashSet::new());

        for _ in 0..200 {
            let generated = generate_unique(&codec, |encrypted| {
                let hit = taken.borrow().contains(&encrypted);
                async move { Ok(hit) }
            })
            .await
            .unwrap();

            assert_eq!(generated.plain.len(), CARD_NUMBER_LEN);
            assert!(luhn_valid(&generated.plain));
            assert_eq!(codec.decrypt(&generated.encrypted).unwrap(), generated.plain);
            assert!(taken.borrow_mut().insert(generated.encrypted));
        }
    }

    #[tokio::test]
    async fn gives_up_when_every_candidate_is_taken() {
        let err = generate_unique(&codec(), |_| async { Ok(true) })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ExistingKey(_)));
    }

    #[tokio::test]
    async fn lookup_errors_propagate() {
        let err = generate_unique(&codec(), |_| async {
            Err(EngineError::KeyNotFound("store".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err, EngineError::KeyNotFound("store".to_string()));
    }
}
