//! Short UUIDs
//!
//! A UUID's 128-bit value written in base 62 (`0-9A-Za-z`), at most 22
//! characters. Used in public URLs in place of the hyphenated form.

use uuid::Uuid;

use crate::error::{ModelError, Result};

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Longest encoding of a `u128`
const MAX_LEN: usize = 22;

pub fn encode(uuid: &Uuid) -> String {
    let mut value = uuid.as_u128();
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(MAX_LEN);
    while value > 0 {
        digits.push(ALPHABET[(value % 62) as usize]);
        value /= 62;
    }
    digits.reverse();

    String::from_utf8_lossy(&digits).into_owned()
}

pub fn decode(encoded: &str) -> Result<Uuid> {
    if encoded.is_empty() || encoded.len() > MAX_LEN {
        return Err(invalid(encoded));
    }

    let mut value: u128 = 0;
    for byte in encoded.bytes() {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'Z' => byte - b'A' + 10,
            b'a'..=b'z' => byte - b'a' + 36,
            _ => return Err(invalid(encoded)),
        };
        value = value
            .checked_mul(62)
            .and_then(|v| v.checked_add(u128::from(digit)))
            .ok_or_else(|| invalid(encoded))?;
    }

    Ok(Uuid::from_u128(value))
}

fn invalid(encoded: &str) -> ModelError {
    ModelError::validation(format!("invalid short uuid: {:?}", encoded))
}
