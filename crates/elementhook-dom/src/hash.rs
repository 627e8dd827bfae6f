//! Fast deterministic string hashing for element identifiers.
//!
//! 32-bit rolling hash over UTF-16 code units (`h = h * 31 + c`, wrapping),
//! rendered as base36 of the absolute value. Collision resistance is best
//! effort; this is not a security primitive.

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hash a string to a 32-bit signed value.
pub fn rolling_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}

/// Render an unsigned value in base36.
pub fn to_base36(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(7);
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Hash a string and render it in base36.
pub fn hash_base36(input: &str) -> String {
    to_base36(rolling_hash(input).unsigned_abs())
}
