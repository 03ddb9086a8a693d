//! ULID-based `msgId` generation.
//!
//! Each user action needs a fresh, globally-unique, time-sortable
//! identifier: format is a 26-character Crockford base32 string (48 bits
//! timestamp + 80 bits random), so a UUID-shaped guarantee of high-probability
//! uniqueness holds without pulling in a UUID crate.

use rand::Rng;

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Generate a new msgId.
pub fn generate() -> String {
    let now_ms = fireline_proto::now_ms();

    let mut rng = rand::thread_rng();
    let rand_hi: u16 = rng.r#gen();
    let rand_lo: u64 = rng.r#gen();

    let mut buf = [0u8; 26];

    let mut ts = now_ms;
    for i in (0..10).rev() {
        buf[i] = CROCKFORD[(ts & 0x1F) as usize];
        ts >>= 5;
    }

    let mut r = rand_hi as u128 | ((rand_lo as u128) << 16);
    for i in (10..26).rev() {
        buf[i] = CROCKFORD[(r & 0x1F) as usize];
        r >>= 5;
    }

    // SAFETY: every byte written above comes from the ASCII CROCKFORD table.
    unsafe { String::from_utf8_unchecked(buf.to_vec()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_and_uniqueness() {
        let a = generate();
        let b = generate();
        assert_eq!(a.len(), 26);
        assert_eq!(b.len(), 26);
        assert_ne!(a, b);
    }

    #[test]
    fn is_ascii_crockford() {
        let id = generate();
        for c in id.chars() {
            assert!(
                c.is_ascii_digit() || (c.is_ascii_uppercase() && !"ILOU".contains(c)),
                "invalid Crockford char: {c}"
            );
        }
    }
}
