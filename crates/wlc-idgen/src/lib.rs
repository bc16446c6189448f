//! Monotonic, sortable 26-character identifiers.
//!
//! Each id packs a 48-bit millisecond timestamp and 80 bits of randomness
//! into 16 bytes, then encodes those bytes as 26 characters of Crockford's
//! base32 alphabet. Two ids minted within the same millisecond are ordered
//! by incrementing the random tail of the previous id, so `Id` values are
//! totally ordered by mint time even at sub-millisecond resolution.

use std::fmt;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use rand::RngCore;
use serde::{Deserialize, Serialize};

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const ID_LEN: usize = 26;

/// A 26-character sortable identifier. The caller supplies a conceptual
/// prefix (e.g. `"ACC"`) separately — it is never embedded in the id
/// bytes, so `Id` values remain globally unique and comparable regardless
/// of which entity they name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id([u8; 16]);

impl Id {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Id(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_encoded(&self) -> String {
        encode_base32(&self.0)
    }

    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        decode_base32(s).map(Id)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_encoded())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_encoded())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("id must be exactly {ID_LEN} characters, got {0}")]
    WrongLength(usize),
    #[error("id contains a character outside the base32 alphabet: {0:?}")]
    InvalidChar(char),
}

fn encode_base32(bytes: &[u8; 16]) -> String {
    // 128 bits packed 5 at a time into 26 symbols (130 bits, top 2 bits zero).
    let mut bits: u128 = 0;
    for b in bytes {
        bits = (bits << 8) | *b as u128;
    }
    bits <<= 2; // pad to 130 bits
    let mut out = vec![0u8; ID_LEN];
    for i in (0..ID_LEN).rev() {
        let idx = (bits & 0x1f) as usize;
        out[i] = ALPHABET[idx];
        bits >>= 5;
    }
    String::from_utf8(out).expect("alphabet is ASCII")
}

fn decode_base32(s: &str) -> Result<[u8; 16], IdParseError> {
    if s.chars().count() != ID_LEN {
        return Err(IdParseError::WrongLength(s.chars().count()));
    }
    let mut bits: u128 = 0;
    for c in s.chars() {
        let upper = c.to_ascii_uppercase();
        let idx = ALPHABET
            .iter()
            .position(|&a| a == upper as u8)
            .ok_or(IdParseError::InvalidChar(c))?;
        bits = (bits << 5) | idx as u128;
    }
    bits >>= 2; // drop the 2 padding bits
    let mut out = [0u8; 16];
    for i in (0..16).rev() {
        out[i] = (bits & 0xff) as u8;
        bits >>= 8;
    }
    Ok(out)
}

struct GeneratorState {
    last_ms: u64,
    last_rand: u128, // 80 bits used
}

static STATE: Lazy<Mutex<GeneratorState>> = Lazy::new(|| {
    Mutex::new(GeneratorState {
        last_ms: 0,
        last_rand: 0,
    })
});

const MAX_RAND_80: u128 = (1u128 << 80) - 1;

/// Mints a new id using the given millisecond timestamp (injected by the
/// caller so generation stays deterministic and testable; production
/// callers pass `SystemTime::now()` converted to epoch millis).
pub fn generate(now_ms: u64) -> Id {
    let mut state = STATE.lock().expect("idgen mutex poisoned");
    let rand_part = if now_ms > state.last_ms {
        let mut buf = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut buf);
        let mut v: u128 = 0;
        for b in &buf[..10] {
            v = (v << 8) | *b as u128;
        }
        v & MAX_RAND_80
    } else {
        // Same millisecond (or a clock that moved backwards): increment the
        // previous random tail so ordering within the tick is preserved.
        state.last_rand.saturating_add(1) & MAX_RAND_80
    };

    let effective_ms = now_ms.max(state.last_ms);
    state.last_ms = effective_ms;
    state.last_rand = rand_part;

    let mut bytes = [0u8; 16];
    bytes[0] = ((effective_ms >> 40) & 0xff) as u8;
    bytes[1] = ((effective_ms >> 32) & 0xff) as u8;
    bytes[2] = ((effective_ms >> 24) & 0xff) as u8;
    bytes[3] = ((effective_ms >> 16) & 0xff) as u8;
    bytes[4] = ((effective_ms >> 8) & 0xff) as u8;
    bytes[5] = (effective_ms & 0xff) as u8;
    for i in 0..10 {
        let shift = 8 * (9 - i);
        bytes[6 + i] = ((rand_part >> shift) & 0xff) as u8;
    }
    Id(bytes)
}

/// Current epoch milliseconds. Kept as a thin wrapper so call sites don't
/// reach for `std::time::SystemTime` directly and so tests can avoid it.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encoding() {
        let id = generate(1_700_000_000_000);
        let encoded = id.to_encoded();
        assert_eq!(encoded.len(), ID_LEN);
        let parsed = Id::parse(&encoded).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Id::parse("TOOSHORT"),
            Err(IdParseError::WrongLength(_))
        ));
    }

    #[test]
    fn ids_in_same_millisecond_are_monotonic() {
        let a = generate(1_700_000_000_000);
        let b = generate(1_700_000_000_000);
        let c = generate(1_700_000_000_000);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn ids_across_milliseconds_sort_by_time() {
        let a = generate(1_700_000_000_000);
        let b = generate(1_700_000_000_001);
        assert!(a < b);
    }
}
