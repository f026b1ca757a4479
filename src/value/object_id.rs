//! 12-byte timestamped object identifiers (`{"$objectId": <hex>}` on the wire).

use crate::error::Error;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Process-wide counter seeding the trailing 3 bytes of generated ids.
static COUNTER: AtomicU32 = AtomicU32::new(0);

/// A 12-byte identifier: 4-byte big-endian epoch seconds, 5 random bytes,
/// 3-byte incrementing counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    bytes: [u8; 12],
}

impl ObjectId {
    /// Generates a fresh id stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self::from_timestamp(Utc::now().timestamp().max(0) as u32)
    }

    /// Generates an id with an explicit epoch-seconds timestamp.
    #[must_use]
    pub fn from_timestamp(epoch_secs: u32) -> Self {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&epoch_secs.to_be_bytes());
        for b in &mut bytes[4..9] {
            *b = fastrand::u8(..);
        }
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self { bytes }
    }

    /// Wraps raw bytes without generation.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self { bytes }
    }

    /// The raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.bytes
    }

    /// The creation instant embedded in the leading 4 bytes.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]]);
        DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
    }

    /// The 24-character lowercase hex form used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(24);
        for b in self.bytes {
            use fmt::Write as _;
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::serialization(
                format!("invalid ObjectId '{s}': expected 24 hex characters"),
                &[],
            ));
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = char::from(chunk[0]).to_digit(16).unwrap_or(0) as u8;
            let lo = char::from(chunk[1]).to_digit(16).unwrap_or(0) as u8;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self { bytes })
    }
}
