//! Opaque binary payloads (`{"$binary": <base64>}` on the wire).

use crate::error::Error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// An opaque byte sequence stored in a collection or table column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataApiBlob {
    bytes: Vec<u8>,
}

impl DataApiBlob {
    /// Builds a blob from raw bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decodes a blob from its base64 wire form.
    ///
    /// # Errors
    ///
    /// Returns a serialization error on invalid base64.
    pub fn from_base64(b64: &str) -> Result<Self, Error> {
        let bytes = BASE64
            .decode(b64)
            .map_err(|e| Error::serialization(format!("invalid base64 blob: {e}"), &[]))?;
        Ok(Self { bytes })
    }

    /// The base64 wire encoding.
    #[must_use]
    pub fn as_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the blob holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the blob, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for DataApiBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for DataApiBlob {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_round_trip() {
        let blob = DataApiBlob::new(vec![0, 1, 2, 255]);
        let back = DataApiBlob::from_base64(&blob.as_base64()).unwrap();
        assert_eq!(blob, back);
        assert_eq!(back.as_bytes(), &[0, 1, 2, 255]);
    }

    #[test]
    fn test_empty() {
        let blob = DataApiBlob::default();
        assert!(blob.is_empty());
        assert_eq!(blob.len(), 0);
        assert_eq!(blob.as_base64(), "");
    }

    #[test]
    fn test_invalid_base64() {
        assert!(DataApiBlob::from_base64("%%%").is_err());
    }
}
