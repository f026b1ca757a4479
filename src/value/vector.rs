//! Fixed-dimension vector of 32-bit floats used for similarity search.

use crate::error::Error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// A vector embedding as stored by the Data API.
///
/// The dimension is fixed at construction; equality is component-wise. The
/// wire form is either a plain JSON array of numbers or the packed
/// `{"$binary": <base64>}` form holding big-endian IEEE-754 floats.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataApiVector {
    components: Vec<f32>,
}

impl DataApiVector {
    /// Builds a vector from its components.
    #[must_use]
    pub fn new(components: Vec<f32>) -> Self {
        Self { components }
    }

    /// Decodes a vector from base64-encoded big-endian `f32` bytes.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the input is not valid base64 or its
    /// length is not a multiple of 4.
    pub fn from_base64(b64: &str) -> Result<Self, Error> {
        let bytes = BASE64
            .decode(b64)
            .map_err(|e| Error::serialization(format!("invalid base64 vector: {e}"), &[]))?;
        Self::from_be_bytes(&bytes)
    }

    /// Decodes a vector from big-endian `f32` bytes.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the length is not a multiple of 4.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() % 4 != 0 {
            return Err(Error::serialization(
                format!("vector byte length {} is not a multiple of 4", bytes.len()),
                &[],
            ));
        }
        let components = bytes
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { components })
    }

    /// Number of components.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.components.len()
    }

    /// Borrow the raw components.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.components
    }

    /// Encodes the components as base64 of big-endian `f32` bytes, the packed
    /// wire form.
    #[must_use]
    pub fn to_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(self.components.len() * 4);
        for c in &self.components {
            bytes.extend_from_slice(&c.to_be_bytes());
        }
        BASE64.encode(bytes)
    }

    /// Consumes the vector, returning its components.
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.components
    }
}

impl From<Vec<f32>> for DataApiVector {
    fn from(components: Vec<f32>) -> Self {
        Self::new(components)
    }
}

impl From<&[f32]> for DataApiVector {
    fn from(components: &[f32]) -> Self {
        Self::new(components.to_vec())
    }
}
