//! Fixed-length bit fingerprints.

use std::fmt;

use super::{HashAlgorithm, HashError};

/// An immutable N²-bit fingerprint produced by one [`HashAlgorithm`].
///
/// Bits are stored row-major, packed MSB-first. Any padding bits in the
/// final byte are always zero, so byte-wise XOR gives the exact Hamming
/// distance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    algorithm: HashAlgorithm,
    hash_size: u32,
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Pack a sequence of bits into a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::BitCount`] if `bits` does not yield exactly
    /// `hash_size²` bits.
    pub fn from_bits(
        algorithm: HashAlgorithm,
        hash_size: u32,
        bits: impl IntoIterator<Item = bool>,
    ) -> Result<Self, HashError> {
        let expected = bit_len(hash_size);
        let mut bytes = vec![0u8; expected.div_ceil(8)];
        let mut count = 0usize;
        for bit in bits {
            if count < expected && bit {
                bytes[count / 8] |= 0x80 >> (count % 8);
            }
            count += 1;
        }
        if count != expected {
            return Err(HashError::BitCount {
                expected,
                actual: count,
            });
        }
        Ok(Self {
            algorithm,
            hash_size,
            bytes,
        })
    }

    /// Rebuild a fingerprint from its packed bytes, e.g. when read from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::BitCount`] if the byte length does not match
    /// `hash_size`, or if any padding bit is set.
    pub fn from_bytes(
        algorithm: HashAlgorithm,
        hash_size: u32,
        bytes: Vec<u8>,
    ) -> Result<Self, HashError> {
        let expected = bit_len(hash_size);
        if bytes.len() != expected.div_ceil(8) {
            return Err(HashError::BitCount {
                expected,
                actual: bytes.len() * 8,
            });
        }
        let padding = bytes.len() * 8 - expected;
        if padding > 0 {
            let mask = (1u8 << padding) - 1;
            if bytes[bytes.len() - 1] & mask != 0 {
                return Err(HashError::BitCount {
                    expected,
                    actual: bytes.len() * 8,
                });
            }
        }
        Ok(Self {
            algorithm,
            hash_size,
            bytes,
        })
    }

    /// Parse the lowercase/uppercase hex form produced by [`Fingerprint::to_hex`].
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidHex`] for malformed input.
    pub fn from_hex(algorithm: HashAlgorithm, hash_size: u32, hex: &str) -> Result<Self, HashError> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 {
            return Err(HashError::InvalidHex(hex.to_string()));
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| HashError::InvalidHex(hex.to_string()))?;
        Self::from_bytes(algorithm, hash_size, bytes)
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// Number of bits, always `hash_size²`.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        bit_len(self.hash_size)
    }

    /// Packed bytes, MSB-first.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bit at `index` (row-major).
    #[must_use]
    pub fn bit(&self, index: usize) -> bool {
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Iterate over all `hash_size²` bits.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_len()).map(move |i| self.bit(i))
    }

    /// Whether `other` was produced by the same algorithm at the same size.
    #[must_use]
    pub fn is_comparable(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.hash_size == other.hash_size
    }

    /// Lowercase hex of the packed bytes.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn bit_len(hash_size: u32) -> usize {
    (hash_size as usize) * (hash_size as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bits_packs_msb_first() {
        let bits = [true, false, false, false, false, false, false, true, true];
        let fp = Fingerprint::from_bits(HashAlgorithm::Average, 3, bits).unwrap();
        assert_eq!(fp.as_bytes(), &[0x81, 0x80]);
        assert_eq!(fp.bit_len(), 9);
        assert_eq!(fp.bits().collect::<Vec<_>>(), bits.to_vec());
    }

    #[test]
    fn test_from_bits_wrong_count() {
        let err = Fingerprint::from_bits(HashAlgorithm::Average, 4, vec![true; 15]).unwrap_err();
        assert!(matches!(
            err,
            HashError::BitCount {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn test_from_bytes_rejects_padding_bits() {
        // 9 bits -> 2 bytes; the low 7 bits of the last byte are padding
        assert!(Fingerprint::from_bytes(HashAlgorithm::Difference, 3, vec![0, 0x01]).is_err());
        assert!(Fingerprint::from_bytes(HashAlgorithm::Difference, 3, vec![0, 0x80]).is_ok());
        assert!(Fingerprint::from_bytes(HashAlgorithm::Difference, 3, vec![0]).is_err());
    }

    #[test]
    fn test_hex_form() {
        let fp = Fingerprint::from_hex(HashAlgorithm::Perceptual, 4, "f00f").unwrap();
        assert_eq!(fp.to_hex(), "f00f");
        assert_eq!(fp.to_string(), "f00f");
        assert!(Fingerprint::from_hex(HashAlgorithm::Perceptual, 4, "f0z0").is_err());
        assert!(Fingerprint::from_hex(HashAlgorithm::Perceptual, 4, "f0f").is_err());
    }

    #[test]
    fn test_is_comparable() {
        let a = Fingerprint::from_hex(HashAlgorithm::Perceptual, 4, "ffff").unwrap();
        let b = Fingerprint::from_hex(HashAlgorithm::Average, 4, "ffff").unwrap();
        let c = Fingerprint::from_hex(HashAlgorithm::Perceptual, 2, "f0").unwrap();
        assert!(a.is_comparable(&a.clone()));
        assert!(!a.is_comparable(&b));
        assert!(!a.is_comparable(&c));
    }
}
