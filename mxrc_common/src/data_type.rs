//! `DataType`: the tagged-union discriminator stored alongside every
//! Data Store entry.

/// Fixed-length byte buffer size for the `STRING32` variant, including
/// the terminating NUL.
pub const STRING32_LEN: usize = 32;

/// Discriminator for the value currently held by a Data Store entry.
///
/// `None` means the entry has never been written. `String32` values are
/// always NUL-terminated and truncated to `STRING32_LEN - 1` bytes of
/// payload on write.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Entry has never been written.
    None = 0,
    /// Signed 32-bit integer.
    Int32 = 1,
    /// 32-bit IEEE-754 float.
    Float = 2,
    /// 64-bit IEEE-754 float.
    Double = 3,
    /// Unsigned 64-bit integer.
    Uint64 = 4,
    /// Fixed 32-byte NUL-terminated string buffer.
    String32 = 5,
}

impl DataType {
    /// Recover a `DataType` from its wire discriminant.
    ///
    /// Returns `None` (the Option, not the variant) for any value outside
    /// the known range — callers treat this the same as a corrupted entry.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Int32),
            2 => Some(Self::Float),
            3 => Some(Self::Double),
            4 => Some(Self::Uint64),
            5 => Some(Self::String32),
            _ => None,
        }
    }

    /// Byte width of this variant's payload within the uniform-stride
    /// value union (0 for `None`).
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Int32 => 4,
            Self::Float => 4,
            Self::Double => 8,
            Self::Uint64 => 8,
            Self::String32 => STRING32_LEN,
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_discriminant() {
        for raw in 0u8..=5 {
            assert_eq!(DataType::from_u8(raw).unwrap() as u8, raw);
        }
    }

    #[test]
    fn unknown_discriminant_is_none_option() {
        assert!(DataType::from_u8(6).is_none());
        assert!(DataType::from_u8(255).is_none());
    }

    #[test]
    fn payload_len_matches_uniform_stride_candidates() {
        assert_eq!(DataType::None.payload_len(), 0);
        assert_eq!(DataType::Int32.payload_len(), 4);
        assert_eq!(DataType::Float.payload_len(), 4);
        assert_eq!(DataType::Double.payload_len(), 8);
        assert_eq!(DataType::Uint64.payload_len(), 8);
        assert_eq!(DataType::String32.payload_len(), STRING32_LEN);
    }

    #[test]
    fn default_is_none() {
        assert_eq!(DataType::default(), DataType::None);
    }
}
