use std::io::Read;

use crate::config::{LEGACY_HEADER_SIZE, MAGIC_LEGACY, MAGIC_SIZE, MAX_LEGACY_LENGTH, NONCE_SIZE, SALT_SIZE};
use crate::container::ContainerError;
use crate::header::chunked::Fields;

/// Header of a legacy single-block container.
///
/// The whole payload sits under one nonce followed by one trailing tag. There
/// is no hint, no name, and no associated data.
#[derive(Debug, Clone)]
pub struct LegacyHeader {
    flags: u8,
    salt: [u8; SALT_SIZE],
    nonce: [u8; NONCE_SIZE],
    original_length: u64,
}

impl LegacyHeader {
    pub(crate) fn parse(reader: &mut dyn Read) -> Result<Self, ContainerError> {
        let mut fixed = [0u8; LEGACY_HEADER_SIZE - MAGIC_SIZE];
        reader.read_exact(&mut fixed).map_err(ContainerError::truncated("legacy header"))?;

        let mut fields = Fields::new(&fixed);
        let flags = fields.array::<1>()[0];
        let salt = fields.array::<SALT_SIZE>();
        let nonce = fields.array::<NONCE_SIZE>();
        let original_length = i64::from_le_bytes(fields.array());

        let original_length = u64::try_from(original_length)
            .ok()
            .filter(|&len| len <= MAX_LEGACY_LENGTH)
            .ok_or_else(|| ContainerError::Malformed(format!("legacy length {original_length} outside 0..={MAX_LEGACY_LENGTH}")))?;

        Ok(Self { flags, salt, nonce, original_length })
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    #[inline]
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    #[inline]
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    #[inline]
    pub fn original_length(&self) -> u64 {
        self.original_length
    }

    /// Serialized header bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LEGACY_HEADER_SIZE);
        out.extend_from_slice(&MAGIC_LEGACY);
        out.push(self.flags);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.original_length.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn fixed(length: i64) -> Vec<u8> {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&[5u8; SALT_SIZE]);
        bytes.extend_from_slice(&[6u8; NONCE_SIZE]);
        bytes.extend_from_slice(&length.to_le_bytes());
        bytes
    }

    #[test]
    fn test_parse() {
        let header = LegacyHeader::parse(&mut Cursor::new(fixed(42))).unwrap();
        assert_eq!(header.original_length(), 42);
        assert_eq!(header.salt(), &[5u8; SALT_SIZE]);
        assert_eq!(header.nonce(), &[6u8; NONCE_SIZE]);
        assert_eq!(header.to_bytes().len(), LEGACY_HEADER_SIZE);
    }

    #[test]
    fn test_rejects_out_of_range_length() {
        assert!(matches!(LegacyHeader::parse(&mut Cursor::new(fixed(-1))), Err(ContainerError::Malformed(_))));
        assert!(matches!(LegacyHeader::parse(&mut Cursor::new(fixed(i64::from(i32::MAX) + 1))), Err(ContainerError::Malformed(_))));
    }

    #[test]
    fn test_rejects_truncation() {
        let bytes = fixed(42);
        assert!(matches!(LegacyHeader::parse(&mut Cursor::new(&bytes[..20])), Err(ContainerError::Malformed(_))));
    }
}
