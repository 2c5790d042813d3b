//! Container header parsing and serialization.
//!
//! All integers are little-endian. A chunked header is laid out as:
//!
//! ```text
//! +0   magic           4    LBV2 (video) or LBF2 (generic file)
//! +4   flags           1    bit 0: hint stored as UTF-16LE
//! +5   salt            16
//! +21  base nonce      12
//! +33  original length 8    signed
//! +41  chunk size      4    signed, > 0
//! +45  chunk count     4    signed, ceil(length / chunk size)
//! +49  name            2+2n generic-file variant only, UTF-16LE units
//!      hint            2+N  N = 2 * count (UTF-16) or count (legacy UTF-8)
//!      tag table       16 * chunk count
//!      ciphertext      original length
//! ```
//!
//! The legacy single-block layout (`LBX1`) is magic, flags, salt, a 12-byte
//! nonce, an 8-byte length, the ciphertext and one trailing 16-byte tag.
//!
//! Headers are dispatched on their magic through [`registry::FORMATS`].

use std::io::Read;

use crate::config::{MAGIC_SIZE, SALT_SIZE, TAG_SIZE};
use crate::container::ContainerError;
use crate::types::Variant;

mod chunked;
mod hint;
mod legacy;
pub mod registry;

pub use chunked::{ChunkedHeader, HeaderParams};
pub use hint::RawHint;
pub use legacy::LegacyHeader;

/// A parsed container header of any known layout.
#[derive(Debug, Clone)]
pub enum Header {
    Legacy(LegacyHeader),
    Chunked(ChunkedHeader),
}

impl Header {
    /// Reads the magic and dispatches to the matching parser.
    ///
    /// The hint bytes are read but not decoded.
    ///
    /// # Errors
    /// [`ContainerError::Malformed`] for an unknown magic, a truncated header,
    /// or fields that violate the layout's limits.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ContainerError> {
        let mut magic = [0u8; MAGIC_SIZE];
        reader.read_exact(&mut magic).map_err(ContainerError::truncated("magic"))?;

        let entry = registry::lookup(&magic).ok_or_else(|| ContainerError::Malformed(format!("unknown magic {}", hex::encode(magic))))?;
        (entry.parse)(reader)
    }

    pub fn variant(&self) -> Variant {
        match self {
            Self::Legacy(_) => Variant::Legacy,
            Self::Chunked(header) => header.variant(),
        }
    }

    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        match self {
            Self::Legacy(header) => header.salt(),
            Self::Chunked(header) => header.salt(),
        }
    }

    pub fn original_length(&self) -> u64 {
        match self {
            Self::Legacy(header) => header.original_length(),
            Self::Chunked(header) => header.original_length(),
        }
    }

    pub fn original_name(&self) -> Option<&str> {
        match self {
            Self::Legacy(_) => None,
            Self::Chunked(header) => header.original_name().filter(|name| !name.is_empty()),
        }
    }

    /// Hint exactly as stored. Empty for legacy containers.
    pub fn raw_hint(&self) -> Option<&RawHint> {
        match self {
            Self::Legacy(_) => None,
            Self::Chunked(header) => Some(header.hint()).filter(|hint| !hint.is_empty()),
        }
    }

    /// Decoded hint, if one was stored.
    pub fn hint(&self) -> Option<String> {
        self.raw_hint().map(RawHint::decode)
    }

    /// Serialized size of the header itself.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Legacy(header) => header.to_bytes().len(),
            Self::Chunked(header) => header.as_bytes().len(),
        }
    }

    /// Bytes that must follow the header: tags plus ciphertext.
    pub fn body_len(&self) -> Option<u64> {
        match self {
            Self::Legacy(header) => header.original_length().checked_add(TAG_SIZE as u64),
            Self::Chunked(header) => header.tag_table_len().checked_add(header.original_length()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config::NONCE_SIZE;

    #[test]
    fn test_dispatch_by_magic() {
        let header = ChunkedHeader::new(HeaderParams {
            variant: Variant::File,
            salt: [0u8; SALT_SIZE],
            base_nonce: [0u8; NONCE_SIZE],
            original_length: 5,
            chunk_size: 4,
            original_name: Some("a.txt"),
            hint: None,
        })
        .unwrap();

        let parsed = Header::read_from(&mut Cursor::new(header.as_bytes())).unwrap();
        assert_eq!(parsed.variant(), Variant::File);
        assert_eq!(parsed.original_name(), Some("a.txt"));
        assert_eq!(parsed.hint(), None);
        assert_eq!(parsed.body_len(), Some(2 * 16 + 5));
        assert_eq!(parsed.encoded_len(), header.as_bytes().len());
    }

    #[test]
    fn test_unknown_magic() {
        let result = Header::read_from(&mut Cursor::new(b"PK\x03\x04rest of a zip".to_vec()));
        assert!(matches!(result, Err(ContainerError::Malformed(reason)) if reason.contains("504b0304")));
    }

    #[test]
    fn test_empty_input() {
        let result = Header::read_from(&mut Cursor::new(Vec::new()));
        assert!(matches!(result, Err(ContainerError::Malformed(_))));
    }
}
