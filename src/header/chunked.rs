use std::io::Read;

use crate::config::{CHUNKED_FIXED_SIZE, FLAG_HINT_UTF16, MAGIC_FILE, MAGIC_SIZE, MAGIC_VIDEO, MAX_CHUNK_SIZE, MAX_FILENAME_LENGTH, NONCE_SIZE, SALT_SIZE, TAG_SIZE};
use crate::container::ContainerError;
use crate::header::hint::RawHint;
use crate::types::Variant;

/// Header of a chunked container (video or generic-file variant).
///
/// Keeps the exact serialized bytes alongside the parsed fields. Those bytes
/// are the additional authenticated data of every chunk.
#[derive(Debug, Clone)]
pub struct ChunkedHeader {
    variant: Variant,
    flags: u8,
    salt: [u8; SALT_SIZE],
    base_nonce: [u8; NONCE_SIZE],
    original_length: u64,
    chunk_size: u32,
    chunk_count: u32,
    original_name: Option<String>,
    hint: RawHint,
    encoded: Vec<u8>,
}

/// Fields chosen by the writer for a new chunked header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderParams<'a> {
    pub variant: Variant,
    pub salt: [u8; SALT_SIZE],
    pub base_nonce: [u8; NONCE_SIZE],
    pub original_length: u64,
    pub chunk_size: u32,
    pub original_name: Option<&'a str>,
    pub hint: Option<&'a str>,
}

impl ChunkedHeader {
    /// Builds and serializes a header for a new container.
    ///
    /// The hint is always stored as UTF-16LE. The original name is kept only
    /// for the generic-file variant.
    ///
    /// # Errors
    /// [`ContainerError::InvalidParameter`] for the legacy variant, a chunk
    /// size outside `1..=64 MiB`, a length needing more than `i32::MAX`
    /// chunks, or a name longer than 255 UTF-16 units.
    pub fn new(params: HeaderParams<'_>) -> Result<Self, ContainerError> {
        let magic = magic_of(params.variant).ok_or_else(|| ContainerError::InvalidParameter("legacy containers cannot be written".into()))?;

        if params.chunk_size == 0 || params.chunk_size > MAX_CHUNK_SIZE {
            return Err(ContainerError::InvalidParameter(format!("chunk size {} outside 1..={MAX_CHUNK_SIZE}", params.chunk_size)));
        }

        if i64::try_from(params.original_length).is_err() {
            return Err(ContainerError::InvalidParameter(format!("input of {} bytes is too large", params.original_length)));
        }

        let chunk_count = chunk_count_for(params.original_length, params.chunk_size)
            .filter(|&count| i32::try_from(count).is_ok())
            .ok_or_else(|| ContainerError::InvalidParameter(format!("input of {} bytes needs too many chunks of {}", params.original_length, params.chunk_size)))?;

        let original_name = match params.variant {
            Variant::File => {
                let name = params.original_name.unwrap_or_default();
                let units = name.encode_utf16().count();
                if units > MAX_FILENAME_LENGTH {
                    return Err(ContainerError::InvalidParameter(format!("file name of {units} UTF-16 units exceeds {MAX_FILENAME_LENGTH}")));
                }
                Some(name.to_owned())
            }
            Variant::Video | Variant::Legacy => None,
        };

        let mut header = Self {
            variant: params.variant,
            flags: FLAG_HINT_UTF16,
            salt: params.salt,
            base_nonce: params.base_nonce,
            original_length: params.original_length,
            chunk_size: params.chunk_size,
            chunk_count,
            original_name,
            hint: RawHint::encode(params.hint.unwrap_or_default()),
            encoded: Vec::new(),
        };

        header.encoded = header.serialize(magic);
        Ok(header)
    }

    /// Parses the fields following an already-consumed magic.
    pub(crate) fn parse(variant: Variant, magic: [u8; MAGIC_SIZE], reader: &mut dyn Read) -> Result<Self, ContainerError> {
        let mut fixed = [0u8; CHUNKED_FIXED_SIZE - MAGIC_SIZE];
        reader.read_exact(&mut fixed).map_err(ContainerError::truncated("header"))?;

        let mut encoded = Vec::with_capacity(CHUNKED_FIXED_SIZE + 64);
        encoded.extend_from_slice(&magic);
        encoded.extend_from_slice(&fixed);

        let mut fields = Fields::new(&fixed);
        let flags = fields.array::<1>()[0];
        let salt = fields.array::<SALT_SIZE>();
        let base_nonce = fields.array::<NONCE_SIZE>();
        let original_length = i64::from_le_bytes(fields.array());
        let chunk_size = i32::from_le_bytes(fields.array());
        let chunk_count = i32::from_le_bytes(fields.array());

        let original_length = u64::try_from(original_length).map_err(|_| ContainerError::Malformed(format!("negative original length {original_length}")))?;

        let chunk_size = u32::try_from(chunk_size).ok().filter(|&size| size > 0).ok_or_else(|| ContainerError::Malformed(format!("chunk size {chunk_size} is not positive")))?;
        if chunk_size > MAX_CHUNK_SIZE {
            return Err(ContainerError::Malformed(format!("chunk size {chunk_size} exceeds {MAX_CHUNK_SIZE}")));
        }

        let chunk_count = u32::try_from(chunk_count).map_err(|_| ContainerError::Malformed(format!("negative chunk count {chunk_count}")))?;
        let expected = chunk_count_for(original_length, chunk_size);
        if expected != Some(chunk_count) {
            return Err(ContainerError::Malformed(format!("chunk count {chunk_count} does not match {original_length} bytes in chunks of {chunk_size}")));
        }

        let original_name = if variant.stores_name() { Some(read_name(reader, &mut encoded)?) } else { None };

        let hint = RawHint::read_from(reader, flags & FLAG_HINT_UTF16 != 0)?;
        hint.write_to(&mut encoded);

        Ok(Self { variant, flags, salt, base_nonce, original_length, chunk_size, chunk_count, original_name, hint, encoded })
    }

    fn serialize(&self, magic: [u8; MAGIC_SIZE]) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHUNKED_FIXED_SIZE + 64);
        out.extend_from_slice(&magic);
        out.push(self.flags);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.base_nonce);
        out.extend_from_slice(&self.original_length.to_le_bytes());
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        out.extend_from_slice(&self.chunk_count.to_le_bytes());

        if let Some(name) = &self.original_name {
            let units: Vec<u16> = name.encode_utf16().collect();
            out.extend_from_slice(&u16::try_from(units.len()).unwrap_or(u16::MAX).to_le_bytes());
            out.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
        }

        self.hint.write_to(&mut out);
        out
    }

    #[inline]
    pub fn variant(&self) -> Variant {
        self.variant
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
    pub fn base_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.base_nonce
    }

    #[inline]
    pub fn original_length(&self) -> u64 {
        self.original_length
    }

    #[inline]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    #[inline]
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    #[inline]
    pub fn hint(&self) -> &RawHint {
        &self.hint
    }

    /// Serialized header bytes, magic through hint.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// Size of the tag table following the header.
    #[inline]
    pub fn tag_table_len(&self) -> u64 {
        u64::from(self.chunk_count) * TAG_SIZE as u64
    }

    /// Plaintext length of chunk `index`; the last chunk may be short.
    pub fn chunk_len(&self, index: u32) -> usize {
        let start = u64::from(index) * u64::from(self.chunk_size);
        let len = self.original_length.saturating_sub(start).min(u64::from(self.chunk_size));
        usize::try_from(len).unwrap_or(0)
    }
}

/// `ceil(length / chunk_size)` as a `u32`, or `None` if it does not fit.
pub(crate) fn chunk_count_for(length: u64, chunk_size: u32) -> Option<u32> {
    u32::try_from(length.div_ceil(u64::from(chunk_size))).ok()
}

fn magic_of(variant: Variant) -> Option<[u8; MAGIC_SIZE]> {
    match variant {
        Variant::Video => Some(MAGIC_VIDEO),
        Variant::File => Some(MAGIC_FILE),
        Variant::Legacy => None,
    }
}

fn read_name(reader: &mut dyn Read, encoded: &mut Vec<u8>) -> Result<String, ContainerError> {
    let mut count = [0u8; 2];
    reader.read_exact(&mut count).map_err(ContainerError::truncated("name length"))?;
    let units = usize::from(u16::from_le_bytes(count));

    if units > MAX_FILENAME_LENGTH {
        return Err(ContainerError::Malformed(format!("file name of {units} UTF-16 units exceeds {MAX_FILENAME_LENGTH}")));
    }

    let mut bytes = vec![0u8; units * 2];
    reader.read_exact(&mut bytes).map_err(ContainerError::truncated("file name"))?;

    encoded.extend_from_slice(&count);
    encoded.extend_from_slice(&bytes);

    let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
    Ok(String::from_utf16_lossy(&units))
}

/// Sequential cursor over a fixed-size field block.
pub(crate) struct Fields<'a> {
    bytes: &'a [u8],
}

impl<'a> Fields<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Takes the next `N` bytes. Callers size the block so it never runs out.
    pub(crate) fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let take = N.min(self.bytes.len());
        out[..take].copy_from_slice(&self.bytes[..take]);
        self.bytes = &self.bytes[take..];
        out
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn params(variant: Variant, original_length: u64) -> HeaderParams<'static> {
        HeaderParams {
            variant,
            salt: [1u8; SALT_SIZE],
            base_nonce: [2u8; NONCE_SIZE],
            original_length,
            chunk_size: 1024,
            original_name: Some("report.pdf"),
            hint: Some("first pet"),
        }
    }

    fn reparse(header: &ChunkedHeader) -> Result<ChunkedHeader, ContainerError> {
        let bytes = header.as_bytes();
        let mut magic = [0u8; MAGIC_SIZE];
        magic.copy_from_slice(&bytes[..MAGIC_SIZE]);
        ChunkedHeader::parse(header.variant(), magic, &mut Cursor::new(&bytes[MAGIC_SIZE..]))
    }

    #[test]
    fn test_file_variant_layout() {
        let header = ChunkedHeader::new(params(Variant::File, 2500)).unwrap();
        let bytes = header.as_bytes();

        assert_eq!(&bytes[..4], b"LBF2");
        assert_eq!(bytes[4], FLAG_HINT_UTF16);
        assert_eq!(&bytes[33..41], &2500i64.to_le_bytes());
        assert_eq!(&bytes[41..45], &1024i32.to_le_bytes());
        assert_eq!(&bytes[45..49], &3i32.to_le_bytes());
        assert_eq!(&bytes[49..51], &10u16.to_le_bytes());
        assert_eq!(bytes.len(), CHUNKED_FIXED_SIZE + 2 + 20 + 2 + 18);

        let parsed = reparse(&header).unwrap();
        assert_eq!(parsed.original_name(), Some("report.pdf"));
        assert_eq!(parsed.hint().decode(), "first pet");
        assert_eq!(parsed.chunk_count(), 3);
        assert_eq!(parsed.as_bytes(), header.as_bytes());
    }

    #[test]
    fn test_video_variant_drops_name() {
        let header = ChunkedHeader::new(params(Variant::Video, 0)).unwrap();
        assert_eq!(&header.as_bytes()[..4], b"LBV2");
        assert_eq!(header.original_name(), None);
        assert_eq!(header.chunk_count(), 0);
        assert_eq!(reparse(&header).unwrap().as_bytes(), header.as_bytes());
    }

    #[test]
    fn test_chunk_len() {
        let header = ChunkedHeader::new(params(Variant::Video, 2500)).unwrap();
        assert_eq!(header.chunk_len(0), 1024);
        assert_eq!(header.chunk_len(1), 1024);
        assert_eq!(header.chunk_len(2), 452);
        assert_eq!(header.tag_table_len(), 48);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let mut bad = params(Variant::File, 10);
        bad.chunk_size = 0;
        assert!(matches!(ChunkedHeader::new(bad), Err(ContainerError::InvalidParameter(_))));

        assert!(matches!(ChunkedHeader::new(params(Variant::Legacy, 10)), Err(ContainerError::InvalidParameter(_))));

        let long_name = "n".repeat(256);
        let mut bad = params(Variant::File, 10);
        bad.original_name = Some(&long_name);
        assert!(matches!(ChunkedHeader::new(bad), Err(ContainerError::InvalidParameter(_))));
    }

    #[test]
    fn test_parse_rejects_chunk_count_mismatch() {
        let header = ChunkedHeader::new(params(Variant::Video, 2500)).unwrap();
        let mut bytes = header.as_bytes().to_vec();
        bytes[45..49].copy_from_slice(&4i32.to_le_bytes());

        let result = ChunkedHeader::parse(Variant::Video, MAGIC_VIDEO, &mut Cursor::new(&bytes[MAGIC_SIZE..]));
        assert!(matches!(result, Err(ContainerError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_non_positive_chunk_size() {
        let header = ChunkedHeader::new(params(Variant::Video, 0)).unwrap();
        for size in [0i32, -1] {
            let mut bytes = header.as_bytes().to_vec();
            bytes[41..45].copy_from_slice(&size.to_le_bytes());
            let result = ChunkedHeader::parse(Variant::Video, MAGIC_VIDEO, &mut Cursor::new(&bytes[MAGIC_SIZE..]));
            assert!(matches!(result, Err(ContainerError::Malformed(_))));
        }
    }

    #[test]
    fn test_parse_rejects_truncated_header() {
        let header = ChunkedHeader::new(params(Variant::File, 10)).unwrap();
        let bytes = &header.as_bytes()[MAGIC_SIZE..30];
        let result = ChunkedHeader::parse(Variant::File, MAGIC_FILE, &mut Cursor::new(bytes));
        assert!(matches!(result, Err(ContainerError::Malformed(_))));
    }

    #[test]
    fn test_fields_cursor() {
        let mut fields = Fields::new(&[1, 2, 3, 4, 5]);
        assert_eq!(fields.array::<2>(), [1, 2]);
        assert_eq!(fields.array::<3>(), [3, 4, 5]);
    }
}
