//! Password hint codec.
//!
//! The hint is a user-chosen memory aid stored in the clear inside the
//! header. Anyone holding the container can read it without the password, and
//! nothing stops a user from writing the password itself into it.
//!
//! Current containers store the hint as UTF-16LE with a code unit count and
//! set [`FLAG_HINT_UTF16`](crate::config::FLAG_HINT_UTF16). Older writers
//! stored UTF-8 with a byte count; that form is still decoded, including
//! hints whose stored bytes were cut in the middle of a character.

use std::io::Read;

use crate::config::MAX_HINT_BYTES;
use crate::container::ContainerError;

const MAX_HINT_UNITS: usize = MAX_HINT_BYTES / 2;

/// Hint bytes exactly as stored, not yet decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHint {
    count: u16,
    bytes: Vec<u8>,
    utf16: bool,
}

impl RawHint {
    /// Encodes `text` as UTF-16LE, truncated to at most 200 bytes.
    ///
    /// A surrogate pair is never split by the cut.
    pub fn encode(text: &str) -> Self {
        let mut units: Vec<u16> = text.encode_utf16().take(MAX_HINT_UNITS).collect();

        if units.last().is_some_and(|unit| (0xD800..=0xDBFF).contains(unit)) {
            units.pop();
        }

        let bytes = units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
        Self { count: count_of(units.len()), bytes, utf16: true }
    }

    /// Encodes `text` the way older writers did: UTF-8 with a byte count,
    /// truncated to at most 200 bytes without splitting a character.
    pub fn encode_legacy(text: &str) -> Self {
        let cut = &text.as_bytes()[..text.len().min(MAX_HINT_BYTES)];
        let bytes = trim_incomplete(cut).to_vec();
        Self { count: count_of(bytes.len()), bytes, utf16: false }
    }

    /// Reads a hint field: a little-endian `u16` count followed by the bytes
    /// it describes.
    ///
    /// # Errors
    /// [`ContainerError::Malformed`] if the field is truncated or declares
    /// more than 200 bytes.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, utf16: bool) -> Result<Self, ContainerError> {
        let mut count = [0u8; 2];
        reader.read_exact(&mut count).map_err(ContainerError::truncated("hint length"))?;
        let count = u16::from_le_bytes(count);

        let len = if utf16 { usize::from(count) * 2 } else { usize::from(count) };
        if len > MAX_HINT_BYTES {
            return Err(ContainerError::Malformed(format!("hint of {len} bytes exceeds {MAX_HINT_BYTES}")));
        }

        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes).map_err(ContainerError::truncated("hint"))?;

        Ok(Self { count, bytes, utf16 })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.bytes);
    }

    /// Decodes the stored bytes. Invalid sequences decode lossily.
    pub fn decode(&self) -> String {
        if self.utf16 {
            let units: Vec<u16> = self.bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
            String::from_utf16_lossy(&units)
        } else {
            String::from_utf8_lossy(trim_incomplete(&self.bytes)).into_owned()
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn is_utf16(&self) -> bool {
        self.utf16
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

fn count_of(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// Drops a trailing incomplete UTF-8 sequence: a lead byte without enough
/// continuation bytes, or continuation bytes with no lead.
fn trim_incomplete(bytes: &[u8]) -> &[u8] {
    let run = bytes.iter().rev().take_while(|&&byte| byte & 0xC0 == 0x80).count();
    let lead_pos = bytes.len() - run;

    if run > 3 || lead_pos == 0 {
        return &bytes[..lead_pos];
    }

    let needed = match bytes[lead_pos - 1] {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    };

    match needed.cmp(&(run + 1)) {
        std::cmp::Ordering::Equal => bytes,
        std::cmp::Ordering::Greater => &bytes[..lead_pos - 1],
        std::cmp::Ordering::Less => &bytes[..lead_pos],
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    fn read_back(hint: &RawHint) -> RawHint {
        let mut buf = Vec::new();
        hint.write_to(&mut buf);
        RawHint::read_from(&mut Cursor::new(buf), hint.is_utf16()).unwrap()
    }

    #[test]
    fn test_cjk_hint() {
        let hint = RawHint::encode("生日0101");
        assert_eq!(hint.count, 6);
        assert_eq!(hint.byte_len(), 12);
        assert_eq!(read_back(&hint).decode(), "生日0101");
    }

    #[test]
    fn test_utf16_truncation_keeps_surrogate_pairs() {
        let text = format!("{}{}", "a".repeat(99), "😀");
        let hint = RawHint::encode(&text);
        assert_eq!(hint.decode(), "a".repeat(99));
        assert_eq!(hint.byte_len(), 198);

        let fits = format!("{}{}", "a".repeat(98), "😀");
        assert_eq!(RawHint::encode(&fits).decode(), fits);
    }

    #[test]
    fn test_legacy_truncation_inside_multibyte_char() {
        let text = format!("{}{}", "a".repeat(199), "é");
        let hint = RawHint::encode_legacy(&text);
        assert_eq!(hint.byte_len(), 199);
        assert_eq!(hint.decode(), "a".repeat(199));

        let cjk = "日".repeat(70);
        let hint = RawHint::encode_legacy(&cjk);
        assert_eq!(hint.byte_len(), 198);
        assert_eq!(hint.decode(), "日".repeat(66));
    }

    #[test]
    fn test_legacy_decode_tolerates_cut_sequence() {
        let mut bytes = "key".as_bytes().to_vec();
        bytes.extend_from_slice(&"日".as_bytes()[..2]);
        let hint = RawHint { count: count_of(bytes.len()), bytes, utf16: false };
        assert_eq!(hint.decode(), "key");
    }

    #[test]
    fn test_trim_incomplete() {
        assert_eq!(trim_incomplete(b"abc"), b"abc");
        assert_eq!(trim_incomplete(&[b'a', 0xE6, 0x97]), b"a");
        assert_eq!(trim_incomplete(&[b'a', 0xF0]), b"a");
        assert_eq!(trim_incomplete(&[b'a', 0x80, 0x80]), b"a");
        assert_eq!(trim_incomplete(&[0x80]), b"");
        assert_eq!(trim_incomplete("é".as_bytes()), "é".as_bytes());
        assert_eq!(trim_incomplete(b""), b"");
    }

    #[test]
    fn test_oversized_field_rejected() {
        let mut buf = 101u16.to_le_bytes().to_vec();
        buf.extend(vec![0u8; 202]);
        assert!(matches!(RawHint::read_from(&mut Cursor::new(buf), true), Err(ContainerError::Malformed(_))));

        let mut buf = 201u16.to_le_bytes().to_vec();
        buf.extend(vec![b'a'; 201]);
        assert!(matches!(RawHint::read_from(&mut Cursor::new(buf), false), Err(ContainerError::Malformed(_))));
    }

    #[test]
    fn test_truncated_field_rejected() {
        let mut buf = 4u16.to_le_bytes().to_vec();
        buf.extend_from_slice(b"ab");
        assert!(matches!(RawHint::read_from(&mut Cursor::new(buf), false), Err(ContainerError::Malformed(_))));
    }

    #[test]
    fn test_empty_hint() {
        let hint = RawHint::encode("");
        assert!(hint.is_empty());
        assert_eq!(read_back(&hint).decode(), "");
    }

    proptest! {
        #[test]
        fn prop_encode_is_bounded_prefix(text in "\\PC{0,150}") {
            let decoded = RawHint::encode(&text).decode();
            prop_assert!(text.starts_with(&decoded));
            prop_assert!(decoded.encode_utf16().count() * 2 <= MAX_HINT_BYTES);
        }

        #[test]
        fn prop_encode_legacy_is_bounded_prefix(text in "\\PC{0,150}") {
            let hint = RawHint::encode_legacy(&text);
            prop_assert!(hint.byte_len() <= MAX_HINT_BYTES);
            prop_assert!(std::str::from_utf8(&hint.bytes).is_ok());
            prop_assert!(text.starts_with(&hint.decode()));
        }
    }
}
