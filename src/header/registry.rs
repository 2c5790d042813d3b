use std::io::Read;

use crate::config::{MAGIC_FILE, MAGIC_LEGACY, MAGIC_SIZE, MAGIC_VIDEO};
use crate::container::ContainerError;
use crate::header::Header;
use crate::header::chunked::ChunkedHeader;
use crate::header::legacy::LegacyHeader;
use crate::types::Variant;

/// Parses the header fields that follow a recognized magic.
pub type ParseFn = fn(&mut dyn Read) -> Result<Header, ContainerError>;

/// One known on-disk layout.
pub struct FormatEntry {
    pub magic: [u8; MAGIC_SIZE],
    pub variant: Variant,
    pub parse: ParseFn,
}

/// Every layout this build can read.
///
/// A new layout is a new magic and a new row; existing parsers stay as they are.
pub static FORMATS: &[FormatEntry] = &[
    FormatEntry { magic: MAGIC_LEGACY, variant: Variant::Legacy, parse: parse_legacy },
    FormatEntry { magic: MAGIC_VIDEO, variant: Variant::Video, parse: parse_video },
    FormatEntry { magic: MAGIC_FILE, variant: Variant::File, parse: parse_file },
];

#[inline]
pub fn lookup(magic: &[u8; MAGIC_SIZE]) -> Option<&'static FormatEntry> {
    FORMATS.iter().find(|entry| &entry.magic == magic)
}

fn parse_legacy(reader: &mut dyn Read) -> Result<Header, ContainerError> {
    LegacyHeader::parse(reader).map(Header::Legacy)
}

fn parse_video(reader: &mut dyn Read) -> Result<Header, ContainerError> {
    ChunkedHeader::parse(Variant::Video, MAGIC_VIDEO, reader).map(Header::Chunked)
}

fn parse_file(reader: &mut dyn Read) -> Result<Header, ContainerError> {
    ChunkedHeader::parse(Variant::File, MAGIC_FILE, reader).map(Header::Chunked)
}
