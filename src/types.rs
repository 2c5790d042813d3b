//! Common type definitions for Lockbox.
//!
//! - [`ProcessorMode`]: distinguishes encryption from decryption
//! - [`Variant`]: which container layout a file uses
//! - [`VariantChoice`]: how the writer picks a variant for a new container
//! - [`Progress`]: receiver for byte-level progress from the container streams

use std::path::Path;

use clap::ValueEnum;
use strum::Display;

use crate::config::{FILE_EXTENSION, VIDEO_EXTENSION, VIDEO_EXTENSIONS};

/// Represents the type of file operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ProcessorMode {
    /// Encrypt plain files into containers.
    #[strum(serialize = "Encrypt")]
    Encrypt,

    /// Decrypt containers back into plain files.
    #[strum(serialize = "Decrypt")]
    Decrypt,
}

impl ProcessorMode {
    /// Progress label for the mode.
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::Encrypt => "Encrypting",
            Self::Decrypt => "Decrypting",
        }
    }

    /// Past-tense verb used in result lines.
    #[inline]
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypted",
            Self::Decrypt => "decrypted",
        }
    }
}

/// Container layout, identified on disk by the magic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Variant {
    /// Predecessor single-block format. Read-only.
    #[strum(serialize = "legacy")]
    Legacy,

    /// Chunked format without an embedded original name.
    #[strum(serialize = "video")]
    Video,

    /// Chunked format carrying the original file name.
    #[strum(serialize = "file")]
    File,
}

impl Variant {
    /// Extension given to containers of this variant.
    #[inline]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Video => VIDEO_EXTENSION,
            Self::File | Self::Legacy => FILE_EXTENSION,
        }
    }

    /// Whether the header embeds the original file name.
    #[inline]
    pub fn stores_name(self) -> bool {
        matches!(self, Self::File)
    }
}

/// Variant selection for new containers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum VariantChoice {
    /// Video variant for known video extensions, file variant otherwise.
    #[default]
    Auto,

    /// Always the video variant.
    Video,

    /// Always the generic-file variant.
    File,
}

impl VariantChoice {
    /// Resolves the choice against a concrete input path.
    pub fn resolve(self, input: &Path) -> Variant {
        match self {
            Self::Video => Variant::Video,
            Self::File => Variant::File,
            Self::Auto => {
                let is_video = input
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)));

                if is_video { Variant::Video } else { Variant::File }
            }
        }
    }
}

/// Receives the number of bytes processed as a container stream advances.
///
/// Implementations are shared across chunk workers and batch workers, so they
/// must be thread-safe.
pub trait Progress: Sync {
    fn advance(&self, bytes: u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_auto_resolution() {
        assert_eq!(VariantChoice::Auto.resolve(Path::new("clip.MP4")), Variant::Video);
        assert_eq!(VariantChoice::Auto.resolve(Path::new("movie.mkv")), Variant::Video);
        assert_eq!(VariantChoice::Auto.resolve(Path::new("notes.txt")), Variant::File);
        assert_eq!(VariantChoice::Auto.resolve(Path::new("no_extension")), Variant::File);
    }

    #[test]
    fn test_variant_override() {
        assert_eq!(VariantChoice::File.resolve(Path::new("clip.mp4")), Variant::File);
        assert_eq!(VariantChoice::Video.resolve(Path::new("notes.txt")), Variant::Video);
    }

    #[test]
    fn test_display() {
        assert_eq!(ProcessorMode::Encrypt.to_string(), "Encrypt");
        assert_eq!(Variant::Legacy.to_string(), "legacy");
        assert!(Variant::File.stores_name());
        assert!(!Variant::Video.stores_name());
    }
}
