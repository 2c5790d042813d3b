//! Global Configuration Constants
//!
//! Every fixed parameter of the container format and the command line tool lives
//! here: magic values, field sizes, key derivation cost, structural limits, file
//! extensions, and the defaults applied when the user does not override them.
//!
//! ## Format Stability
//!
//! Constants marked as part of the on-disk layout must never change for an
//! existing magic. A new layout gets a new magic and a new entry in the format
//! registry (`header::registry`), leaving earlier readers untouched.

/// Application name used in user interfaces.
pub const APP_NAME: &str = "Lockbox";

/// Extension for containers of the generic-file variant and for legacy containers.
pub const FILE_EXTENSION: &str = ".lbx";

/// Extension for containers of the video variant.
pub const VIDEO_EXTENSION: &str = ".lbv";

/// Suffix appended to a decrypted output when the container name carries no
/// recognizable extension to strip.
pub const DECRYPTED_SUFFIX: &str = ".decrypted";

/// Input extensions (lowercase, without dot) that select the video variant when
/// the variant is chosen automatically.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mkv", "mov", "avi", "wmv", "flv", "webm", "mpg", "mpeg", "ts", "3gp"];

// === Magic values ===
// Part of the on-disk layout.

/// Legacy single-block format: whole payload under one nonce and one tag.
pub const MAGIC_LEGACY: [u8; 4] = *b"LBX1";

/// Chunked format, video variant (no embedded original name).
pub const MAGIC_VIDEO: [u8; 4] = *b"LBV2";

/// Chunked format, generic-file variant (embedded original name).
pub const MAGIC_FILE: [u8; 4] = *b"LBF2";

/// Size of the magic field in bytes.
pub const MAGIC_SIZE: usize = 4;

/// Flags bit 0: the hint is stored as UTF-16LE with a code unit count.
///
/// When clear, the hint is a legacy UTF-8 string prefixed by its byte count.
pub const FLAG_HINT_UTF16: u8 = 0x01;

// === Cryptographic parameters ===

/// Length of the per-container PBKDF2 salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Length of the AES-GCM nonce (and of the per-container base nonce) in bytes.
pub const NONCE_SIZE: usize = 12;

/// Length of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Length of one AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// PBKDF2-HMAC-SHA256 iteration count.
///
/// Fixed for every container; the header does not record it, so changing this
/// value requires a new magic.
pub const PBKDF2_ITERATIONS: u32 = 200_000;

// === Layout sizes and structural limits ===

/// Size of the fixed chunked-header prefix: magic through chunk count.
pub const CHUNKED_FIXED_SIZE: usize = MAGIC_SIZE + 1 + SALT_SIZE + NONCE_SIZE + 8 + 4 + 4;

/// Size of the legacy header: magic, flags, salt, nonce, length.
pub const LEGACY_HEADER_SIZE: usize = MAGIC_SIZE + 1 + SALT_SIZE + NONCE_SIZE + 8;

/// Default plaintext bytes per chunk.
pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

/// Smallest chunk size accepted from the command line.
pub const MIN_CHUNK_SIZE: u32 = 4 * 1024;

/// Largest chunk size the writer produces or the reader accepts.
///
/// A header declaring more than this is rejected as malformed so a hostile
/// container cannot force an enormous allocation.
pub const MAX_CHUNK_SIZE: u32 = 64 * 1024 * 1024;

/// Upper bound on chunk bytes held in memory by one parallel batch.
pub const MAX_BATCH_BYTES: u32 = 64 * 1024 * 1024;

/// Largest payload the legacy single-block reader will load into memory.
pub const MAX_LEGACY_LENGTH: u64 = i32::MAX as u64;

/// Maximum encoded hint size in bytes, after truncation.
pub const MAX_HINT_BYTES: usize = 200;

/// Maximum stored original name length in UTF-16 code units.
pub const MAX_FILENAME_LENGTH: usize = 255;

// === Interaction ===

/// Minimum length for a password chosen at encryption time.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Number of password attempts offered by the retry flow, including the first.
pub const MAX_PASSWORD_ATTEMPTS: u32 = 3;

/// Environment variable consulted for the password when `--password` is absent.
pub const PASSWORD_ENV: &str = "LOCKBOX_PASSWORD";

// === Batch processing ===

/// Default number of files processed at once.
///
/// One keeps console output orderly and memory bounded; chunk encryption
/// inside each file still runs on every core.
pub const DEFAULT_JOBS: usize = 1;

/// Window over which the moving-average throughput is computed, in milliseconds.
pub const THROUGHPUT_WINDOW_MS: u64 = 5_000;

/// Length of the random hex name given to containers when names are obscured.
pub const OBSCURED_NAME_BYTES: usize = 12;

/// File and directory patterns skipped when walking directories.
pub const EXCLUDED_PATTERNS: &[&str] = &[
    "target",       // Rust build artifacts
    "node_modules", // Node.js dependencies
    ".git",         // Git repository metadata
    ".cache",       // Application cache files
    ".ssh",         // SSH keys and configuration
    ".gnupg",       // GPG keys and configuration
    "*.part",       // In-flight staged outputs
];
