//! Container encryption and decryption.
//!
//! - [`ContainerWriter`] / [`ContainerReader`]: stream-level operations over
//!   any `Read + Seek` / `Write + Seek` pair
//! - [`encrypt_file`] / [`decrypt_file`] / [`try_read_hint`]: file-level
//!   operations with output naming and staged, no-clobber promotion
//!
//! Chunk crypto inside one container runs in batches on the rayon pool; I/O
//! stays sequential and output is always written in chunk order.

use std::num::NonZeroUsize;
use std::thread;

use crate::config::MAX_BATCH_BYTES;

mod error;
mod operation;
mod reader;
mod writer;

pub use error::ContainerError;
pub use operation::{Completed, DecryptRequest, EncryptRequest, decrypt_file, encrypt_file, read_header, try_read_hint};
pub use reader::ContainerReader;
pub use writer::{ContainerWriter, EncryptOptions};

/// Chunks sealed or opened together in one parallel batch.
///
/// One chunk per core, capped so a batch never holds more than
/// [`MAX_BATCH_BYTES`] of chunk data.
fn batch_width(chunk_size: u32) -> u32 {
    let cores = thread::available_parallelism().map_or(4, NonZeroUsize::get);
    let cores = u32::try_from(cores).unwrap_or(u32::MAX);
    let budget = MAX_BATCH_BYTES / chunk_size.max(1);
    cores.min(budget).max(1)
}
