use std::io::{Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::cipher::{ChunkCipher, Derive, Protected};
use crate::config::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};
use crate::container::{ContainerError, batch_width};
use crate::header::{ChunkedHeader, HeaderParams};
use crate::secret::Password;
use crate::types::{Progress, Variant};

/// Choices for a new container.
#[derive(Debug, Clone, Copy)]
pub struct EncryptOptions<'a> {
    pub chunk_size: u32,
    pub variant: Variant,
    /// Stored only by the generic-file variant.
    pub original_name: Option<&'a str>,
    pub hint: Option<&'a str>,
}

/// Streams plaintext into a chunked container.
pub struct ContainerWriter<'a> {
    password: &'a Password,
    options: EncryptOptions<'a>,
}

impl<'a> ContainerWriter<'a> {
    pub fn new(password: &'a Password, options: EncryptOptions<'a>) -> Self {
        Self { password, options }
    }

    /// Encrypts everything from the current position of `input` to its end.
    ///
    /// The header goes first, then a zeroed tag table that is backfilled once
    /// every chunk has been sealed. `output` is left positioned at its end.
    /// On error the output holds a partial container and must be discarded.
    pub fn encrypt<R, W>(&self, input: &mut R, output: &mut W, progress: Option<&dyn Progress>) -> Result<ChunkedHeader, ContainerError>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let start = input.stream_position()?;
        let end = input.seek(SeekFrom::End(0))?;
        input.seek(SeekFrom::Start(start))?;

        let salt: [u8; SALT_SIZE] = Derive::generate_salt();
        let base_nonce: [u8; NONCE_SIZE] = Derive::generate_salt();

        let header = ChunkedHeader::new(HeaderParams {
            variant: self.options.variant,
            salt,
            base_nonce,
            original_length: end.saturating_sub(start),
            chunk_size: self.options.chunk_size,
            original_name: self.options.original_name,
            hint: self.options.hint,
        })?;

        let key = Derive::new(self.password)?.derive_key(&salt);
        let cipher = ChunkCipher::new(&key, base_nonce, header.as_bytes().to_vec());
        drop(key);

        debug!(variant = %header.variant(), length = header.original_length(), chunk_size = header.chunk_size(), chunks = header.chunk_count(), "writing container");

        output.write_all(header.as_bytes())?;
        let table_offset = output.stream_position()?;
        output.write_all(&vec![0u8; usize::try_from(header.tag_table_len()).unwrap_or(0)])?;

        let mut tags: Vec<[u8; TAG_SIZE]> = Vec::with_capacity(usize::try_from(header.chunk_count()).unwrap_or(0));
        let width = batch_width(header.chunk_size());
        let mut next = 0u32;

        while next < header.chunk_count() {
            let last = next.saturating_add(width).min(header.chunk_count());

            let mut chunks = Vec::with_capacity(usize::try_from(last - next).unwrap_or(0));
            for index in next..last {
                let mut chunk = Protected::new(vec![0u8; header.chunk_len(index)]);
                input.read_exact(&mut chunk)?;
                chunks.push(chunk);
            }

            tags.extend(cipher.seal_batch(next, &mut chunks)?);

            for chunk in &chunks {
                output.write_all(chunk)?;
                if let Some(progress) = progress {
                    progress.advance(chunk.len() as u64);
                }
            }

            next = last;
        }

        output.seek(SeekFrom::Start(table_offset))?;
        output.write_all(&tags.concat())?;
        output.seek(SeekFrom::End(0))?;

        Ok(header)
    }
}
