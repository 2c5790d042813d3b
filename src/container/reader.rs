use std::io::{Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::cipher::{ChunkCipher, Derive, Protected};
use crate::config::TAG_SIZE;
use crate::container::{ContainerError, batch_width};
use crate::header::{ChunkedHeader, Header, LegacyHeader};
use crate::secret::Password;
use crate::types::Progress;

/// Verified decryption of a container of any known layout.
///
/// [`ContainerReader::open`] parses and structurally validates the header
/// without a password, so callers can inspect a container before deciding
/// how to decrypt it.
pub struct ContainerReader<R> {
    input: R,
    header: Header,
    body_offset: u64,
}

impl<R> ContainerReader<R>
where
    R: Read + Seek,
{
    /// Parses the header and checks that the rest of the stream holds exactly
    /// the tag table and ciphertext the header declares.
    ///
    /// # Errors
    /// [`ContainerError::Malformed`] for an unknown magic, an invalid header,
    /// a truncated body or trailing bytes.
    pub fn open(mut input: R) -> Result<Self, ContainerError> {
        let header = Header::read_from(&mut input)?;

        let body_offset = input.stream_position()?;
        let end = input.seek(SeekFrom::End(0))?;
        input.seek(SeekFrom::Start(body_offset))?;

        let remaining = end.saturating_sub(body_offset);
        let expected = header.body_len().ok_or_else(|| ContainerError::Malformed("declared body length overflows".into()))?;

        if remaining < expected {
            return Err(ContainerError::Malformed(format!("truncated body: {remaining} bytes present, {expected} declared")));
        }
        if remaining > expected {
            return Err(ContainerError::Malformed(format!("{} trailing bytes after ciphertext", remaining - expected)));
        }

        debug!(variant = %header.variant(), length = header.original_length(), "opened container");

        Ok(Self { input, header, body_offset })
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Decrypts the whole payload into `output`, verifying every chunk.
    ///
    /// Chunks are verified and written in index order. On the first chunk
    /// that fails verification this returns
    /// [`ContainerError::AuthenticationFailed`]; the plaintext of every
    /// earlier chunk has already been written. Can be called again, for
    /// example with another password.
    pub fn decrypt_to<W: Write>(&mut self, output: &mut W, password: &Password, progress: Option<&dyn Progress>) -> Result<(), ContainerError> {
        self.input.seek(SeekFrom::Start(self.body_offset))?;
        let derive = Derive::new(password)?;

        match &self.header {
            Header::Chunked(header) => decrypt_chunked(&mut self.input, header, &derive, output, progress),
            Header::Legacy(header) => decrypt_legacy(&mut self.input, header, &derive, output, progress),
        }
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

fn decrypt_chunked<R: Read, W: Write>(input: &mut R, header: &ChunkedHeader, derive: &Derive<'_>, output: &mut W, progress: Option<&dyn Progress>) -> Result<(), ContainerError> {
    let table_len = usize::try_from(header.chunk_count()).map_err(|_| ContainerError::Malformed("tag table does not fit in memory".into()))? * TAG_SIZE;
    let mut table = vec![0u8; table_len];
    input.read_exact(&mut table).map_err(ContainerError::truncated("tag table"))?;

    let tags: Vec<[u8; TAG_SIZE]> = table
        .chunks_exact(TAG_SIZE)
        .map(|slice| {
            let mut tag = [0u8; TAG_SIZE];
            tag.copy_from_slice(slice);
            tag
        })
        .collect();

    let key = derive.derive_key(header.salt());
    let cipher = ChunkCipher::new(&key, *header.base_nonce(), header.as_bytes().to_vec());
    drop(key);

    let width = batch_width(header.chunk_size());
    let mut next = 0u32;

    while next < header.chunk_count() {
        let last = next.saturating_add(width).min(header.chunk_count());

        let mut chunks = Vec::with_capacity(usize::try_from(last - next).unwrap_or(0));
        for index in next..last {
            let mut chunk = Protected::new(vec![0u8; header.chunk_len(index)]);
            input.read_exact(&mut chunk).map_err(ContainerError::truncated("ciphertext"))?;
            chunks.push(chunk);
        }

        let batch_tags = &tags[next as usize..last as usize];
        let failed = cipher.open_batch(next, &mut chunks, batch_tags)?;
        let verified = failed.unwrap_or(chunks.len());

        for chunk in &chunks[..verified] {
            output.write_all(chunk)?;
            if let Some(progress) = progress {
                progress.advance(chunk.len() as u64);
            }
        }

        if let Some(offset) = failed {
            debug!(chunk = u64::from(next) + offset as u64, "chunk failed verification");
            return Err(ContainerError::AuthenticationFailed);
        }

        next = last;
    }

    Ok(())
}

fn decrypt_legacy<R: Read, W: Write>(input: &mut R, header: &LegacyHeader, derive: &Derive<'_>, output: &mut W, progress: Option<&dyn Progress>) -> Result<(), ContainerError> {
    let length = usize::try_from(header.original_length()).map_err(|_| ContainerError::Malformed("legacy payload does not fit in memory".into()))?;

    let mut payload = Protected::new(vec![0u8; length]);
    input.read_exact(&mut payload).map_err(ContainerError::truncated("legacy ciphertext"))?;

    let mut tag = [0u8; TAG_SIZE];
    input.read_exact(&mut tag).map_err(ContainerError::truncated("legacy tag"))?;

    let key = derive.derive_key(header.salt());
    let cipher = ChunkCipher::new(&key, *header.nonce(), Vec::new());
    drop(key);

    cipher.open(0, &mut payload, &tag)?;

    output.write_all(&payload)?;
    if let Some(progress) = progress {
        progress.advance(payload.len() as u64);
    }

    Ok(())
}
