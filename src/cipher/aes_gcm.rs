use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use rayon::prelude::*;

use crate::cipher::{Protected, chunk_nonce};
use crate::config::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::container::ContainerError;

/// AES-256-GCM bound to one container: its key, its base nonce, and the
/// serialized header used as additional authenticated data.
///
/// Tags are detached so they can live in the container's tag table instead of
/// trailing each chunk.
pub struct ChunkCipher {
    inner: Aes256Gcm,
    base_nonce: [u8; NONCE_SIZE],
    aad: Vec<u8>,
}

impl ChunkCipher {
    pub fn new(key: &Protected<[u8; KEY_SIZE]>, base_nonce: [u8; NONCE_SIZE], aad: Vec<u8>) -> Self {
        let inner = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose()));
        Self { inner, base_nonce, aad }
    }

    /// Encrypts chunk `index` in place and returns its tag.
    #[inline]
    pub fn seal(&self, index: u32, buffer: &mut [u8]) -> Result<[u8; TAG_SIZE], ContainerError> {
        let nonce = chunk_nonce(&self.base_nonce, index);
        let tag = self
            .inner
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), &self.aad, buffer)
            .map_err(|_| ContainerError::InvalidParameter(format!("chunk {index} is too large to encrypt")))?;

        Ok(tag.into())
    }

    /// Verifies and decrypts chunk `index` in place.
    ///
    /// On failure the buffer contents are unspecified and must be discarded.
    #[inline]
    pub fn open(&self, index: u32, buffer: &mut [u8], tag: &[u8; TAG_SIZE]) -> Result<(), ContainerError> {
        let nonce = chunk_nonce(&self.base_nonce, index);
        self.inner
            .decrypt_in_place_detached(Nonce::from_slice(&nonce), &self.aad, buffer, Tag::from_slice(tag))
            .map_err(|_| ContainerError::AuthenticationFailed)
    }

    /// Seals consecutive chunks starting at index `first` on the rayon pool.
    ///
    /// Tags are returned in chunk order.
    pub fn seal_batch(&self, first: u32, chunks: &mut [Protected<Vec<u8>>]) -> Result<Vec<[u8; TAG_SIZE]>, ContainerError> {
        let end = batch_end(first, chunks.len())?;
        chunks.par_iter_mut().zip(first..end).map(|(chunk, index)| self.seal(index, chunk)).collect()
    }

    /// Opens consecutive chunks starting at index `first` on the rayon pool.
    ///
    /// Returns the offset within the batch of the first chunk that failed
    /// authentication, or `None` when every chunk verified. Every chunk before
    /// that offset has been decrypted.
    pub fn open_batch(&self, first: u32, chunks: &mut [Protected<Vec<u8>>], tags: &[[u8; TAG_SIZE]]) -> Result<Option<usize>, ContainerError> {
        if tags.len() != chunks.len() {
            return Err(ContainerError::InvalidParameter(format!("{} tags for {} chunks", tags.len(), chunks.len())));
        }

        let end = batch_end(first, chunks.len())?;
        Ok(chunks.par_iter_mut().zip(tags.par_iter()).zip(first..end).position_first(|((chunk, tag), index)| self.open(index, chunk, tag).is_err()))
    }
}

fn batch_end(first: u32, len: usize) -> Result<u32, ContainerError> {
    u32::try_from(len)
        .ok()
        .and_then(|len| first.checked_add(len))
        .ok_or_else(|| ContainerError::InvalidParameter(format!("chunk index overflow at {first} + {len}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(aad: &[u8]) -> ChunkCipher {
        ChunkCipher::new(&Protected::new([9u8; KEY_SIZE]), [1u8; NONCE_SIZE], aad.to_vec())
    }

    #[test]
    fn test_seal_open_in_place() {
        let cipher = cipher(b"header");
        let mut buffer = b"chunk payload".to_vec();

        let tag = cipher.seal(5, &mut buffer).unwrap();
        assert_ne!(buffer, b"chunk payload");

        cipher.open(5, &mut buffer, &tag).unwrap();
        assert_eq!(buffer, b"chunk payload");
    }

    #[test]
    fn test_wrong_index_fails() {
        let cipher = cipher(b"header");
        let mut buffer = b"chunk payload".to_vec();
        let tag = cipher.seal(0, &mut buffer).unwrap();

        assert!(matches!(cipher.open(1, &mut buffer, &tag), Err(ContainerError::AuthenticationFailed)));
    }

    #[test]
    fn test_aad_is_bound() {
        let mut buffer = b"chunk payload".to_vec();
        let tag = cipher(b"header").seal(0, &mut buffer).unwrap();

        assert!(matches!(cipher(b"HEADER").open(0, &mut buffer, &tag), Err(ContainerError::AuthenticationFailed)));
    }

    #[test]
    fn test_batch_reports_first_failure() {
        let cipher = cipher(b"header");
        let plain: Vec<Vec<u8>> = (0u8..6).map(|i| vec![i; 100]).collect();
        let mut chunks: Vec<Protected<Vec<u8>>> = plain.iter().cloned().map(Protected::new).collect();

        let tags = cipher.seal_batch(10, &mut chunks).unwrap();
        assert_eq!(tags.len(), 6);

        chunks[3][0] ^= 0x80;
        chunks[5][0] ^= 0x80;

        let failed = cipher.open_batch(10, &mut chunks, &tags).unwrap();
        assert_eq!(failed, Some(3));
        for (chunk, expected) in chunks.iter().zip(&plain).take(3) {
            assert_eq!(chunk.expose(), expected);
        }
    }

    #[test]
    fn test_batch_all_valid() {
        let cipher = cipher(b"");
        let mut chunks: Vec<Protected<Vec<u8>>> = (0u8..4).map(|i| Protected::new(vec![i; 33])).collect();
        let tags = cipher.seal_batch(0, &mut chunks).unwrap();

        assert_eq!(cipher.open_batch(0, &mut chunks, &tags).unwrap(), None);
        assert_eq!(chunks[2].expose(), &vec![2u8; 33]);
    }
}
