//! # Cryptographic Primitives
//!
//! Building blocks shared by the container writer and reader:
//!
//! - [`Derive`]: PBKDF2-HMAC-SHA256 key derivation and CSPRNG salts
//! - [`chunk_nonce`]: the per-chunk nonce scheme
//! - [`ChunkCipher`]: AES-256-GCM with detached tags and header AAD
//! - [`Protected`]: zeroize-on-drop wrapper for keys and buffers
//!
//! ## Security Guarantees
//!
//! - Every chunk of a container is authenticated together with the exact
//!   serialized header, so editing any header field breaks every tag.
//! - Nonces are unique per chunk within a container, and the base nonce and
//!   salt are fresh random values per container.

mod aes_gcm;
mod derive;
mod nonce;
mod protected;

pub use self::aes_gcm::ChunkCipher;
pub use derive::Derive;
pub use nonce::chunk_nonce;
pub use protected::Protected;
