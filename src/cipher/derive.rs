//! # Key Derivation with PBKDF2
//!
//! Container keys come from PBKDF2-HMAC-SHA256 over the user's password and a
//! fresh per-container salt. The iteration count is fixed by the format and
//! not stored in the header.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::cipher::Protected;
use crate::config::{KEY_SIZE, PBKDF2_ITERATIONS};
use crate::container::ContainerError;
use crate::secret::Password;

/// Password-based key derivation for one container.
pub struct Derive<'a> {
    password: &'a Password,
}

impl<'a> Derive<'a> {
    /// Wraps a password for derivation.
    ///
    /// # Errors
    /// Returns [`ContainerError::InvalidParameter`] for an empty password.
    pub fn new(password: &'a Password) -> Result<Self, ContainerError> {
        if password.is_empty() {
            return Err(ContainerError::InvalidParameter("password cannot be empty".into()));
        }

        Ok(Self { password })
    }

    /// Derives the 32-byte AES-256 key for `salt`.
    ///
    /// Deterministic: the same password and salt always produce the same key.
    /// The result is wiped when dropped.
    pub fn derive_key(&self, salt: &[u8]) -> Protected<[u8; KEY_SIZE]> {
        let mut key = Protected::new([0u8; KEY_SIZE]);
        pbkdf2_hmac::<Sha256>(self.password.expose_secret().as_bytes(), salt, PBKDF2_ITERATIONS, key.expose_mut());
        key
    }

    /// Fills a fixed-size array from the operating system CSPRNG.
    ///
    /// Used for salts and base nonces.
    pub fn generate_salt<const N: usize>() -> [u8; N] {
        let mut bytes = [0u8; N];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}
