use std::fmt::{Debug, Formatter, Result};

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// A user password held in memory that is zeroized on drop.
pub struct Password {
    inner: SecretString,
}

impl Password {
    pub fn new(password: &str) -> Self {
        Self { inner: SecretString::from(password.to_owned()) }
    }

    pub fn from_string(password: String) -> Self {
        Self { inner: SecretString::from(password) }
    }

    #[inline]
    pub fn expose_secret(&self) -> &str {
        self.inner.expose_secret()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }

    /// Constant-time comparison of two passwords.
    pub fn matches(&self, other: &Self) -> bool {
        self.expose_secret().as_bytes().ct_eq(other.expose_secret().as_bytes()).into()
    }
}

impl From<SecretString> for Password {
    fn from(secret: SecretString) -> Self {
        Self { inner: secret }
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str("Password([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        assert!(Password::new("hunter22").matches(&Password::new("hunter22")));
        assert!(!Password::new("hunter22").matches(&Password::new("hunter23")));
        assert!(!Password::new("hunter22").matches(&Password::new("hunter2")));
    }

    #[test]
    fn test_debug_hides_value() {
        let rendered = format!("{:?}", Password::new("hunter22"));
        assert!(!rendered.contains("hunter22"));
    }
}
