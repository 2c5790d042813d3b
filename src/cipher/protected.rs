use std::fmt::{Debug, Formatter, Result};
use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Owned secret material that is wiped when it goes out of scope.
///
/// Used for derived keys and for chunk scratch buffers, so every exit path
/// (including `?` returns and panics that unwind) leaves zeroed memory behind.
pub struct Protected<T>
where
    T: Zeroize,
{
    data: T,
}

impl<T> Protected<T>
where
    T: Zeroize,
{
    #[inline]
    pub fn new(value: T) -> Self {
        Self { data: value }
    }

    #[inline]
    pub fn expose(&self) -> &T {
        &self.data
    }

    #[inline]
    pub fn expose_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> Deref for Protected<T>
where
    T: Zeroize,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for Protected<T>
where
    T: Zeroize,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl<T> Drop for Protected<T>
where
    T: Zeroize,
{
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl<T> Debug for Protected<T>
where
    T: Zeroize,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str("Protected([REDACTED])")
    }
}
