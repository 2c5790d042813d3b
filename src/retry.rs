//! Bounded password retry for containers that fail authentication.
//!
//! ```text
//! AwaitingPassword -> Attempting -> Success
//!                                -> Failed -> AwaitingPassword
//!                                          -> Exhausted (attempt bound reached)
//!                                -> Fatal (malformed container, I/O)
//! AwaitingPassword -> Cancelled (empty input, Esc, Ctrl-C)
//! ```
//!
//! The stored hint is read lazily, at most once per flow, and is only ever
//! handed to the [`PasswordSource`] on the `Failed -> AwaitingPassword`
//! transition. A first attempt that succeeds never touches it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use strum::Display;
use tracing::{debug, warn};

use crate::config::MAX_PASSWORD_ATTEMPTS;
use crate::container::{ContainerError, try_read_hint};
use crate::secret::Password;

/// Where replacement passwords come from, usually a masked terminal prompt.
pub trait PasswordSource {
    /// Asks for the password for attempt number `attempt` (1-based).
    ///
    /// `Ok(None)` or an empty password means the user cancelled.
    fn request(&mut self, attempt: u32) -> Result<Option<Password>>;

    /// Reports a failed attempt, with the stored hint if the container has
    /// one, and how many attempts remain.
    fn on_failure(&mut self, hint: Option<&str>, remaining: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RetryState {
    AwaitingPassword,
    Attempting,
    Success,
    Failed,
    Cancelled,
    Fatal,
    Exhausted,
}

impl RetryState {
    /// Whether the flow may move from `self` to `next`.
    pub fn can_move_to(self, next: Self) -> bool {
        use RetryState::*;

        matches!(
            (self, next),
            (AwaitingPassword, AwaitingPassword | Attempting | Cancelled) | (Attempting, Success | Failed | Fatal) | (Failed, AwaitingPassword | Exhausted)
        )
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded(T),
    Cancelled,
    Exhausted,
    Fatal(ContainerError),
}

/// Retry state for one container.
pub struct RetryFlow {
    container: PathBuf,
    max_attempts: u32,
    attempts: u32,
    state: RetryState,
    hint: Option<Option<String>>,
}

impl RetryFlow {
    pub fn new(container: &Path) -> Self {
        Self { container: container.to_path_buf(), max_attempts: MAX_PASSWORD_ATTEMPTS, attempts: 0, state: RetryState::AwaitingPassword, hint: None }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[inline]
    pub fn state(&self) -> RetryState {
        self.state
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs the flow from the start.
    ///
    /// `initial` is used for the first attempt when given; otherwise the
    /// source is asked. `attempt` performs one decryption.
    ///
    /// # Errors
    /// Only errors from the password source itself; container errors end up
    /// in the returned [`RetryOutcome`].
    pub fn run<T, S, F>(&mut self, source: &mut S, initial: Option<Password>, attempt: F) -> Result<RetryOutcome<T>>
    where
        S: PasswordSource + ?Sized,
        F: FnMut(&Password) -> Result<T, ContainerError>,
    {
        self.attempts = 0;
        self.state = RetryState::AwaitingPassword;
        self.drive(source, initial, attempt)
    }

    /// Continues after a first attempt that already failed authentication
    /// elsewhere, for example inside a batch.
    ///
    /// That attempt is replayed as `Attempting -> Failed`, counts against
    /// the bound, and the hint is surfaced before the next prompt.
    pub fn resume<T, S, F>(&mut self, source: &mut S, attempt: F) -> Result<RetryOutcome<T>>
    where
        S: PasswordSource + ?Sized,
        F: FnMut(&Password) -> Result<T, ContainerError>,
    {
        self.state = RetryState::AwaitingPassword;
        self.transition(RetryState::Attempting);
        self.attempts = 1;
        self.transition(RetryState::Failed);

        if self.attempts >= self.max_attempts {
            self.transition(RetryState::Exhausted);
            return Ok(RetryOutcome::Exhausted);
        }

        self.surface_hint(source);
        self.drive(source, None, attempt)
    }

    fn drive<T, S, F>(&mut self, source: &mut S, initial: Option<Password>, mut attempt: F) -> Result<RetryOutcome<T>>
    where
        S: PasswordSource + ?Sized,
        F: FnMut(&Password) -> Result<T, ContainerError>,
    {
        let mut pending = initial;

        loop {
            self.transition(RetryState::AwaitingPassword);

            let password = match pending.take() {
                Some(password) => password,
                None => match source.request(self.attempts + 1)? {
                    Some(password) if !password.is_empty() => password,
                    _ => {
                        self.transition(RetryState::Cancelled);
                        return Ok(RetryOutcome::Cancelled);
                    }
                },
            };

            self.transition(RetryState::Attempting);
            self.attempts += 1;

            match attempt(&password) {
                Ok(value) => {
                    self.transition(RetryState::Success);
                    return Ok(RetryOutcome::Succeeded(value));
                }
                Err(err) if err.is_retryable() => {
                    self.transition(RetryState::Failed);

                    if self.attempts >= self.max_attempts {
                        self.transition(RetryState::Exhausted);
                        return Ok(RetryOutcome::Exhausted);
                    }

                    self.surface_hint(source);
                }
                Err(err) => {
                    self.transition(RetryState::Fatal);
                    return Ok(RetryOutcome::Fatal(err));
                }
            }
        }
    }

    fn surface_hint<S: PasswordSource + ?Sized>(&mut self, source: &mut S) {
        let remaining = self.max_attempts.saturating_sub(self.attempts);
        let hint = self.hint().map(str::to_owned);
        source.on_failure(hint.as_deref(), remaining);
    }

    fn hint(&mut self) -> Option<&str> {
        let container = &self.container;
        self.hint
            .get_or_insert_with(|| {
                try_read_hint(container).unwrap_or_else(|err| {
                    warn!(path = %container.display(), error = %err, "could not read hint");
                    None
                })
            })
            .as_deref()
    }

    fn transition(&mut self, next: RetryState) {
        debug_assert!(self.state.can_move_to(next), "retry cannot move from {} to {next}", self.state);
        debug!(from = %self.state, to = %next, attempts = self.attempts, "retry transition");
        self.state = next;
    }
}
