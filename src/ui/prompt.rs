//! Interactive prompts: masked passwords, optional hints and the retry source.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, ensure};
use inquire::error::InquireError;
use inquire::{Password as PasswordInput, PasswordDisplayMode, Text, min_length};

use crate::config::MAX_PASSWORD_ATTEMPTS;
use crate::retry::PasswordSource;
use crate::secret::Password;
use crate::ui::display;

/// Terminal prompt handler.
pub struct Prompt {
    password_min_length: usize,
}

impl Prompt {
    pub fn new(password_min_length: usize) -> Self {
        Self { password_min_length }
    }

    /// Prompts twice for a new password and compares the entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the entries differ or the prompt is aborted.
    pub fn encryption_password(&self) -> Result<Password> {
        let password = self.masked("Encryption password:", true)?.ok_or_else(|| anyhow!("operation cancelled"))?;
        let confirmation = self.masked("Confirm password:", true)?.ok_or_else(|| anyhow!("operation cancelled"))?;

        ensure!(password.matches(&confirmation), "passwords do not match");
        Ok(password)
    }

    /// Prompts once for a decryption password. `None` on empty input or
    /// when the prompt is dismissed.
    pub fn decryption_password(&self, message: &str) -> Result<Option<Password>> {
        self.masked(message, false)
    }

    /// Optional hint for a new container. Blank or skipped input stores none.
    pub fn hint(&self) -> Result<Option<String>> {
        let answer = Text::new("Password hint (optional):").with_help_message("Stored unencrypted in the container header. Esc to skip.").prompt_skippable();

        match answer {
            Ok(hint) => Ok(hint.filter(|hint| !hint.trim().is_empty())),
            Err(InquireError::OperationInterrupted) => Ok(None),
            Err(err) => Err(anyhow!("hint input failed: {err}")),
        }
    }

    fn masked(&self, message: &str, validate: bool) -> Result<Option<Password>> {
        let mut input = PasswordInput::new(message).with_display_mode(PasswordDisplayMode::Masked).without_confirmation();

        if validate {
            input = input.with_validator(min_length!(self.password_min_length, "password is too short"));
        }

        match input.prompt() {
            Ok(password) if password.is_empty() => Ok(None),
            Ok(password) => Ok(Some(Password::from_string(password))),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
            Err(err) => Err(anyhow!("password input failed: {err}")),
        }
    }
}

/// Asks the terminal for replacement passwords for one container.
pub struct TerminalSource<'a> {
    prompt: &'a Prompt,
    container: PathBuf,
}

impl<'a> TerminalSource<'a> {
    pub fn new(prompt: &'a Prompt, container: &Path) -> Self {
        Self { prompt, container: container.to_path_buf() }
    }
}

impl PasswordSource for TerminalSource<'_> {
    fn request(&mut self, attempt: u32) -> Result<Option<Password>> {
        let name = self.container.file_name().map_or_else(|| self.container.display().to_string(), |name| name.to_string_lossy().into_owned());
        self.prompt.decryption_password(&format!("Password for {name} (attempt {attempt}/{MAX_PASSWORD_ATTEMPTS}):"))
    }

    fn on_failure(&mut self, hint: Option<&str>, remaining: u32) {
        display::show_retry_notice(&self.container, hint, remaining);
    }
}
