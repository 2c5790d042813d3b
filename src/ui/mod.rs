//! User interface components for terminal interaction.
//!
//! - [`display`]: result lines, the summary table, header details
//! - [`progress`]: progress bar fed by batch events
//! - [`prompt`]: masked password input, hints and the retry password source

pub mod display;
pub mod progress;
pub mod prompt;
