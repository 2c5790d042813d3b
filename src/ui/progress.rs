use std::time::Duration;

use bytesize::ByteSize;
use flume::Receiver;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::{BatchEvent, Snapshot};
use crate::types::ProcessorMode;
use crate::ui::display;

/// Byte progress bar driven by batch snapshots.
///
/// Rate and ETA come from the batch's own moving average, not from
/// indicatif's estimator.
pub struct Bar {
    bar: ProgressBar,
}

impl Bar {
    pub fn new(total: u64, description: &str) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {prefix}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("●○ ");

        bar.set_style(style);
        bar.set_message(description.to_owned());

        Self { bar }
    }

    pub fn update(&self, snapshot: &Snapshot) {
        self.bar.set_position(snapshot.done_bytes);
        self.bar.set_prefix(format!("({}/s, ETA {})", ByteSize(snapshot.rate as u64), format_eta(snapshot.eta)));
    }

    /// Prints a line above the bar without breaking its rendering.
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Bar {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Renders batch events until every sender is gone.
pub async fn render(events: Receiver<BatchEvent>, mode: ProcessorMode) {
    let mut bar: Option<Bar> = None;

    while let Ok(event) = events.recv_async().await {
        match event {
            BatchEvent::Started { total_bytes, .. } => bar = Some(Bar::new(total_bytes, mode.label())),
            BatchEvent::Progress(snapshot) => {
                if let Some(bar) = &bar {
                    bar.update(&snapshot);
                }
            }
            BatchEvent::Succeeded { completed, .. } => print_line(bar.as_ref(), &display::success_line(mode, &completed)),
            BatchEvent::Failed { input, reason, .. } => print_line(bar.as_ref(), &display::failure_line(&input, &reason)),
        }
    }

    if let Some(bar) = bar {
        bar.finish();
    }
}

fn print_line(bar: Option<&Bar>, line: &str) {
    match bar {
        Some(bar) => bar.println(line),
        None => eprintln!("{line}"),
    }
}

fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => {
            let secs = eta.as_secs();
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
        None => "--:--:--".to_owned(),
    }
}
