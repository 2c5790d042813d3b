//! Console output: result lines, the final tally and header details.

use std::path::Path;

use bytesize::ByteSize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use console::style;

use crate::batch::Summary;
use crate::config::TAG_SIZE;
use crate::container::Completed;
use crate::header::Header;
use crate::types::ProcessorMode;

pub fn success_line(mode: ProcessorMode, completed: &Completed) -> String {
    format!("{} {} {} {}", style("✓").green(), completed.input.display(), style(mode.past_tense()).dim(), style(completed.output.display()).bold())
}

pub fn failure_line(input: &Path, reason: &str) -> String {
    format!("{} {} {}", style("✗").red(), input.display(), style(reason).red())
}

/// Final tally: one row per item, then the counts.
pub fn show_summary(mode: ProcessorMode, summary: &Summary) {
    let mut rows: Vec<(usize, [Cell; 3])> = summary
        .succeeded
        .iter()
        .map(|(index, completed)| (*index, [Cell::new(completed.input.display()), Cell::new("ok").fg(Color::Green), Cell::new(completed.output.display())]))
        .chain(
            summary
                .failed
                .iter()
                .map(|failure| (failure.index, [Cell::new(failure.input.display()), Cell::new("failed").fg(Color::Red), Cell::new(failure.reason())])),
        )
        .collect();
    rows.sort_unstable_by_key(|(index, _)| *index);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic).set_header(vec!["#", "Input", "Result", "Output / Reason"]);

    for (index, [input, result, detail]) in rows {
        table.add_row(vec![Cell::new(index + 1), input, result, detail]);
    }

    eprintln!("{table}");

    let tally = format!("{}: {} succeeded, {} failed in {:.1?}", mode, summary.succeeded.len(), summary.failed.len(), summary.elapsed);
    if summary.is_success() {
        eprintln!("{} {}", style("✓").green(), style(tally).bold());
    } else {
        eprintln!("{} {}", style("✗").red(), style(tally).bold());
    }
}

/// Header details for `inspect`. The hint itself is never printed here.
pub fn show_header(path: &Path, header: &Header) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);

    row(&mut table, "Container", path.display());
    row(&mut table, "Variant", header.variant());
    row(&mut table, "Original length", format!("{} ({} bytes)", ByteSize(header.original_length()), header.original_length()));

    match header {
        Header::Chunked(chunked) => {
            row(&mut table, "Chunk size", ByteSize(u64::from(chunked.chunk_size())));
            row(&mut table, "Chunks", chunked.chunk_count());
            row(&mut table, "Tag table", format!("{} bytes", u64::from(chunked.chunk_count()) * TAG_SIZE as u64));
            row(&mut table, "Flags", format!("{:#04x}", chunked.flags()));
        }
        Header::Legacy(legacy) => {
            row(&mut table, "Chunks", "1 (single block)");
            row(&mut table, "Flags", format!("{:#04x}", legacy.flags()));
        }
    }

    row(&mut table, "Header size", format!("{} bytes", header.encoded_len()));
    row(&mut table, "Salt", hex::encode(header.salt()));
    row(&mut table, "Original name", header.original_name().unwrap_or("(not stored)"));
    row(&mut table, "Hint", if header.raw_hint().is_some() { "present" } else { "none" });

    println!("{table}");
}

fn row(table: &mut Table, label: &str, value: impl ToString) {
    table.add_row(vec![Cell::new(label), Cell::new(value)]);
}

/// Shown after a failed password attempt, before the next prompt.
pub fn show_retry_notice(container: &Path, hint: Option<&str>, remaining: u32) {
    eprintln!("{} {}: wrong password or corrupted data", style("✗").red(), container.display());

    if let Some(hint) = hint {
        eprintln!("  {} {}", style("Hint:").yellow().bold(), hint);
    }

    eprintln!("  {}", style(format!("{remaining} attempt(s) left, empty input cancels")).dim());
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::Variant;

    #[test]
    fn test_lines_mention_paths() {
        console::set_colors_enabled(false);
        let completed = Completed { input: PathBuf::from("in.txt"), output: PathBuf::from("in.txt.lbx"), variant: Variant::File, bytes: 3 };

        assert_eq!(success_line(ProcessorMode::Encrypt, &completed), "✓ in.txt encrypted in.txt.lbx");
        assert_eq!(failure_line(Path::new("x.lbx"), "authentication failed"), "✗ x.lbx authentication failed");
    }
}
