//! Terminal output for the CLI: run progress and summary tables.

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};
use is_terminal::IsTerminal;

use crate::models::{Label, ResolvedLink};
use crate::pipeline::{RecordOutcome, RunSummary};

/// Check if stderr is a terminal.
pub fn is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Progress bar over the rows of a run, hidden when stderr is not a terminal.
#[derive(Debug)]
pub struct RunProgress {
    pb: indicatif::ProgressBar,
}

impl RunProgress {
    /// Bar over `total` rows, starting at `position`
    pub fn new(total: usize, position: usize) -> Self {
        let pb = if is_terminal() {
            indicatif::ProgressBar::new(total as u64)
        } else {
            indicatif::ProgressBar::hidden()
        };
        if let Ok(style) = indicatif::ProgressStyle::with_template(
            "{msg}: {bar:40.cyan/blue} {pos}/{len} ({percent}%) {elapsed_precise}",
        ) {
            pb.set_style(style.progress_chars("█▓▒░ "));
        }
        pb.set_message("Checking");
        pb.set_position(position as u64);
        Self { pb }
    }

    /// Advance past `row` and show its label
    pub fn row_done(&self, row: usize, outcome: &RecordOutcome) {
        self.pb.set_position(row as u64 + 1);
        self.pb.set_message(format!("Last: {}", outcome.label));
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

fn label_cell(label: Label) -> Cell {
    let color = match label {
        Label::Yes => Color::Green,
        Label::No => Color::Yellow,
        Label::Nf => Color::Red,
    };
    Cell::new(label.as_str())
        .fg(color)
        .add_attribute(Attribute::Bold)
}

/// Table of label counts for a run
pub fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["DRIC", "Rows"]);

    for (label, count) in [
        (Label::Yes, summary.yes),
        (Label::No, summary.no),
        (Label::Nf, summary.nf),
    ] {
        table.add_row(vec![label_cell(label), Cell::new(count)]);
    }
    table.add_row(vec![
        Cell::new("kept from previous run"),
        Cell::new(summary.skipped),
    ]);
    table.add_row(vec![
        Cell::new("total input rows").add_attribute(Attribute::Bold),
        Cell::new(summary.total).add_attribute(Attribute::Bold),
    ]);
    table
}

/// Table describing a resolved link
pub fn link_table(link: &ResolvedLink) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Origin", "URL"]);
    table.add_row(vec![
        Cell::new(link.origin.to_string()),
        Cell::new(link.url.as_str()),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkOrigin;
    use url::Url;

    #[test]
    fn test_summary_table_lists_counts() {
        let summary = RunSummary {
            yes: 2,
            no: 5,
            nf: 1,
            skipped: 3,
            total: 11,
        };
        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("YES"));
        assert!(rendered.contains("NF"));
        assert!(rendered.contains("kept from previous run"));
        assert!(rendered.contains("11"));
    }

    #[test]
    fn test_link_table() {
        let link = ResolvedLink::new(
            Url::parse("https://journal.example.org/a/1").unwrap(),
            LinkOrigin::CitationTableLink,
        );
        let rendered = link_table(&link).to_string();
        assert!(rendered.contains("citation table link"));
        assert!(rendered.contains("https://journal.example.org/a/1"));
    }
}
