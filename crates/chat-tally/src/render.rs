//! Plain-text rendering of tally tables.
//!
//! The real charting client consumes `ChartData` as JSON (`--json`); this
//! output exists so the CLI is usable stand-alone.

use tally_core::models::TallyTable;
use tally_data::analysis::ChartData;

/// Render a full chart-data result as aligned text tables.
pub fn render_chart_data(data: &ChartData) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", data.title));
    out.push_str(&format!("participants: {}\n", data.participants.join(", ")));

    if let Some(table) = &data.windowed {
        out.push_str(&render_table("messages per bin", table));
    }
    if let Some(table) = &data.cumulative {
        out.push_str(&render_table("cumulative messages per day", table));
    }

    out
}

fn render_table(label: &str, table: &TallyTable) -> String {
    let mut out = format!("\n{}\n", label);
    if table.bin_starts.is_empty() {
        out.push_str("(no bins in range)\n");
        return out;
    }

    let senders: Vec<&str> = table.senders().collect();
    let widths: Vec<usize> = senders
        .iter()
        .map(|sender| {
            let widest_count = table
                .series(sender)
                .map(|counts| {
                    counts
                        .iter()
                        .map(|n| n.to_string().len())
                        .max()
                        .unwrap_or(1)
                })
                .unwrap_or(1);
            sender.len().max(widest_count)
        })
        .collect();

    out.push_str(&format!("{:<16}", "bin start"));
    for (sender, &width) in senders.iter().zip(&widths) {
        out.push_str(&format!("  {:>width$}", sender));
    }
    out.push('\n');

    for (row, start) in table.bin_starts.iter().enumerate() {
        out.push_str(&format!("{:<16}", start.format("%Y-%m-%d %H:%M")));
        for (sender, &width) in senders.iter().zip(&widths) {
            let count = table
                .series(sender)
                .and_then(|counts| counts.get(row))
                .copied()
                .unwrap_or(0);
            out.push_str(&format!("  {:>width$}", count));
        }
        out.push('\n');
    }

    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tally_data::aggregator::AggregateOptions;
    use tally_data::analysis::{build_chart_data, ChartSelection};
    use tally_data::parser::parse_transcript;

    #[test]
    fn test_render_contains_labels_and_counts() {
        let convo = parse_transcript(
            "01/02/2019, 10:00 - Alice: hi\n01/02/2019, 10:05 - Bob: hello\n",
            "chat",
        );
        let data = build_chart_data(
            &convo,
            ChartSelection::default(),
            &AggregateOptions::default(),
        )
        .unwrap();
        let text = render_chart_data(&data);

        assert!(text.contains("participants: Alice, Bob"));
        assert!(text.contains("messages per bin"));
        assert!(text.contains("cumulative messages per day"));
        assert!(text.contains("2019-02-01 00:00"));
    }

    #[test]
    fn test_render_empty_range() {
        let convo = parse_transcript("", "empty");
        let data = build_chart_data(
            &convo,
            ChartSelection::default(),
            &AggregateOptions::default(),
        )
        .unwrap();
        let text = render_chart_data(&data);
        assert!(text.contains("(no bins in range)"));
    }

    #[test]
    fn test_render_counts_aligned_per_bin() {
        let convo = parse_transcript(
            concat!(
                "01/02/2019, 10:00 - Alice: a\n",
                "01/02/2019, 11:00 - Alice: b\n",
                "02/02/2019, 10:00 - Bob: c\n",
            ),
            "chat",
        );
        let data = build_chart_data(
            &convo,
            ChartSelection {
                windowed_bar: true,
                cumulative_stack: false,
            },
            &AggregateOptions::default(),
        )
        .unwrap();
        let text = render_chart_data(&data);

        let day_one_row = text
            .lines()
            .find(|l| l.starts_with("2019-02-01"))
            .expect("row for first day");
        // Alice column then Bob column.
        assert!(day_one_row.trim_end().ends_with("2    0"));
    }
}
