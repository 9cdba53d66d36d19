//! # Terminal output for ranked results
//!
//! Renders [`QueryResult`]s as an aligned table. Styling goes through
//! `console`, so colors are dropped automatically when stdout is not a TTY.
//!
//! ```text
//!  #  Assessment                          Type  Min   Distance
//!  1  Java 8 (New)                        K     20      0.4172
//!  2  SQL Server (New)                    K     50      0.6310
//! ```

use console::{Alignment, Term, pad_str, style, truncate_str};
use std::io::Write;

use crate::retriever::QueryResult;

const NAME_WIDTH: usize = 40;

fn cell(text: &str, width: usize, align: Alignment) -> String {
    pad_str(&truncate_str(text, width, "…"), width, align, None).into_owned()
}

/// Render `results` as a table, with ANSI styling when `colored` is set.
pub fn render_results(results: &[QueryResult], colored: bool) -> String {
    let mut out = String::new();
    let header = format!(
        "{} {} {} {} {}",
        cell("#", 3, Alignment::Right),
        cell("Assessment", NAME_WIDTH, Alignment::Left),
        cell("Type", 5, Alignment::Left),
        cell("Min", 4, Alignment::Right),
        cell("Distance", 10, Alignment::Right),
    );
    out.push_str(&style(header).bold().underlined().force_styling(colored).to_string());
    out.push('\n');

    for (rank, result) in results.iter().enumerate() {
        let record = &result.record;
        let minutes = match record.duration_minutes {
            Some(m) if m > 0 => m.to_string(),
            _ => "N/A".to_string(),
        };
        let name = style(cell(&record.name, NAME_WIDTH, Alignment::Left))
            .cyan()
            .force_styling(colored);
        let distance = style(cell(&format!("{:.4}", result.display_score()), 10, Alignment::Right))
            .yellow()
            .force_styling(colored);
        out.push_str(&format!(
            "{} {} {} {} {}\n",
            cell(&(rank + 1).to_string(), 3, Alignment::Right),
            name,
            cell(&record.test_type, 5, Alignment::Left),
            cell(&minutes, 4, Alignment::Right),
            distance,
        ));
    }

    if results.is_empty() {
        out.push_str(&style("no results").dim().force_styling(colored).to_string());
        out.push('\n');
    }
    out
}

/// Print `results` to stdout.
pub fn print_results(results: &[QueryResult]) -> std::io::Result<()> {
    let term = Term::stdout();
    let colored = term.features().colors_supported();
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(render_results(results, colored).as_bytes())?;
    stdout.flush()
}
