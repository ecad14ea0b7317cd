use std::fmt::Write;

use crate::commands::format_age;
use crate::commands::json_types::ChartStatusView;

const MAX_ERROR_WIDTH: usize = 40;

pub struct StatusTable {
    rows: Vec<[String; 6]>,
    widths: [usize; 6],
}

const HEADERS: [&str; 6] = ["Chart", "Source", "Status", "Age", "Updated By", "Error"];

impl StatusTable {
    pub fn new(views: &[ChartStatusView]) -> Self {
        let rows: Vec<[String; 6]> = views
            .iter()
            .map(|view| {
                let status = if view.refreshing {
                    format!("{} (refreshing)", view.status)
                } else {
                    view.status.to_string()
                };
                [
                    view.chart_type.to_string(),
                    view.source_kind.to_string(),
                    status,
                    format_age(view.age_hours),
                    view.last_update_source.to_string(),
                    view.last_error
                        .as_deref()
                        .map_or("-".to_string(), |e| truncate(e, MAX_ERROR_WIDTH)),
                ]
            })
            .collect();

        // Minimum widths = header label lengths
        let mut widths = HEADERS.map(|h| h.chars().count());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        Self { rows, widths }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.push_border(&mut out, '┌', '┬', '┐');
        self.push_row(&mut out, &HEADERS.map(str::to_string));
        self.push_border(&mut out, '├', '┼', '┤');
        for row in &self.rows {
            self.push_row(&mut out, row);
        }
        self.push_border(&mut out, '└', '┴', '┘');
        out
    }

    fn push_border(&self, out: &mut String, left: char, mid: char, right: char) {
        out.push(left);
        for (i, width) in self.widths.iter().enumerate() {
            if i > 0 {
                out.push(mid);
            }
            out.push_str(&"─".repeat(width + 2));
        }
        out.push(right);
        out.push('\n');
    }

    fn push_row(&self, out: &mut String, cells: &[String; 6]) {
        out.push('│');
        for (cell, width) in cells.iter().zip(self.widths) {
            let pad = width - cell.chars().count();
            let _ = write!(out, " {}{} │", cell, " ".repeat(pad));
        }
        out.push('\n');
    }
}

/// Truncate to `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
