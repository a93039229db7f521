//! Monospace preview of an uploaded table, with one report target per
//! identifiable row.

use std::fmt;

use serde::Serialize;

use crate::fields::ColumnMap;
use crate::uploads::UploadedTable;

pub const MAX_PREVIEW_ROWS: usize = 20;
const LABEL_LEN: usize = 12;
const HIDDEN_MARKERS: &[&str] = &["id", "applicat"];

/// A row that can be turned into a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTarget {
    pub row: usize,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TablePreview {
    pub file_name: String,
    pub lines: Vec<String>,
    pub shown_rows: usize,
    pub total_rows: usize,
    pub columns: usize,
    pub targets: Vec<ReportTarget>,
    /// `"Name"` or `"ID"`, depending on which column labels the targets.
    pub target_kind: Option<&'static str>,
}

impl TablePreview {
    pub fn build(table: &UploadedTable) -> Self {
        let visible: Vec<&String> = table
            .headers
            .iter()
            .filter(|h| {
                let lower = h.to_lowercase();
                !HIDDEN_MARKERS.iter().any(|m| lower.contains(m))
            })
            .collect();

        let shown = &table.rows[..table.rows.len().min(MAX_PREVIEW_ROWS)];
        let mut lines = Vec::with_capacity(shown.len() + 2);

        if !shown.is_empty() {
            lines.push(
                visible
                    .iter()
                    .map(|h| pad(&take_chars(h, column_width(h)), column_width(h)))
                    .collect::<Vec<_>>()
                    .join("│"),
            );
            lines.push(
                visible
                    .iter()
                    .map(|h| "─".repeat(column_width(h)))
                    .collect::<Vec<_>>()
                    .join("┼"),
            );
            for row in shown {
                lines.push(
                    visible
                        .iter()
                        .map(|h| {
                            let value = row.get(h.as_str()).map(String::as_str).unwrap_or("");
                            fit_cell(value, column_width(h))
                        })
                        .collect::<Vec<_>>()
                        .join("│"),
                );
            }
        }

        let columns = ColumnMap::resolve(&table.headers);
        let targets: Vec<ReportTarget> = match columns.identity() {
            Some(identity) => shown
                .iter()
                .enumerate()
                .filter_map(|(i, row)| {
                    let value = row.get(identity).filter(|v| !v.is_empty())?;
                    Some(ReportTarget {
                        row: i,
                        label: short_label(value),
                    })
                })
                .collect(),
            None => Vec::new(),
        };
        let target_kind = match (&columns.name, targets.is_empty()) {
            (_, true) => None,
            (Some(_), false) => Some("Name"),
            (None, false) => Some("ID"),
        };

        TablePreview {
            file_name: table.file_name.clone(),
            lines,
            shown_rows: shown.len(),
            total_rows: table.rows.len(),
            columns: visible.len(),
            targets,
            target_kind,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.total_rows > self.shown_rows
    }
}

impl fmt::Display for TablePreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📄 {}", self.file_name)?;
        writeln!(f)?;

        if self.total_rows == 0 {
            return write!(f, "Keine Daten in dieser CSV-Datei gefunden.");
        }

        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }

        writeln!(f)?;
        writeln!(f, "📊 Zusammenfassung:")?;
        write!(f, "• Zeilen: {}", self.shown_rows)?;
        if self.is_truncated() {
            write!(f, " von {}", self.total_rows)?;
        }
        writeln!(f)?;
        write!(f, "• Spalten: {}", self.columns)?;

        if self.is_truncated() {
            write!(
                f,
                "\n\n⚠️ Erste {} Zeilen für mobile Lesbarkeit angezeigt",
                MAX_PREVIEW_ROWS
            )?;
        }
        if let Some(kind) = self.target_kind {
            write!(f, "\n\n📋 Bericht verfügbar pro {}", kind)?;
        }
        Ok(())
    }
}

fn column_width(header: &str) -> usize {
    let lower = header.to_lowercase();
    if lower.contains("name") {
        15
    } else if lower.contains("time") {
        20
    } else {
        8
    }
}

fn take_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn pad(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}

fn fit_cell(value: &str, width: usize) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '`' | '*' | '_' | '~' | '\n' | '\r' => ' ',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > width {
        format!("{}...", take_chars(cleaned, width.saturating_sub(3)))
    } else {
        pad(cleaned, width)
    }
}

fn short_label(value: &str) -> String {
    if value.chars().count() > LABEL_LEN {
        format!("{}...", take_chars(value, LABEL_LEN))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_table() -> UploadedTable {
        UploadedTable {
            file_name: "results.csv".to_string(),
            headers: vec![
                "Sample_ID".to_string(),
                "Name".to_string(),
                "THC".to_string(),
                "Timestamp".to_string(),
                "Application".to_string(),
            ],
            rows: vec![
                row(&[
                    ("Sample_ID", "17"),
                    ("Name", "Lemon Haze Batch 7"),
                    ("THC", "18.5"),
                    ("Timestamp", "2024-03-01 10:00:00"),
                    ("Application", "x"),
                ]),
                row(&[("Sample_ID", "18"), ("Name", ""), ("THC", "2*1")]),
            ],
        }
    }

    #[test]
    fn test_hidden_columns_and_widths() {
        let preview = TablePreview::build(&sample_table());

        assert_eq!(preview.columns, 3);
        assert_eq!(
            preview.lines[0],
            format!("{:<15}│{:<8}│{:<20}", "Name", "THC", "Timestamp")
        );
        assert_eq!(
            preview.lines[1],
            format!("{}┼{}┼{}", "─".repeat(15), "─".repeat(8), "─".repeat(20))
        );
    }

    #[test]
    fn test_long_cells_are_cut() {
        let preview = TablePreview::build(&sample_table());

        assert_eq!(
            preview.lines[2],
            format!("Lemon Haze B...│{:<8}│{:<20}", "18.5", "2024-03-01 10:00:00")
        );
        assert_eq!(
            preview.lines[3],
            format!("{:<15}│{:<8}│{:<20}", "", "2 1", "")
        );
    }

    #[test]
    fn test_targets_use_name_column() {
        let preview = TablePreview::build(&sample_table());

        assert_eq!(
            preview.targets,
            vec![ReportTarget {
                row: 0,
                label: "Lemon Haze B...".to_string(),
            }]
        );
        assert_eq!(preview.target_kind, Some("Name"));
    }

    #[test]
    fn test_targets_fall_back_to_id_column() {
        let table = UploadedTable {
            file_name: "ids.csv".to_string(),
            headers: vec!["ID".to_string(), "CBD".to_string()],
            rows: vec![row(&[("ID", "A-1"), ("CBD", "0.7")])],
        };
        let preview = TablePreview::build(&table);

        assert_eq!(preview.columns, 1);
        assert_eq!(preview.targets[0].label, "A-1");
        assert_eq!(preview.target_kind, Some("ID"));
    }

    #[test]
    fn test_preview_is_limited_to_twenty_rows() {
        let table = UploadedTable {
            file_name: "many.csv".to_string(),
            headers: vec!["THC".to_string()],
            rows: (0..25)
                .map(|i| row(&[("THC", i.to_string().as_str())]))
                .collect(),
        };
        let preview = TablePreview::build(&table);

        assert_eq!(preview.shown_rows, 20);
        assert_eq!(preview.lines.len(), 22);
        assert!(preview.targets.is_empty());

        let text = preview.to_string();
        assert!(text.contains("• Zeilen: 20 von 25"));
        assert!(text.contains("Erste 20 Zeilen"));
    }

    #[test]
    fn test_empty_table_message() {
        let table = UploadedTable {
            file_name: "empty.csv".to_string(),
            headers: vec!["Name".to_string()],
            rows: Vec::new(),
        };
        let text = TablePreview::build(&table).to_string();
        assert_eq!(text, "📄 empty.csv\n\nKeine Daten in dieser CSV-Datei gefunden.");
    }
}
