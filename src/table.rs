use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::record::Record;
use crate::schema::{ColumnMap, FieldRole};

const RECORD_COLUMNS: [(FieldRole, &str); 7] = [
    (FieldRole::Identifier, "code"),
    (FieldRole::LocalityName, "locality"),
    (FieldRole::LocalityKind, "kind"),
    (FieldRole::Address, "address"),
    (FieldRole::ContactName, "contact"),
    (FieldRole::Phone, "phone"),
    (FieldRole::Email, "email"),
];

/// Renders candidates with one column per field that at least one record
/// fills in.
pub fn render_records(records: &[Arc<Record>]) -> String {
    let columns: Vec<(FieldRole, &str)> = RECORD_COLUMNS
        .iter()
        .copied()
        .filter(|(role, _)| records.iter().any(|r| r.fields().get(*role).is_some()))
        .collect();
    let headers: Vec<String> = columns.iter().map(|(_, label)| label.to_string()).collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|(role, _)| record.fields().get(*role).unwrap_or("").to_string())
                .collect()
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn render_column_map(map: &ColumnMap, headers: &[String]) -> String {
    let rows: Vec<Vec<String>> = map
        .bindings()
        .map(|(role, binding)| {
            vec![
                role.to_string(),
                binding.index.to_string(),
                headers.get(binding.index).cloned().unwrap_or_default(),
                match binding.source {
                    crate::schema::ColumnSource::Keyword => "keyword".to_string(),
                    crate::schema::ColumnSource::Positional => "position".to_string(),
                },
            ]
        })
        .collect();
    let headers = ["role", "column", "header", "matched_by"].map(String::from);
    render_table(&headers, &rows)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordFields;

    #[test]
    fn render_records_skips_empty_columns() {
        let record = Record::from_fields(RecordFields {
            identifier: Some("8369/067".to_string()),
            locality_name: Some("Аксарка".to_string()),
            phone: Some("8-909-198-88-42".to_string()),
            ..RecordFields::default()
        })
        .expect("record");
        let rendered = render_records(&[Arc::new(record)]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "code      locality  phone");
        assert_eq!(lines[2], "8369/067  Аксарка   8-909-198-88-42");
    }

    #[test]
    fn render_table_flattens_control_characters() {
        let headers = vec!["note".to_string()];
        let rows = vec![vec!["line1\nline2\tvalue".to_string()]];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "line1 line2 value");
    }
}
