use std::borrow::Cow;
use std::fmt::Write as _;

use crate::schema::ColumnSchema;

const SCHEMA_HEADERS: [&str; 6] = [
    "CSV Name",
    "SQL Name",
    "Inferred Type",
    "Nullable",
    "Value Range",
    "Optimal SQL Type",
];

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");
    let _ = writeln!(output, "{}", "-".repeat(display_width(&header_line)));

    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

/// Formats inferred columns as an aligned text table.
pub fn schema_as_table(columns: &[ColumnSchema]) -> String {
    if columns.is_empty() {
        return "No schema records to display.".to_string();
    }
    let headers = SCHEMA_HEADERS.map(str::to_string);
    let rows = columns
        .iter()
        .map(|column| {
            vec![
                column.csv_name.clone(),
                column.sql_name.clone(),
                column.frame_type.to_string(),
                if column.is_nullable { "Yes" } else { "No" }.to_string(),
                column
                    .value_range
                    .map_or_else(|| "N/A".to_string(), |range| range.to_string()),
                column.sql_declaration(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

/// Prefixes every non-empty line with an SQL line comment marker.
pub fn comment_lines(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if !line.trim_end_matches(['\n', '\r']).is_empty() {
            output.push_str("-- ");
        }
        output.push_str(line);
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join(" | ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

// Headers with embedded newlines would break the commented report.
fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FrameType, ValueRange};

    #[test]
    fn schema_table_aligns_columns() {
        let columns = vec![
            ColumnSchema::new(
                "PATNO",
                "patno",
                FrameType::Int64,
                false,
                Some(ValueRange::Integer { min: 3000, max: 4000 }),
            ),
            ColumnSchema::new("Event ID", "event_id", FrameType::String, true, None),
        ];
        let rendered = schema_as_table(&columns);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "CSV Name | SQL Name | Inferred Type | Nullable | Value Range    | Optimal SQL Type"
        );
        assert_eq!(lines[1], "-".repeat(lines[0].chars().count()));
        assert_eq!(
            lines[2],
            "PATNO    | patno    | Int64         | No       | (3000 to 4000) | SMALLINT NOT NULL"
        );
        assert_eq!(
            lines[3],
            "Event ID | event_id | String        | Yes      | N/A            | TEXT NULL"
        );
    }

    #[test]
    fn empty_schema_has_placeholder_text() {
        assert_eq!(schema_as_table(&[]), "No schema records to display.");
    }

    #[test]
    fn comments_skip_blank_lines() {
        assert_eq!(comment_lines("a\n\nb\n"), "-- a\n\n-- b\n");
    }

    #[test]
    fn multiline_cells_are_flattened() {
        let rendered = render_table(&["h".to_string()], &[vec!["x\ny".to_string()]]);
        assert!(rendered.contains("x y"));
    }
}
