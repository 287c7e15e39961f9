//! Plain-text table rendering.

use std::collections::HashMap;

use csv_query::Row;
use unicode_width::UnicodeWidthStr;

pub const EMPTY_RESULT: &str = "nothing to print";

/// Render `rows` as a table with one centred column per `selected` name.
///
/// Each column is `widths[name] + 2` cells wide. When text cannot be split
/// evenly, the extra space goes on the right.
///
/// ```text
/// =========================
/// | location |    date    |
/// =========================
/// |  Russia  | 2020-04-20 |
/// =========================
/// ```
pub fn render_table(selected: &[String], widths: &HashMap<String, usize>, rows: &[Row]) -> String {
    if rows.is_empty() {
        return format!("{EMPTY_RESULT}\n");
    }

    let column_width = |name: &str| widths.get(name).copied().unwrap_or(name.width()) + 2;

    let header = render_line(selected.iter().map(|name| (name.as_str(), column_width(name))));
    let rule = "=".repeat(header.width());

    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&header);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for row in rows {
        let line = render_line(
            selected
                .iter()
                .map(|name| (row.get(name).unwrap_or_default(), column_width(name))),
        );
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

fn render_line<'a>(cells: impl Iterator<Item = (&'a str, usize)>) -> String {
    let mut line = String::from("|");
    for (text, width) in cells {
        let pad = width.saturating_sub(text.width());
        let left = pad / 2;
        line.push_str(&" ".repeat(left));
        line.push_str(text);
        line.push_str(&" ".repeat(pad - left));
        line.push('|');
    }
    line
}
