//! Formatting utilities for table output and age display

use chrono::{DateTime, Utc};

/// Format a timestamp as a human-readable age (e.g., "2d", "5h", "30m", "15s")
pub fn format_age(timestamp: &DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(*timestamp);

    let total_secs = duration.num_seconds();
    if total_secs < 0 {
        return "0s".to_string();
    }

    let days = duration.num_days();
    if days > 0 {
        return format!("{}d", days);
    }

    let hours = duration.num_hours();
    if hours > 0 {
        return format!("{}h", hours);
    }

    let minutes = duration.num_minutes();
    if minutes > 0 {
        return format!("{}m", minutes);
    }

    format!("{}s", total_secs)
}

/// Age of an optional timestamp, `-` when unset
pub fn format_optional_age(timestamp: Option<&DateTime<Utc>>) -> String {
    timestamp.map(format_age).unwrap_or_else(|| "-".to_string())
}

/// Percentage with one decimal, `-` when unknown
pub fn format_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v))
        .unwrap_or_else(|| "-".to_string())
}

/// Allocated over total, e.g. `1.5/4`
pub fn format_ratio(allocated: f64, total: f64) -> String {
    format!("{}/{}", trim_float(allocated), trim_float(total))
}

/// Two decimals at most, trailing zeros dropped
pub fn trim_float(value: f64) -> String {
    let s = format!("{:.2}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Render rows as a column-aligned table with headers.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let num_cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < num_cols {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let render_line = |cells: Vec<&str>| -> String {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = w)
            })
            .collect();
        format!("{}\n", line.join("  ").trim_end())
    };

    let mut out = render_line(headers.to_vec());
    for row in rows {
        out.push_str(&render_line(row.iter().map(String::as_str).collect()));
    }
    out
}

/// Render `label: value` pairs with aligned values
pub fn render_fields(fields: &[(&str, String)]) -> String {
    let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 1;
    fields
        .iter()
        .map(|(k, v)| format!("{:<width$} {}\n", format!("{}:", k), v, width = width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age_seconds() {
        let ts = Utc::now() - Duration::seconds(45);
        assert_eq!(format_age(&ts), "45s");
    }

    #[test]
    fn test_format_age_hours() {
        let ts = Utc::now() - Duration::hours(3);
        assert_eq!(format_age(&ts), "3h");
    }

    #[test]
    fn test_format_age_days() {
        let ts = Utc::now() - Duration::days(7);
        assert_eq!(format_age(&ts), "7d");
    }

    #[test]
    fn test_format_age_future_timestamp() {
        let ts = Utc::now() + Duration::hours(1);
        assert_eq!(format_age(&ts), "0s");
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(format_optional_age(None), "-");
        assert_eq!(format_percent(None), "-");
        assert_eq!(format_percent(Some(33.333)), "33.3%");
    }

    #[test]
    fn floats_drop_trailing_zeros() {
        assert_eq!(trim_float(4.0), "4");
        assert_eq!(trim_float(1.5), "1.5");
        assert_eq!(trim_float(0.126), "0.13");
        assert_eq!(format_ratio(1.5, 4.0), "1.5/4");
    }

    #[test]
    fn table_columns_align() {
        let out = render_table(
            &["NAME", "STATUS"],
            &[
                vec!["worker-1".to_string(), "ACTIVE".to_string()],
                vec!["w2".to_string(), "NOT_READY".to_string()],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "NAME      STATUS");
        assert_eq!(lines[1], "worker-1  ACTIVE");
        assert_eq!(lines[2], "w2        NOT_READY");
    }

    #[test]
    fn empty_table_prints_headers() {
        assert_eq!(render_table(&["NAME", "STATUS"], &[]), "NAME  STATUS\n");
    }

    #[test]
    fn fields_align_values() {
        let out = render_fields(&[("Name", "worker-1".to_string()), ("Status", "ACTIVE".to_string())]);
        assert_eq!(out, "Name:   worker-1\nStatus: ACTIVE\n");
    }
}
