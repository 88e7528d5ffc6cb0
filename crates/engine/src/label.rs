use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Counts at or above this render as `250+`.
pub const COUNT_DISPLAY_CAP: u64 = 250;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Normalize a raw choice label for display.
///
/// Date-like labels collapse to their four digit year; a label that already is a bare
/// year is returned untouched. Everything else gets its HTML entities decoded.
pub fn format_label(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_bare_year(trimmed) {
        return raw.to_string();
    }
    if let Some(year) = parse_year(trimmed) {
        return format!("{year:04}");
    }
    html_escape::decode_html_entities(raw).into_owned()
}

pub fn format_count(count: u64) -> String {
    if count >= COUNT_DISPLAY_CAP {
        format!("{COUNT_DISPLAY_CAP}+")
    } else {
        count.to_string()
    }
}

/// `"<label> (<count>)"`, as shown next to checkboxes and inside dropdown options.
pub fn option_label(label: &str, count: u64) -> String {
    format!("{label} ({})", format_count(count))
}

/// `research-teams` -> `Research Teams`
pub fn humanize(value: &str) -> String {
    value
        .replace(['-', '_'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase, URL-safe token: runs of anything but `[a-z0-9_]` collapse to a single `-`.
pub fn sanitize_slug(value: &str) -> String {
    let decoded = html_escape::decode_html_entities(value);
    let mut out = String::with_capacity(decoded.len());
    let mut pending_dash = false;
    for ch in decoded.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

fn is_bare_year(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit())
}

fn parse_year(value: &str) -> Option<i32> {
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.year());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.year());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.year());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date.year());
        }
    }
    // Month precision: "2021-06", "June 2021", "Jun 2021".
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d") {
        return Some(date.year());
    }
    for fmt in ["%d %B %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {value}"), fmt) {
            return Some(date.year());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_years_are_returned_unchanged() {
        assert_eq!(format_label("2024"), "2024");
        assert_eq!(format_label("1999"), "1999");
    }

    #[test]
    fn dates_collapse_to_year() {
        assert_eq!(format_label("2023-04-18"), "2023");
        assert_eq!(format_label("2019-11-02 08:15:00"), "2019");
        assert_eq!(format_label("2020-01-01T00:00:00+00:00"), "2020");
        assert_eq!(format_label("June 5, 2018"), "2018");
        assert_eq!(format_label("March 2017"), "2017");
        assert_eq!(format_label("2021-06"), "2021");
    }

    #[test]
    fn year_formatting_is_idempotent() {
        for raw in ["2023-04-18", "June 5, 2018", "2024"] {
            let once = format_label(raw);
            assert_eq!(format_label(&once), once);
        }
    }

    #[test]
    fn non_dates_get_entities_decoded() {
        assert_eq!(format_label("Regions &amp; Countries"), "Regions & Countries");
        assert_eq!(format_label("Politics &#038; Policy"), "Politics & Policy");
        assert_eq!(format_label("Economy"), "Economy");
    }

    #[test]
    fn counts_cap_at_250() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(249), "249");
        assert_eq!(format_count(250), "250+");
        assert_eq!(format_count(9_000), "250+");
        assert_eq!(option_label("Short Reads", 300), "Short Reads (250+)");
    }

    #[test]
    fn humanize_and_slug() {
        assert_eq!(humanize("research-teams"), "Research Teams");
        assert_eq!(humanize("regions_countries"), "Regions Countries");
        assert_eq!(sanitize_slug("Science & Tech"), "science-tech");
        assert_eq!(sanitize_slug("  Short Reads "), "short-reads");
    }
}
