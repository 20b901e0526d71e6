use lazy_static::lazy_static;
use regex::Regex;
use time::macros::format_description;
use time::Date;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"https?://\S+").unwrap();
    static ref TITLE_SUFFIX_RE: Regex = Regex::new(r"\s*\|.*$").unwrap();
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops embedded URLs, then collapses whitespace.
pub fn sanitize_text(text: &str) -> String {
    collapse_whitespace(&URL_RE.replace_all(text, " "))
}

/// Page titles lose their `" | Site name"` suffix. `None` when nothing is left.
pub fn sanitize_title(title: &str) -> Option<String> {
    let title = sanitize_text(title);
    let title = TITLE_SUFFIX_RE.replace(&title, "").trim().to_string();
    (!title.is_empty()).then_some(title)
}

/// Optional API string field that must carry text to count as present.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(sanitize_text).filter(|text| !text.is_empty())
}

/// Leading `YYYY-MM-DD` of an ISO 8601 date or timestamp.
pub fn parse_iso_date(text: &str) -> Option<Date> {
    let day = text.trim().get(..10)?;
    Date::parse(day, format_description!("[year]-[month]-[day]")).ok()
}

/// E-utilities publication dates: `2023 Jan 15`, `2023 Jan` or `2023`. Missing parts default to
/// the first month or day.
pub fn parse_pubmed_date(text: &str) -> Option<Date> {
    let mut parts = text.split_whitespace();
    let year: i32 = parts.next()?.parse().ok()?;
    let month = match parts.next() {
        Some(name) => {
            let name = name.get(..3)?;
            Date::parse(
                &format!("{year} {name} 01"),
                format_description!("[year] [month repr:short] [day]"),
            )
            .ok()?
            .month()
        }
        None => time::Month::January,
    };
    let day = parts.next().and_then(|d| d.parse::<u8>().ok()).unwrap_or(1);
    Date::from_calendar_date(year, month, day).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn urls_and_spacing_are_removed() {
        assert_eq!(
            sanitize_text("  See   https://example.org/x?y=1 for\n\tdetails "),
            "See for details"
        );
    }

    #[test]
    fn title_suffix_is_dropped() {
        assert_eq!(sanitize_title("Breast cancer | Cancer Research UK").as_deref(), Some("Breast cancer"));
        assert_eq!(sanitize_title(" | only suffix"), None);
        assert_eq!(sanitize_title("   "), None);
    }

    #[test]
    fn empty_fields_are_absent() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" a  b ")).as_deref(), Some("a b"));
    }

    #[test]
    fn iso_dates() {
        let date = parse_iso_date("2024-03-07T18:00:00Z").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, Month::March, 7));
        assert_eq!(parse_iso_date("2024-03"), None);
        assert_eq!(parse_iso_date("not a date"), None);
    }

    #[test]
    fn pubmed_dates() {
        let date = parse_pubmed_date("2023 Jan 15").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2023, Month::January, 15));
        let date = parse_pubmed_date("2022 Sep").unwrap();
        assert_eq!((date.month(), date.day()), (Month::September, 1));
        assert_eq!(parse_pubmed_date("2021").unwrap().year(), 2021);
        assert_eq!(parse_pubmed_date("soon"), None);
    }
}
