use chrono::{Datelike, NaiveDate};

/// Substitutes the date tokens of a file path template.
///
/// `$(YEAR)` 4-digit year, `$(YEAR_DIGIT)` last digit of the year, `$(WEEK)` 2-digit ISO week,
/// `$(MONTH)` and `$(DAY)` 2-digit. Anything else, including unknown `$(...)` tokens, is kept verbatim.
pub fn resolve_path(template: &str, date: NaiveDate) -> String {
    let tokens = [
        ("$(YEAR_DIGIT)", (date.year().rem_euclid(10)).to_string()),
        ("$(YEAR)", format!("{:04}", date.year())),
        ("$(WEEK)", format!("{:02}", date.iso_week().week())),
        ("$(MONTH)", format!("{:02}", date.month())),
        ("$(DAY)", format!("{:02}", date.day())),
    ];
    tokens
        .iter()
        .fold(template.to_owned(), |path, (token, value)| path.replace(token, value))
}
