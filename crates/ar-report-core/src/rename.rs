//! Date-shifting rename for downloaded reports.
//!
//! The portal stamps the generation date into the filename as
//! `<MonthName> <YYYY> <DD>`. The report actually covers the previous day, so
//! the token is moved back one calendar day and the name gets an `AR ` prefix.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

pub const ARTIFACT_PREFIX: &str = "AR ";

/// Years that fit the four-digit token layout.
const TOKEN_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+) (\d{4}) (\d{2})").expect("Invalid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateToken {
    pub month_name: String,
    pub year: String,
    pub day: String,
}

impl DateToken {
    /// The calendar date, if the triple names one. Month names must be spelled
    /// out in full (any case) and the year must be at least 1.
    pub fn date(&self) -> Option<NaiveDate> {
        let input = format!("{} {} {}", self.day, self.month_name, self.year);
        let date = NaiveDate::parse_from_str(&input, "%d %B %Y")
            .ok()
            .filter(|date| TOKEN_YEARS.contains(&date.year()))?;
        let full_name = date.format("%B").to_string();
        full_name
            .eq_ignore_ascii_case(&self.month_name)
            .then_some(date)
    }
}

/// Why a filename kept its original name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilenameParseFailure {
    #[error("no date token in filename")]
    NoToken,
    #[error("date token {0:?} is not a valid calendar date")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed {
    pub file_name: String,
    pub matched: bool,
    pub failure: Option<FilenameParseFailure>,
}

/// Finds the first `<Letters> <YYYY> <DD>` substring.
pub fn find_date_token(filename: &str) -> Option<(Range<usize>, DateToken)> {
    let captures = DATE_TOKEN.captures(filename)?;
    let whole = captures.get(0)?;
    Some((
        whole.range(),
        DateToken {
            month_name: captures[1].to_string(),
            year: captures[2].to_string(),
            day: captures[3].to_string(),
        },
    ))
}

/// Formats `date` in the token layout: full month name, year, two-digit day.
pub fn format_token(date: NaiveDate) -> String {
    format!("{} {:04} {:02}", date.format("%B"), date.year(), date.day())
}

/// Returns the artifact name for a downloaded file.
///
/// On success the token is replaced in place by the previous day and the name
/// is prefixed with [`ARTIFACT_PREFIX`]. Otherwise the original name comes
/// back untouched with `matched == false`.
pub fn rename(filename: &str) -> Renamed {
    match shift_back_one_day(filename) {
        Ok(file_name) => Renamed {
            file_name,
            matched: true,
            failure: None,
        },
        Err(failure) => Renamed {
            file_name: filename.to_string(),
            matched: false,
            failure: Some(failure),
        },
    }
}

fn shift_back_one_day(filename: &str) -> Result<String, FilenameParseFailure> {
    let (range, token) = find_date_token(filename).ok_or(FilenameParseFailure::NoToken)?;
    let original = &filename[range.clone()];
    let shifted = token
        .date()
        .and_then(|date| date.pred_opt())
        .filter(|date| TOKEN_YEARS.contains(&date.year()))
        .ok_or_else(|| FilenameParseFailure::InvalidDate(original.to_string()))?;

    Ok(format!(
        "{ARTIFACT_PREFIX}{}{}{}",
        &filename[..range.start],
        format_token(shifted),
        &filename[range.end..]
    ))
}
