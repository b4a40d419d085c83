//! Column standardization for demographic, age and date fields
//!
//! Column selection follows the naming convention of the cleaned datasets:
//! a column is a race column if one of its `_`-separated parts is `race` or
//! `ethnicity`, a gender column if a part is `gender` or `sex`, and so on.

use crate::error::{CleaningError, Result};
use crate::table::Table;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Race {
    White,
    Black,
    Hispanic,
    Other,
}

impl Race {
    pub fn as_str(&self) -> &'static str {
        match self {
            Race::White => "WHITE",
            Race::Black => "BLACK",
            Race::Hispanic => "HISPANIC",
            Race::Other => "OTHER",
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values a conversion pass could not interpret and replaced with missing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnReport {
    pub column: String,
    pub replaced: usize,
    pub bad_values: BTreeSet<String>,
}

impl ColumnReport {
    fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ..Self::default()
        }
    }

    fn reject(&mut self, value: &str) {
        self.replaced += 1;
        self.bad_values.insert(value.to_string());
    }
}

pub fn upcase_strip(value: &str) -> String {
    value.trim().to_uppercase()
}

pub fn standardize_race(race: Option<&str>) -> Option<Race> {
    let race = race.filter(|r| !r.is_empty())?.to_lowercase();

    if race.contains("anglo") || race.contains("white") || race.contains("caucasian") || race == "ao" {
        Some(Race::White)
    } else if race.contains("black") || race.contains("african") {
        Some(Race::Black)
    } else if (race.contains("hispanic") || race.contains("latino"))
        && !race.contains("non hispanic")
        && !race.contains("not hispanic")
    {
        Some(Race::Hispanic)
    } else {
        Some(Race::Other)
    }
}

pub fn standardize_gender(gender: Option<&str>) -> Result<Option<Gender>> {
    let Some(gender) = gender else {
        return Ok(None);
    };
    match gender.trim().to_lowercase().as_str() {
        "" | "u" => Ok(None),
        "m" | "male" | "man" => Ok(Some(Gender::Male)),
        "f" | "female" | "woman" => Ok(Some(Gender::Female)),
        other => Err(CleaningError::UnrecognizedGender(other.to_string())),
    }
}

/// Keep alphanumerics and dashes within each word, collapse whitespace
pub fn standardize_name(name: Option<&str>) -> Option<String> {
    let cleaned = name?
        .split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn race_columns(table: &Table) -> Vec<String> {
    table.columns_where(|parts| parts.contains(&"race") || parts.contains(&"ethnicity"))
}

pub fn gender_columns(table: &Table) -> Vec<String> {
    table.columns_where(|parts| parts.contains(&"gender") || parts.contains(&"sex"))
}

pub fn age_columns(table: &Table) -> Vec<String> {
    table.columns_where(|parts| parts.contains(&"age"))
}

/// `date` columns, minus the "n/a" flag columns that sit next to them
pub fn date_columns(table: &Table) -> Vec<String> {
    table
        .columns_where(|parts| parts.contains(&"date") && !parts.contains(&"na"))
        .into_iter()
        .filter(|c| !c.contains("_n_a"))
        .collect()
}

pub fn standardize_race_cols(table: &mut Table) -> Result<()> {
    for column in race_columns(table) {
        table.map_column(&column, |cell| standardize_race(cell).map(|r| r.to_string()))?;
    }
    Ok(())
}

pub fn standardize_gender_cols(table: &mut Table) -> Result<()> {
    for column in gender_columns(table) {
        table.try_map_column(&column, |cell| Ok(standardize_gender(cell)?.map(|g| g.to_string())))?;
    }
    Ok(())
}

pub fn numericalize_age_cols(table: &mut Table) -> Result<Vec<ColumnReport>> {
    let mut reports = Vec::new();
    for column in age_columns(table) {
        info!(column = %column, "Numericalizing column");
        let mut report = ColumnReport::new(&column);
        table.map_column(&column, |cell| {
            let value = cell?;
            match value.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Some(n.to_string()),
                _ => {
                    report.reject(value);
                    None
                },
            }
        })?;
        log_report(&report, "NA");
        reports.push(report);
    }
    Ok(reports)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

// Two-digit years first: `%Y` would happily read "19" as year 19.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Parse the date spellings found in the raw sheets
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// ISO date, with the time only when it is not midnight
pub fn format_date(ts: NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

pub fn convert_date_cols(table: &mut Table) -> Result<Vec<ColumnReport>> {
    let mut reports = Vec::new();
    for column in date_columns(table) {
        info!(column = %column, "Converting column to date");
        let mut report = ColumnReport::new(&column);
        table.map_column(&column, |cell| {
            let value = cell?;
            match parse_date(value) {
                Some(ts) => Some(format_date(ts)),
                None => {
                    report.reject(value);
                    None
                },
            }
        })?;
        log_report(&report, "NaT");
        reports.push(report);
    }
    Ok(reports)
}

fn log_report(report: &ColumnReport, missing: &str) {
    if report.replaced > 0 {
        info!(
            column = %report.column,
            "Replaced {} bad values with {}. Unique bad values: {:?}",
            report.replaced,
            missing,
            report.bad_values
        );
    }
}

/// The usual first pass over a raw sheet export
pub fn standardize_all(table: &mut Table) -> Result<Vec<ColumnReport>> {
    table.upcase_strip_string_cells();
    standardize_race_cols(table)?;
    standardize_gender_cols(table)?;
    let mut reports = numericalize_age_cols(table)?;
    reports.extend(convert_date_cols(table)?);
    Ok(reports)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_race() {
        let cases = [
            ("White", Some(Race::White)),
            ("ANGLO", Some(Race::White)),
            ("ao", Some(Race::White)),
            ("Black or African American", Some(Race::Black)),
            ("Hispanic", Some(Race::Hispanic)),
            ("latino", Some(Race::Hispanic)),
            ("Non Hispanic", Some(Race::Other)),
            ("not hispanic or latino", Some(Race::Other)),
            ("Asian", Some(Race::Other)),
        ];
        for (input, expected) in cases {
            assert_eq!(standardize_race(Some(input)), expected, "{input}");
        }
        assert_eq!(standardize_race(Some("")), None);
        assert_eq!(standardize_race(None), None);
    }

    #[test]
    fn test_gender() {
        assert_eq!(standardize_gender(Some(" M ")).unwrap(), Some(Gender::Male));
        assert_eq!(standardize_gender(Some("Woman")).unwrap(), Some(Gender::Female));
        assert_eq!(standardize_gender(Some("U")).unwrap(), None);
        assert_eq!(standardize_gender(Some("  ")).unwrap(), None);
        assert_eq!(standardize_gender(None).unwrap(), None);
        assert!(matches!(
            standardize_gender(Some("X")),
            Err(CleaningError::UnrecognizedGender(ref g)) if g == "x"
        ));
    }

    #[test]
    fn test_name() {
        assert_eq!(standardize_name(Some("  John  O'Neil-Smith, Jr. ")).as_deref(), Some("John ONeil-Smith Jr"));
        assert_eq!(standardize_name(Some(" ,. ")), None);
        assert_eq!(standardize_name(None), None);
    }

    #[test]
    fn test_column_selection() {
        let table = Table::new([
            "race",
            "officer_race",
            "racetrack",
            "sex",
            "age_at_time_of_death",
            "stage",
            "death_date",
            "death_date_n_a",
            "date_na",
        ]);
        assert_eq!(race_columns(&table), vec!["race", "officer_race"]);
        assert_eq!(gender_columns(&table), vec!["sex"]);
        assert_eq!(age_columns(&table), vec!["age_at_time_of_death"]);
        assert_eq!(date_columns(&table), vec!["death_date"]);
    }

    #[test]
    fn test_dates() {
        let parse = |s| parse_date(s).map(format_date);
        assert_eq!(parse("2019-03-04").as_deref(), Some("2019-03-04"));
        assert_eq!(parse("3/4/2019").as_deref(), Some("2019-03-04"));
        assert_eq!(parse("03/04/19").as_deref(), Some("2019-03-04"));
        assert_eq!(parse("March 4, 2019").as_deref(), Some("2019-03-04"));
        assert_eq!(parse("2019-03-04 13:45:00").as_deref(), Some("2019-03-04 13:45:00"));
        assert_eq!(parse("3/4/2019 1:45 PM").as_deref(), Some("2019-03-04 13:45:00"));
        assert_eq!(parse("unknown"), None);
    }

    #[test]
    fn test_numericalize_reports_bad_values() {
        let mut table = Table::new(["age", "name"]);
        for age in [Some("34"), Some("unknown"), None, Some("41.5"), Some("unknown")] {
            table
                .push_row(vec![age.map(str::to_string), Some("x".to_string())])
                .unwrap();
        }

        let reports = numericalize_age_cols(&mut table).unwrap();

        assert_eq!(
            table.column("age").unwrap(),
            vec![Some("34"), None, None, Some("41.5"), None]
        );
        assert_eq!(reports[0].replaced, 2);
        assert_eq!(reports[0].bad_values.iter().collect::<Vec<_>>(), vec!["unknown"]);
    }

    #[test]
    fn test_standardize_all() {
        let csv = "name,race,sex,age,death_date\n bob ,white,m,40,1/2/2020\n";
        let mut table = Table::from_reader(csv.as_bytes()).unwrap();

        let reports = standardize_all(&mut table).unwrap();

        assert_eq!(
            table.rows()[0],
            vec![
                Some("BOB".to_string()),
                Some("WHITE".to_string()),
                Some("MALE".to_string()),
                Some("40".to_string()),
                Some("2020-01-02".to_string()),
            ]
        );
        assert!(reports.iter().all(|r| r.replaced == 0));
    }

    #[test]
    fn test_unrecognized_gender_fails_pass() {
        let mut table = Table::from_reader("sex\nm\nalien\n".as_bytes()).unwrap();
        assert!(standardize_gender_cols(&mut table).is_err());
    }
}
