//! Datasheet "Composition" section for a published dataset
//!
//! Summarizes every column of a cleaned table (suggested type, missing and
//! distinct counts) and renders the markdown section that opens a dataset's
//! datasheet, plus the age distribution and sex by race counts used to
//! describe subpopulations.

use crate::error::Result;
use crate::standardize::parse_date;
use crate::table::Table;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    Text,
    /// Every value is missing
    Empty,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Date => "date",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub suggested_type: ColumnType,
    pub missing: usize,
    pub distinct: usize,
}

struct TypeInference {
    integer: Regex,
    float: Regex,
}

impl TypeInference {
    fn new() -> Result<Self> {
        Ok(Self {
            integer: Regex::new(r"^[+-]?\d+$")?,
            float: Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$")?,
        })
    }

    /// Narrowest type every present value fits
    fn infer<'a>(&self, values: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
        let mut values = values.peekable();
        if values.peek().is_none() {
            return ColumnType::Empty;
        }
        if values.clone().all(|v| self.integer.is_match(v.trim())) {
            ColumnType::Integer
        } else if values.clone().all(|v| self.float.is_match(v.trim())) {
            ColumnType::Float
        } else if values.all(|v| parse_date(v).is_some()) {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }
}

pub fn summarize(table: &Table) -> Result<Vec<ColumnSummary>> {
    let inference = TypeInference::new()?;

    table
        .headers()
        .iter()
        .map(|name| {
            let column = table.column(name)?;
            let present = column.iter().flatten().copied();
            let distinct: BTreeSet<&str> = present.clone().collect();
            Ok(ColumnSummary {
                name: name.clone(),
                suggested_type: inference.infer(present),
                missing: column.iter().filter(|v| v.is_none()).count(),
                distinct: distinct.len(),
            })
        })
        .collect()
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Render the markdown "Datasheet: Composition" section.
///
/// `category` names a column whose distinct values are listed in the
/// opening paragraph (e.g. the custody type of a custodial death record).
pub fn render_composition(
    table: &Table,
    summaries: &[ColumnSummary],
    category: Option<&str>,
    as_of: NaiveDate,
) -> Result<String> {
    let mut out = String::from("# Datasheet: Composition\n\n");
    out.push_str("## What do the instances that comprise the dataset represent?\n\n");
    out.push_str(&format!(
        "As of {}, there are {} records in the dataset.",
        as_of.format("%m/%d/%Y"),
        table.len()
    ));

    if let Some(category) = category {
        let values: BTreeSet<&str> = table.column(category)?.into_iter().flatten().collect();
        let listed = values
            .iter()
            .map(|v| format!("`{}`", v))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            " Currently, {} `{}` values exist: {}",
            values.len(),
            category,
            listed
        ));
    }
    out.push_str(&format!("\n\nThe dataset has {} columns.\n\n", table.headers().len()));

    out.push_str("| Column | Description | Suggested Data Type | No. Missing Values | No. Distinct Values |\n");
    out.push_str("|---|---|---|---|---|\n");
    for summary in summaries {
        out.push_str(&format!(
            "| {} | TBD | {} | {} | {} |\n",
            escape_cell(&summary.name),
            summary.suggested_type,
            summary.missing,
            summary.distinct
        ));
    }

    out.push_str("\n## Size\n\n");
    out.push_str(&format!(
        "As of {}, there are {} records in the dataset and each row has {} attributes (columns). See above.\n",
        as_of.format("%Y/%m/%d"),
        table.len(),
        table.headers().len()
    ));
    Ok(out)
}

/// Up to six decimals, trailing zeros dropped
fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Count, mean, sample standard deviation, min, quartiles and max of a
/// column as a two-column markdown table. Non-numeric cells are skipped.
pub fn describe_numeric(table: &Table, column: &str) -> Result<String> {
    let mut values: Vec<f64> = table
        .column(column)?
        .into_iter()
        .flatten()
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let stats: [(&str, f64); 7] = if values.is_empty() {
        [
            ("mean", f64::NAN),
            ("std", f64::NAN),
            ("min", f64::NAN),
            ("25%", f64::NAN),
            ("50%", f64::NAN),
            ("75%", f64::NAN),
            ("max", f64::NAN),
        ]
    } else {
        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if count < 2 {
            f64::NAN
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };
        [
            ("mean", mean),
            ("std", std),
            ("min", values[0]),
            ("25%", quantile(&values, 0.25)),
            ("50%", quantile(&values, 0.5)),
            ("75%", quantile(&values, 0.75)),
            ("max", values[count - 1]),
        ]
    };

    let mut out = format!("|  | {} |\n|---|---|\n| count | {} |\n", escape_cell(column), count);
    for (name, value) in stats {
        out.push_str(&format!("| {} | {} |\n", name, format_number(value)));
    }
    Ok(out)
}

/// Counts of each (`row`, `col`) value pair as a markdown table. Rows with
/// either value missing are left out.
pub fn crosstab(table: &Table, row: &str, col: &str) -> Result<String> {
    let rows = table.column(row)?;
    let cols = table.column(col)?;

    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut row_values = BTreeSet::new();
    let mut col_values = BTreeSet::new();
    for (r, c) in rows.into_iter().zip(cols) {
        if let (Some(r), Some(c)) = (r, c) {
            *counts.entry((r, c)).or_default() += 1;
            row_values.insert(r);
            col_values.insert(c);
        }
    }

    let mut out = format!("| {} |", escape_cell(row));
    for c in &col_values {
        out.push_str(&format!(" {} |", escape_cell(c)));
    }
    out.push_str(&format!("\n|---|{}\n", "---|".repeat(col_values.len())));
    for r in &row_values {
        out.push_str(&format!("| {} |", escape_cell(r)));
        for c in &col_values {
            out.push_str(&format!(" {} |", counts.get(&(*r, *c)).copied().unwrap_or(0)));
        }
        out.push('\n');
    }
    Ok(out)
}

/// Columns that identify subpopulations; any of them may be left out
#[derive(Debug, Clone, Copy, Default)]
pub struct Subpopulations<'a> {
    pub age: Option<&'a str>,
    pub sex: Option<&'a str>,
    pub race: Option<&'a str>,
}

impl Subpopulations<'_> {
    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.sex.is_none() && self.race.is_none()
    }
}

/// Render the "Subpopulation identification" section: the age distribution
/// and, when both are given, sex by race counts.
pub fn render_subpopulations(table: &Table, columns: Subpopulations<'_>) -> Result<String> {
    let mut named = Vec::new();
    if let Some(age) = columns.age {
        named.push(format!("age (`{}`)", age));
    }
    if let Some(sex) = columns.sex {
        named.push(format!("gender (`{}`)", sex));
    }
    if let Some(race) = columns.race {
        let values: BTreeSet<&str> = table.column(race)?.into_iter().flatten().collect();
        let listed = values.iter().map(|v| format!("`{}`", v)).collect::<Vec<_>>().join(", ");
        named.push(format!("race (`{}`: {})", race, listed));
    }

    let mut out = String::from("## Subpopulation identification\n\n");
    out.push_str(&format!(
        "The dataset identifies subpopulations by {}. Their respective distributions are the following:\n\n",
        named.join(", ")
    ));
    if let Some(age) = columns.age {
        out.push_str(&describe_numeric(table, age)?);
        out.push('\n');
    }
    if let (Some(sex), Some(race)) = (columns.sex, columns.race) {
        out.push_str(&crosstab(table, sex, race)?);
        out.push('\n');
    }
    out.push_str("Note that the identification of gender and race are NOT based on self-reporting.\n");
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_reader(
            "name,age,weight,death_date,type_of_custody\n\
             A,34,70.5,2019-01-02,JAIL\n\
             B,,80,2019-02-03,PRISON\n\
             C,51,,not a date,JAIL\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_summarize_infers_types() {
        let summaries = summarize(&sample()).unwrap();
        let types: Vec<ColumnType> = summaries.iter().map(|s| s.suggested_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Text,
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Text,
                ColumnType::Text,
            ]
        );
        assert_eq!(summaries[1].missing, 1);
        assert_eq!(summaries[4].distinct, 2);
    }

    #[test]
    fn test_date_and_empty_columns() {
        let table = Table::from_reader("d,e\n1/2/2020,\n2020-03-04,\n".as_bytes()).unwrap();
        let summaries = summarize(&table).unwrap();
        assert_eq!(summaries[0].suggested_type, ColumnType::Date);
        assert_eq!(summaries[1].suggested_type, ColumnType::Empty);
        assert_eq!(summaries[1].missing, 2);
    }

    #[test]
    fn test_render_composition() {
        let table = sample();
        let summaries = summarize(&table).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();

        let markdown = render_composition(&table, &summaries, Some("type_of_custody"), as_of).unwrap();

        assert!(markdown.starts_with("# Datasheet: Composition\n"));
        assert!(markdown.contains("As of 02/01/2020, there are 3 records in the dataset."));
        assert!(markdown.contains("Currently, 2 `type_of_custody` values exist: `JAIL`, `PRISON`"));
        assert!(markdown.contains("| age | TBD | integer | 1 | 2 |"));
        assert!(markdown.contains("each row has 5 attributes"));
    }

    #[test]
    fn test_unknown_category_column() {
        let table = sample();
        assert!(render_composition(&table, &[], Some("nope"), NaiveDate::MIN).is_err());
    }

    fn people() -> Table {
        Table::from_reader(
            "age,sex,race\n\
             20,MALE,WHITE\n\
             30,MALE,BLACK\n\
             40,FEMALE,WHITE\n\
             50,MALE,WHITE\n\
             ,,WHITE\n\
             UNKNOWN,MALE,\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_describe_numeric() {
        let markdown = describe_numeric(&people(), "age").unwrap();
        let lines: Vec<&str> = markdown.lines().collect();
        assert_eq!(
            lines,
            vec![
                "|  | age |",
                "|---|---|",
                "| count | 4 |",
                "| mean | 35 |",
                "| std | 12.909944 |",
                "| min | 20 |",
                "| 25% | 27.5 |",
                "| 50% | 35 |",
                "| 75% | 42.5 |",
                "| max | 50 |",
            ]
        );
    }

    #[test]
    fn test_describe_single_and_empty() {
        let table = Table::from_reader("age,other\n7,\n,\n".as_bytes()).unwrap();
        let single = describe_numeric(&table, "age").unwrap();
        assert!(single.contains("| count | 1 |"));
        assert!(single.contains("| std | NaN |"));
        assert!(single.contains("| 75% | 7 |"));

        let empty = describe_numeric(&table, "other").unwrap();
        assert!(empty.contains("| count | 0 |"));
        assert!(empty.contains("| mean | NaN |"));
        assert!(describe_numeric(&table, "nope").is_err());
    }

    #[test]
    fn test_crosstab_skips_missing_pairs() {
        let markdown = crosstab(&people(), "sex", "race").unwrap();
        assert_eq!(
            markdown,
            "| sex | BLACK | WHITE |\n|---|---|---|\n| FEMALE | 0 | 1 |\n| MALE | 1 | 2 |\n"
        );
    }

    #[test]
    fn test_render_subpopulations() {
        let columns = Subpopulations {
            age: Some("age"),
            sex: Some("sex"),
            race: Some("race"),
        };
        let markdown = render_subpopulations(&people(), columns).unwrap();

        assert!(markdown.starts_with("## Subpopulation identification\n"));
        assert!(markdown.contains("race (`race`: `BLACK`, `WHITE`)"));
        assert!(markdown.contains("| 50% | 35 |"));
        assert!(markdown.contains("| MALE | 1 | 2 |"));
        assert!(markdown.ends_with("NOT based on self-reporting.\n"));
    }

    #[test]
    fn test_render_subpopulations_age_only() {
        let columns = Subpopulations {
            age: Some("age"),
            ..Subpopulations::default()
        };
        let markdown = render_subpopulations(&people(), columns).unwrap();
        assert!(markdown.contains("| count | 4 |"));
        assert!(!markdown.contains("| sex |"));
    }
}
