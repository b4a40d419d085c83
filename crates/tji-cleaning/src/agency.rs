//! Canonical police agency names
//!
//! The same agency is spelled many ways across reports ("Harris Co.
//! Sheriff's Dept", "HARRIS COUNTY SHERRIFFS OFFICE", ...). Names are
//! normalised word by word: punctuation stripped, common misspellings
//! fixed, long words abbreviated, precinct numbers moved to the end, then a
//! few multi-word rewrites applied to the joined result.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Keywords whose misspellings are generated rather than listed
const SPELLING_KEYWORDS: &[&str] = &["DEPARTMENT", "SHERIFFS", "MARSHALS", "ATTORNEY"];

const FIXED_MISSPELLINGS: &[(&str, &str)] = &[
    ("ATTYS", "ATTY"),
    ("FAMERS", "FARMERS"),
    ("BELVILLE", "BELLVILLE"),
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("DEPARTMENT", "DEPT"),
    ("DISTRICT", "DIST"),
    ("COUNTY", "CO"),
    ("STATE", "ST"),
    ("UNIVERSITY", "UNIV"),
    ("ATTORNEY", "ATTY"),
    ("ATTORNEYS", "ATTY"),
    ("AUTHORITY", "AUTH"),
    ("PRECINCT", "PCT"),
    ("CONSTABLE", "CONST"),
    ("CONSTABLES", "CONST"),
];

/// Applied in order to the joined name
const MULTIWORD_RENAMINGS: &[(&str, &str)] = &[
    ("CONST OFFICE", "CONST"),
    ("SHERIFFS DEPT", "SHERIFFS OFFICE"),
    ("CITY OF", ""),
];

/// Whole-name overrides, matched on the trimmed, uppercased input
const MANUAL_RENAMINGS: &[(&str, &str)] = &[
    ("DART POLICE DEPT", "DALLAS AREA RAPID TRANSIT POLICE DEPT"),
    ("DART", "DALLAS AREA RAPID TRANSIT POLICE DEPT"),
    ("CITY MARSHAL OF MARSHALL, TEXAS", "MARSHALL MARSHALS OFFICE"),
    (
        "TEXAS DEPT OF PUBLIC SAFETY CRIMINAL INVESTIGATIONS DIVISION",
        "TEXAS DEPT OF PUBLIC SAFETY",
    ),
    ("ALAMO COMMUNITY COLLEGE DIST.", "ALAMO COMMUNITY COLLEGE DIST POLICE DEPT"),
];

static MISSPELLINGS: LazyLock<HashMap<String, &'static str>> = LazyLock::new(build_misspellings);

/// Singular form, missing plural, one dropped letter, one doubled letter
fn build_misspellings() -> HashMap<String, &'static str> {
    let mut map: HashMap<String, &'static str> = FIXED_MISSPELLINGS
        .iter()
        .map(|(wrong, right)| (wrong.to_string(), *right))
        .collect();

    for &keyword in SPELLING_KEYWORDS {
        let singular = keyword.trim_end_matches('S');
        map.insert(singular.to_string(), keyword);
        map.insert(format!("{}S", keyword), keyword);

        let chars: Vec<char> = singular.chars().collect();
        for i in 0..chars.len() {
            let dropped: String = chars[..i].iter().chain(&chars[i + 1..]).collect();
            let doubled: String = chars[..=i].iter().chain(&chars[i..]).collect();
            for variant in [dropped, doubled] {
                map.insert(format!("{}S", variant), keyword);
                map.insert(variant, keyword);
            }
        }
    }
    map
}

fn lookup<'a>(table: &'a [(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Remove all punctuation except dashes
fn clean_punct(word: &str) -> String {
    let cleaned: String = word.chars().filter(|c| c.is_alphanumeric() || *c == '-').collect();
    if cleaned == "-" {
        String::new()
    } else {
        cleaned
    }
}

fn is_precinct_number(part: &str) -> bool {
    part == "&" || part == "AND" || (!part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Move "PCT <numbers>" to the end of the name
fn reorder_parts(parts: Vec<String>) -> Vec<String> {
    let Some(start) = parts.iter().position(|p| p == "PCT") else {
        return parts;
    };
    let mut end = start + 1;
    while end < parts.len() && is_precinct_number(&parts[end]) {
        end += 1;
    }

    let mut reordered = parts[..start].to_vec();
    reordered.extend_from_slice(&parts[end..]);
    reordered.extend_from_slice(&parts[start..end]);
    reordered
}

/// Canonical form of an agency name; `None` for a missing or blank name
pub fn standardize_agency_name(agency: Option<&str>) -> Option<String> {
    let agency = agency?.trim().to_uppercase();
    if let Some(renamed) = lookup(MANUAL_RENAMINGS, &agency) {
        return Some(renamed.to_string());
    }

    let parts: Vec<String> = agency
        .split_whitespace()
        .map(clean_punct)
        .filter(|p| !p.is_empty())
        .map(|p| match MISSPELLINGS.get(&p) {
            Some(fixed) => fixed.to_string(),
            None => p,
        })
        .map(|p| match lookup(ABBREVIATIONS, &p) {
            Some(short) => short.to_string(),
            None => p,
        })
        .collect();

    let mut name = reorder_parts(parts).join(" ");
    for (before, after) in MULTIWORD_RENAMINGS {
        name = name.replace(before, after);
    }
    let mut name = name
        .split_whitespace()
        .filter(|p| *p != "-")
        .collect::<Vec<_>>()
        .join(" ");

    if name.ends_with("MARSHALS") || name.ends_with("SHERIFFS") {
        name.push_str(" OFFICE");
    }

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn canon(name: &str) -> String {
        standardize_agency_name(Some(name)).unwrap()
    }

    #[test]
    fn test_generated_misspellings() {
        assert_eq!(MISSPELLINGS.get("SHERIFF"), Some(&"SHERIFFS"));
        assert_eq!(MISSPELLINGS.get("SHERRIFFS"), Some(&"SHERIFFS"));
        assert_eq!(MISSPELLINGS.get("DEPARMENT"), Some(&"DEPARTMENT"));
        assert_eq!(MISSPELLINGS.get("MARSHALL"), Some(&"MARSHALS"));
        assert_eq!(MISSPELLINGS.get("ATTORNEYS"), Some(&"ATTORNEY"));
        assert_eq!(MISSPELLINGS.get("FAMERS"), Some(&"FARMERS"));
    }

    #[test]
    fn test_common_forms() {
        assert_eq!(canon("Dallas Police Department"), "DALLAS POLICE DEPT");
        assert_eq!(canon("  Texas Department of Public Safety "), "TEXAS DEPT OF PUBLIC SAFETY");
        assert_eq!(canon("Texas State University Police"), "TEXAS ST UNIV POLICE");
        assert_eq!(canon("City of Austin Police Dept."), "AUSTIN POLICE DEPT");
    }

    #[test]
    fn test_sheriffs_and_marshals_become_offices() {
        assert_eq!(canon("Harris County Sheriff's Office"), "HARRIS CO SHERIFFS OFFICE");
        assert_eq!(canon("Travis County Sheriff"), "TRAVIS CO SHERIFFS OFFICE");
        assert_eq!(canon("Smith County Sherriff's Dept"), "SMITH CO SHERIFFS OFFICE");
        assert_eq!(canon("Marshall Marshal"), "MARSHALS MARSHALS OFFICE");
    }

    #[test]
    fn test_precinct_moves_to_end() {
        assert_eq!(canon("Precinct 4 Constable Harris County"), "CONST HARRIS CO PCT 4");
        assert_eq!(canon("Harris Co. Constable's Office Pct 1"), "HARRIS CO CONST PCT 1");
    }

    #[test]
    fn test_manual_renamings() {
        assert_eq!(canon("dart"), "DALLAS AREA RAPID TRANSIT POLICE DEPT");
        assert_eq!(canon("City Marshal of Marshall, Texas"), "MARSHALL MARSHALS OFFICE");
    }

    #[test]
    fn test_dashes() {
        assert_eq!(canon("Dallas - Fort Worth Airport Police"), "DALLAS FORT WORTH AIRPORT POLICE");
        assert_eq!(canon("Winston-Salem P.D."), "WINSTON-SALEM PD");
    }

    #[test]
    fn test_missing_or_blank() {
        assert_eq!(standardize_agency_name(None), None);
        assert_eq!(standardize_agency_name(Some("  ...  ")), None);
    }
}
