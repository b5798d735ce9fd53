//! SJR quartile table: a semicolon-delimited CSV export mapping journal
//! ISSNs to a best quartile and an SJR indicator, loaded once per process
//! and joined by normalized ISSN.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::JintelError;
use crate::utils::issn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quartile {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quartile {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "Q1" => Some(Self::Q1),
            "Q2" => Some(Self::Q2),
            "Q3" => Some(Self::Q3),
            "Q4" => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuartileRecord {
    pub quartile: Quartile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sjr: Option<f64>,
    pub title: String,
}

/// Immutable ISSN → quartile lookup.
#[derive(Debug, Default)]
pub struct QuartileTable {
    by_issn: HashMap<String, QuartileRecord>,
}

/// The export writes decimals with a comma (`1,234`).
fn parse_decimal(value: &str) -> Option<f64> {
    let cleaned = value.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

impl QuartileTable {
    /// Loads an SJR CSV export. The file is semicolon-delimited with at
    /// least `Title`, `Issn` and `SJR Best Quartile` columns; the `Issn`
    /// column may hold several comma-separated ISSNs, each of which maps to
    /// the same row. On a duplicate ISSN the first row wins.
    pub fn load_csv(path: &Path) -> Result<Self, JintelError> {
        let display_path = path.display().to_string();
        let wrap = |source: csv::Error| JintelError::QuartileCsv {
            path: display_path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_path(path)
            .map_err(wrap)?;

        let headers = reader.headers().map_err(wrap)?.clone();
        let issn_col = column_index(&headers, "Issn");
        let quartile_col = column_index(&headers, "SJR Best Quartile");
        let (Some(issn_col), Some(quartile_col)) = (issn_col, quartile_col) else {
            return Err(JintelError::InvalidArgument(format!(
                "Quartile table {display_path} is missing the Issn or SJR Best Quartile column"
            )));
        };
        let title_col = column_index(&headers, "Title");
        let sjr_col = column_index(&headers, "SJR");

        let mut by_issn: HashMap<String, QuartileRecord> = HashMap::new();
        let mut skipped = 0usize;
        for row in reader.records() {
            let row = row.map_err(wrap)?;
            let Some(quartile) = row.get(quartile_col).and_then(Quartile::parse) else {
                skipped += 1;
                continue;
            };
            let record = QuartileRecord {
                quartile,
                sjr: sjr_col.and_then(|c| row.get(c)).and_then(parse_decimal),
                title: title_col
                    .and_then(|c| row.get(c))
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            };
            for raw in row.get(issn_col).unwrap_or_default().split(',') {
                let Some(normalized) = issn::normalize_issn(raw) else {
                    continue;
                };
                by_issn.entry(normalized).or_insert_with(|| record.clone());
            }
        }

        if skipped > 0 {
            warn!(path = %display_path, skipped, "Rows without a quartile skipped");
        }
        debug!(path = %display_path, entries = by_issn.len(), "Quartile table loaded");
        Ok(Self { by_issn })
    }

    /// Lookup by an already-normalized ISSN (see [`issn::normalize_issn`]).
    pub fn lookup(&self, normalized_issn: &str) -> Option<&QuartileRecord> {
        self.by_issn.get(normalized_issn)
    }

    pub fn len(&self) -> usize {
        self.by_issn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_issn.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write csv");
        file
    }

    const HEADER: &str = "Rank;Title;Issn;SJR;SJR Best Quartile\n";

    #[test]
    fn loads_rows_and_joins_by_normalized_issn() {
        let file = write_csv(&format!(
            "{HEADER}1;Water Research;00431354, 18792448;3,338;Q1\n2;Desalination;00119164;2,207;Q1\n"
        ));
        let table = QuartileTable::load_csv(file.path()).expect("load");

        assert_eq!(table.len(), 3);
        let record = table.lookup("00431354").expect("primary issn");
        assert_eq!(record.quartile, Quartile::Q1);
        assert_eq!(record.sjr, Some(3.338));
        assert_eq!(record.title, "Water Research");
        // Second ISSN of the same row resolves to the same record.
        assert_eq!(table.lookup("18792448"), table.lookup("00431354"));
    }

    #[test]
    fn dashed_lookup_matches_undashed_entry() {
        let file = write_csv(&format!("{HEADER}1;Some Journal;12345678;1,000;Q2\n"));
        let table = QuartileTable::load_csv(file.path()).expect("load");

        let normalized = issn::normalize_issn("1234-5678").expect("valid issn");
        assert_eq!(
            table.lookup(&normalized).map(|r| r.quartile),
            Some(Quartile::Q2)
        );
        assert!(table.lookup("99999999").is_none());
    }

    #[test]
    fn first_row_wins_on_duplicate_issn() {
        let file = write_csv(&format!(
            "{HEADER}1;First;11112222;5,000;Q1\n2;Second;11112222;0,100;Q4\n"
        ));
        let table = QuartileTable::load_csv(file.path()).expect("load");
        let record = table.lookup("11112222").expect("entry");
        assert_eq!(record.title, "First");
        assert_eq!(record.quartile, Quartile::Q1);
    }

    #[test]
    fn rows_without_quartile_or_issn_are_skipped() {
        let file = write_csv(&format!(
            "{HEADER}1;No Quartile;11112222;1,000;-\n2;No Issn;;1,000;Q1\n3;Good;33334444;1,000;Q3\n"
        ));
        let table = QuartileTable::load_csv(file.path()).expect("load");
        assert_eq!(table.len(), 1);
        assert!(table.lookup("33334444").is_some());
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let file = write_csv("Rank;Title;SJR\n1;Journal;1,000\n");
        let err = QuartileTable::load_csv(file.path()).expect_err("must fail");
        assert!(matches!(err, JintelError::InvalidArgument(_)));
    }

    #[test]
    fn missing_file_surfaces_path() {
        let err = QuartileTable::load_csv(Path::new("/nonexistent/sjr.csv"))
            .expect_err("must fail");
        assert!(err.to_string().contains("/nonexistent/sjr.csv"));
    }

    #[test]
    fn decimal_commas_parse() {
        assert_eq!(parse_decimal("3,338"), Some(3.338));
        assert_eq!(parse_decimal(" 12 "), Some(12.0));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
    }
}
