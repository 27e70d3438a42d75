//! Raw metadata feed: one delimited row per column definition.
//!
//! Positions are fixed per datapack release; `FeedLayout::default()` matches
//! the published `Metadata_<year>_<profile>_DataPack.csv` files.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{MetaError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedLayout {
    pub delimiter: u8,
    pub marker: usize,
    pub column_id: usize,
    pub name: usize,
    pub denominators: usize,
    pub table_id: usize,
    pub unit: usize,
    pub subsections: usize,
    pub aggregate: usize,
    pub description: usize,
}

impl Default for FeedLayout {
    fn default() -> Self {
        Self {
            delimiter: b',',
            marker: 0,
            column_id: 1,
            name: 2,
            denominators: 3,
            table_id: 4,
            unit: 5,
            subsections: 6,
            aggregate: 8,
            description: 10,
        }
    }
}

impl FeedLayout {
    /// Fields every included row must carry; aggregate and description may be absent.
    fn required_len(&self) -> usize {
        [
            self.marker,
            self.column_id,
            self.name,
            self.denominators,
            self.table_id,
            self.unit,
            self.subsections,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// One row of the metadata feed, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// 1-based line in the source resource.
    pub line: u64,
    pub marker: String,
    pub column_id: String,
    pub name: String,
    /// Raw pipe-delimited denominator ids.
    pub denominators: String,
    pub table_id: String,
    pub unit: String,
    /// Raw pipe-delimited subsection ids.
    pub subsections: String,
    pub aggregate: Option<String>,
    pub description: String,
}

impl MetadataRecord {
    /// Non-empty, trimmed denominator tokens in feed order.
    pub fn denominator_tokens(&self) -> impl Iterator<Item = &str> {
        split_pipes(&self.denominators)
    }

    /// Non-empty, trimmed subsection ids in feed order.
    pub fn subsection_ids(&self) -> impl Iterator<Item = &str> {
        split_pipes(&self.subsections)
    }
}

fn split_pipes(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('|').map(str::trim).filter(|t| !t.is_empty())
}

/// Read every row of a metadata feed.
///
/// Rows too short to carry the required fields are kept out only if they
/// cannot belong to any table (their marker field is empty); otherwise they
/// surface as `MetaError::Record` so a truncated feed is never read silently.
pub fn read_feed<R: Read>(reader: R, layout: &FeedLayout) -> Result<Vec<MetadataRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(layout.delimiter)
        .from_reader(reader);

    let required = layout.required_len();
    let mut out = Vec::new();
    for (idx, row) in rdr.records().enumerate() {
        let row = row?;
        let line = row
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 1);
        let field = |i: usize| row.get(i).unwrap_or("").to_string();

        if row.len() < required {
            if field(layout.marker).trim().is_empty() {
                continue;
            }
            return Err(MetaError::Record {
                line,
                reason: format!("expected at least {required} fields, found {}", row.len()),
            });
        }

        let aggregate = row
            .get(layout.aggregate)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        out.push(MetadataRecord {
            line,
            marker: field(layout.marker),
            column_id: field(layout.column_id).trim().to_string(),
            name: field(layout.name),
            denominators: field(layout.denominators),
            table_id: field(layout.table_id).trim().to_string(),
            unit: field(layout.unit).trim().to_string(),
            subsections: field(layout.subsections),
            aggregate,
            description: field(layout.description),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "\
Sequential,Short,Long,Denominators,Table,Unit,Subsection,Extra,AGG,Extra2,Description
B1,Tot_P_M,Total persons males,,B01,tags.people,tags.age_gender,,,,Selected person characteristics
B3,Median_age_persons,Median age,Tot_P_P| ,B02,tags.years,tags.age_gender,,median,,Selected medians
";

    #[test]
    fn reads_rows_with_default_layout() {
        let rows = read_feed(FEED.as_bytes(), &FeedLayout::default()).unwrap();
        assert_eq!(rows.len(), 3);
        let median = &rows[2];
        assert_eq!(median.column_id, "Median_age_persons");
        assert_eq!(median.table_id, "B02");
        assert_eq!(median.aggregate.as_deref(), Some("median"));
        assert_eq!(median.denominator_tokens().collect::<Vec<_>>(), vec!["Tot_P_P"]);
        assert_eq!(median.description, "Selected medians");
        assert_eq!(median.line, 3);
    }

    #[test]
    fn empty_aggregate_is_none() {
        let rows = read_feed(FEED.as_bytes(), &FeedLayout::default()).unwrap();
        assert_eq!(rows[1].aggregate, None);
    }

    #[test]
    fn truncated_row_is_an_error() {
        let feed = "B1,Tot_P_M,Total\n";
        let err = read_feed(feed.as_bytes(), &FeedLayout::default()).unwrap_err();
        assert!(matches!(err, MetaError::Record { line: 1, .. }));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let feed = "\nB1,Tot_P_M,Total,,B01,tags.people,tags.age_gender\n";
        let rows = read_feed(feed.as_bytes(), &FeedLayout::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "");
    }
}
