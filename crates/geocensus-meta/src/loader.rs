//! Column Definition Loader: the rows of one table group, unbound.
//!
//! A row belongs to the requested table when its marker starts with the
//! profile's leading character and its table field starts with the table id.
//! Feed order is preserved; it becomes the output column order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use geocensus_core::geo::Profile;
use geocensus_core::id::{ColumnId, TableId};
use geocensus_core::schema::DataType;

use crate::column::{Aggregate, Relation, MAX_WEIGHT};
use crate::error::{MetaError, Result};
use crate::feed::MetadataRecord;
use crate::tags::{Tag, TagKind, TagRegistry};

/// Tag ids attached to every column of a datapack.
#[derive(Debug, Clone)]
pub struct TagSelection {
    pub section: String,
    pub source: String,
    pub license: String,
}

impl Default for TagSelection {
    fn default() -> Self {
        Self {
            section: "au".to_string(),
            source: "au-census".to_string(),
            license: "au-datapacks-license".to_string(),
        }
    }
}

/// A column as loaded from the feed, before its targets are bound.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub id: ColumnId,
    pub name: String,
    pub description: String,
    pub data_type: DataType,
    pub weight: u8,
    pub aggregate: Aggregate,
    pub tags: Vec<Arc<Tag>>,
    /// Denominator tokens in feed order, trimmed, empties removed.
    pub denominators: Vec<String>,
    /// Relation every denominator token of this row is bound with.
    pub relation: Relation,
    pub line: u64,
}

pub struct ColumnLoader<'a> {
    tags: &'a TagRegistry,
    selection: TagSelection,
    weight: u8,
    data_type: DataType,
}

impl<'a> ColumnLoader<'a> {
    pub fn new(tags: &'a TagRegistry) -> Self {
        Self {
            tags,
            selection: TagSelection::default(),
            weight: 5,
            data_type: DataType::Numeric,
        }
    }

    pub fn with_selection(mut self, selection: TagSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_weight(mut self, weight: u8) -> Result<Self> {
        if weight > MAX_WEIGHT {
            return Err(MetaError::Declaration(format!(
                "weight {weight} outside 0..={MAX_WEIGHT}"
            )));
        }
        self.weight = weight;
        Ok(self)
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Load the column definitions of `table` for `profile`, in feed order.
    pub fn load(
        &self,
        records: &[MetadataRecord],
        profile: &Profile,
        table: &TableId,
    ) -> Result<Vec<ColumnDefinition>> {
        let prefix = profile.prefix_char().ok_or_else(|| {
            MetaError::Declaration(format!("profile '{profile}' has no prefix character"))
        })?;

        let source = self.tags.get(TagKind::Source, &self.selection.source)?;
        let license = self.tags.get(TagKind::License, &self.selection.license)?;
        let section = self.tags.get(TagKind::Section, &self.selection.section)?;

        // Only the medians-and-averages table carries aggregate overrides.
        let summary_table = format!("{prefix}02");

        let mut out: Vec<ColumnDefinition> = Vec::new();
        let mut positions: HashMap<ColumnId, usize> = HashMap::new();

        for rec in records {
            if !rec.marker.starts_with(prefix) {
                continue;
            }
            if !rec.table_id.starts_with(table.as_str()) {
                continue;
            }
            if rec.column_id.is_empty() {
                return Err(MetaError::Record {
                    line: rec.line,
                    reason: "empty column id".into(),
                });
            }

            let aggregate = match rec.aggregate.as_deref() {
                Some(raw) if rec.table_id != summary_table => {
                    debug!(line = rec.line, table = %rec.table_id, raw, "aggregate override ignored outside the summary table");
                    Aggregate::Sum
                }
                Some(raw) => raw.parse::<Aggregate>().unwrap_or_else(|e| {
                    debug!(line = rec.line, %e, "aggregate override ignored");
                    Aggregate::Sum
                }),
                None => Aggregate::Sum,
            };

            let mut tags = vec![
                Arc::clone(&source),
                Arc::clone(&license),
                Arc::clone(&section),
                self.tags.get(TagKind::Unit, &rec.unit)?,
            ];
            for sub in rec.subsection_ids() {
                tags.push(self.tags.get(TagKind::Subsection, sub)?);
            }

            let def = ColumnDefinition {
                id: ColumnId::new(rec.column_id.clone()),
                name: rec.name.clone(),
                description: rec.description.clone(),
                data_type: self.data_type,
                weight: self.weight,
                aggregate,
                tags,
                denominators: rec.denominator_tokens().map(str::to_string).collect(),
                relation: aggregate.denominator_relation(),
                line: rec.line,
            };

            match positions.get(&def.id) {
                Some(&pos) => {
                    warn!(table = %table, column = %def.id, line = rec.line, "duplicate column id, later row wins");
                    out[pos] = def;
                }
                None => {
                    positions.insert(def.id.clone(), out.len());
                    out.push(def);
                }
            }
        }

        debug!(table = %table, profile = %profile, columns = out.len(), "loaded column definitions");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{read_feed, FeedLayout};

    const FEED: &str = "\
B1,Tot_P_M,Total males,,B01,tags.people,tags.age_gender,,,,Persons
B2,Tot_P_P,Total persons,,B01,tags.people,tags.age_gender|tags.boundary,,,,Persons
B3,Median_age_persons,Median age,Tot_P_P,B02,tags.years,tags.age_gender,,median,,Medians
B4,Tot_41A,Part A,Tot_41B,B41A,tags.people,tags.education,,,,Part A
B5,Tot_41B,Part B,,B41B,tags.people,tags.education,,,,Part B
G1,Tot_P_M,Total males,,G01,tags.people,tags.age_gender,,,,Persons
";

    fn records() -> Vec<MetadataRecord> {
        read_feed(FEED.as_bytes(), &FeedLayout::default()).unwrap()
    }

    #[test]
    fn filters_by_profile_prefix_and_table() {
        let tags = TagRegistry::builtin(true).unwrap();
        let loader = ColumnLoader::new(&tags);
        let defs = loader
            .load(&records(), &Profile::new("BCP"), &TableId::new("B01"))
            .unwrap();
        let ids: Vec<_> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["Tot_P_M", "Tot_P_P"]);

        let g = loader
            .load(&records(), &Profile::new("GCP"), &TableId::new("G01"))
            .unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn part_tables_are_distinguished() {
        let tags = TagRegistry::builtin(true).unwrap();
        let loader = ColumnLoader::new(&tags);
        let a = loader
            .load(&records(), &Profile::new("BCP"), &TableId::new("B41A"))
            .unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].id.as_str(), "Tot_41A");
    }

    #[test]
    fn median_override_switches_relation_only() {
        let tags = TagRegistry::builtin(true).unwrap();
        let defs = ColumnLoader::new(&tags)
            .load(&records(), &Profile::new("BCP"), &TableId::new("B02"))
            .unwrap();
        assert_eq!(defs[0].aggregate, Aggregate::Median);
        assert_eq!(defs[0].relation, Relation::Universe);
        assert_eq!(defs[0].data_type, DataType::Numeric);
        assert_eq!(defs[0].denominators, vec!["Tot_P_P".to_string()]);
    }

    #[test]
    fn override_outside_summary_table_stays_sum() {
        let feed = "\
B1,Tot_M,Total males,,B05,tags.people,tags.age_gender,,,,Marital
B2,Married_M,Married males,Tot_M,B05,tags.people,tags.age_gender,,median,,Marital
G1,Median_age,Median age,,G02,tags.years,tags.age_gender,,average,,Medians
";
        let records = read_feed(feed.as_bytes(), &FeedLayout::default()).unwrap();
        let tags = TagRegistry::builtin(true).unwrap();
        let loader = ColumnLoader::new(&tags);

        let b05 = loader.load(&records, &Profile::new("BCP"), &TableId::new("B05")).unwrap();
        assert_eq!(b05[1].aggregate, Aggregate::Sum);
        assert_eq!(b05[1].relation, Relation::Denominator);

        let g02 = loader.load(&records, &Profile::new("GCP"), &TableId::new("G02")).unwrap();
        assert_eq!(g02[0].aggregate, Aggregate::Average);
        assert_eq!(g02[0].relation, Relation::Universe);
    }

    #[test]
    fn tags_follow_source_license_section_unit_subsections() {
        let tags = TagRegistry::builtin(true).unwrap();
        let defs = ColumnLoader::new(&tags)
            .load(&records(), &Profile::new("BCP"), &TableId::new("B01"))
            .unwrap();
        let kinds: Vec<_> = defs[1].tags.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TagKind::Source,
                TagKind::License,
                TagKind::Section,
                TagKind::Unit,
                TagKind::Subsection,
                TagKind::Subsection
            ]
        );
    }

    #[test]
    fn unknown_unit_fails_in_strict_mode() {
        let feed = "B1,X,X,,B01,tags.lightyears,tags.age_gender\n";
        let recs = read_feed(feed.as_bytes(), &FeedLayout::default()).unwrap();
        let tags = TagRegistry::builtin(true).unwrap();
        let err = ColumnLoader::new(&tags)
            .load(&recs, &Profile::new("BCP"), &TableId::new("B01"))
            .unwrap_err();
        assert!(matches!(err, MetaError::UnknownTag { kind: TagKind::Unit, .. }));
    }

    #[test]
    fn weight_is_bounded() {
        let tags = TagRegistry::builtin(true).unwrap();
        assert!(ColumnLoader::new(&tags).with_weight(11).is_err());
        let loader = ColumnLoader::new(&tags).with_weight(0).unwrap();
        let defs = loader
            .load(&records(), &Profile::new("BCP"), &TableId::new("B01"))
            .unwrap();
        assert!(defs.iter().all(|d| d.weight == 0));
    }

    #[test]
    fn selection_and_type_apply_to_every_row() {
        let yaml = r#"
sections: [{ id: nz, name: New Zealand }]
sources: [{ id: nz-census, name: Stats NZ }]
licenses: [{ id: cc-by-4, name: CC BY 4.0 }]
units: [{ id: tags.people, name: People }]
subsections: [{ id: tags.age_gender, name: Age and Gender }]
"#;
        let tags = TagRegistry::from_yaml(yaml, true).unwrap();
        let loader = ColumnLoader::new(&tags)
            .with_selection(TagSelection {
                section: "nz".into(),
                source: "nz-census".into(),
                license: "cc-by-4".into(),
            })
            .with_data_type(DataType::DoublePrecision);
        let defs = loader
            .load(&records(), &Profile::new("BCP"), &TableId::new("B01"))
            .unwrap();
        assert_eq!(defs[0].data_type, DataType::DoublePrecision);
        assert_eq!(defs[0].tags[2].name, "New Zealand");
        assert!(ColumnLoader::new(&tags)
            .load(&records(), &Profile::new("BCP"), &TableId::new("B01"))
            .is_err());
    }
}
