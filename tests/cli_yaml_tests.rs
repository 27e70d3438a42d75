//! YAML inputs the CLI accepts: dependency maps, tag registries, table
//! catalogs, feed layouts, and configuration.

use geocensus_core::config::{DanglingPolicy, GeocensusConfig};
use geocensus_core::geo::{Profile, Resolution};
use geocensus_core::id::TableId;
use geocensus_meta::{
    read_feed, ColumnCatalog, DependencyMap, FeedLayout, MetaError, TableCatalog, TagKind, TagRegistry,
};

#[test]
fn test_parse_dependency_map() {
    let yaml = r#"
base_tables: [B01]
edges:
  B02: [B17B]
ranges:
  - { prefix: B, from: 26, to: 28, requires: B25 }
"#;
    let map = DependencyMap::from_yaml(yaml).unwrap();
    assert_eq!(map.base_tables, [TableId::new("B01")]);
    assert_eq!(map.ranges.len(), 1);
    assert_eq!(map.declared_tables().len(), 4);
    assert_eq!(
        map.resolution_order(&TableId::new("B27")).unwrap(),
        [TableId::new("B01"), TableId::new("B25"), TableId::new("B27")]
    );
}

#[test]
fn test_dependency_map_sections_are_optional() {
    let map = DependencyMap::from_yaml("edges:\n  G04A: [G04B]\n").unwrap();
    assert!(map.base_tables.is_empty());
    assert!(map.ranges.is_empty());
}

#[test]
fn test_malformed_dependency_map_is_rejected() {
    assert!(matches!(
        DependencyMap::from_yaml("edges: [B01, B02]\n"),
        Err(MetaError::Yaml(_))
    ));
    assert!(matches!(
        DependencyMap::from_yaml("ranges:\n  - { prefix: '', from: 1, to: 2, requires: B01 }\n"),
        Err(MetaError::Declaration(_))
    ));
}

#[test]
fn test_builtin_map_survives_yaml_round_trip() {
    let map = DependencyMap::builtin().unwrap();
    let yaml = serde_yaml::to_string(&map).unwrap();
    assert_eq!(DependencyMap::from_yaml(&yaml).unwrap(), map);
}

#[test]
fn test_extra_tags_extend_builtin_registry() {
    let mut reg = TagRegistry::builtin(true).unwrap();
    let before = reg.len();
    reg.extend_from_yaml(
        r#"
units:
  - { id: tags.hectares, name: Hectares, description: Land area }
subsections:
  - id: tags.agriculture
    name: Agriculture
"#,
    )
    .unwrap();

    assert_eq!(reg.len(), before + 2);
    let unit = reg.get(TagKind::Unit, "tags.hectares").unwrap();
    assert_eq!(unit.description, "Land area");
    assert!(reg.get(TagKind::Subsection, "tags.agriculture").is_ok());
    assert!(reg.get(TagKind::Unit, "tags.agriculture").is_err());
}

#[test]
fn test_overriding_a_tag_replaces_it() {
    let mut reg = TagRegistry::builtin(true).unwrap();
    reg.extend_from_yaml("sections:\n  - { id: au, name: Commonwealth of Australia }\n")
        .unwrap();
    assert_eq!(reg.get(TagKind::Section, "au").unwrap().name, "Commonwealth of Australia");
}

#[test]
fn test_parse_table_catalog() {
    let yaml = r#"
years:
  2021:
    profile: GCP
    tables: [G01, G02]
"#;
    let cat = TableCatalog::from_yaml(yaml).unwrap();
    assert_eq!(cat.years[&2021].profile, Profile::new("GCP"));
    assert!(cat.contains(2021, &TableId::new("G02")));
    assert!(matches!(cat.tables(2011), Err(MetaError::MissingFeed { year: 2011 })));
}

#[test]
fn test_feed_layout_from_yaml() {
    let yaml = r#"
delimiter: 59
marker: 0
column_id: 1
name: 2
denominators: 3
table_id: 4
unit: 5
subsections: 6
aggregate: 7
description: 8
"#;
    let layout: FeedLayout = serde_yaml::from_str(yaml).unwrap();
    let rows = read_feed(
        "B1;Tot_P_P;Total persons;;B01;tags.people;tags.age_gender;;Persons\n".as_bytes(),
        &layout,
    )
    .unwrap();
    assert_eq!(rows[0].table_id, "B01");
    assert_eq!(rows[0].aggregate, None);
    assert_eq!(rows[0].description, "Persons");
}

#[test]
fn test_config_from_yaml() {
    let yaml = r#"
output_schema: staging
geoid_column: region_id
legacy_epoch_max_year: 2011
finest_resolution: MB
finest_parent: SA1
max_parallel_tasks: 8
dangling_policy: reject
default_weight: 3
columns_version: 9
strict_tags: false
profiles:
  2011: BCP
  2016: GCP
"#;
    let cfg: GeocensusConfig = serde_yaml::from_str(yaml).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.output_schema, "staging");
    assert_eq!(cfg.finest_resolution, Resolution::new("MB"));
    assert_eq!(cfg.dangling_policy, DanglingPolicy::Reject);

    let cat = ColumnCatalog::from_config(cfg).unwrap();
    assert_eq!(cat.cache().version(), 9);
    assert!(!cat.tags().is_strict());
}

#[test]
fn test_invalid_config_is_rejected_by_catalog() {
    let yaml = serde_yaml::to_string(&GeocensusConfig::default()).unwrap();
    let mut cfg: GeocensusConfig = serde_yaml::from_str(&yaml).unwrap();
    cfg.finest_parent = cfg.finest_resolution.clone();
    assert!(matches!(ColumnCatalog::from_config(cfg), Err(MetaError::Core(_))));
}
