//! Column graph resolution through the catalog session.

use std::sync::Arc;

use geocensus_core::config::{DanglingPolicy, GeocensusConfig};
use geocensus_core::geo::Profile;
use geocensus_core::id::TableId;
use geocensus_meta::{
    ColumnCatalog, ColumnLoader, DependencyMap, FeedLayout, MetaError, Prerequisites, Relation, Resolver,
    TagRegistry,
};

const FEED: &str = "\
B1,Tot_P_M,Total males,,B01,tags.people,tags.age_gender,,,,Persons
B2,Tot_P_P,Total persons,,B01,tags.people,tags.age_gender,,,,Persons
B3,P_Tot_Tot,Total income persons,,B17B,tags.people,tags.income,,,,Income
B4,Tot_P_P,Persons stating income,,B17B,tags.people,tags.income,,,,Income
B5,Median_age_persons,Median age,Tot_P_P,B02,tags.years,tags.age_gender,,median,,Medians
B6,Median_tot_prsnl_inc_weekly,Median income,P_Tot_Tot|Tot_P_P|P_Tot_Tot,B02,tags.money,tags.income,,median,,Medians
B7,Average_household_size,Average household size,Nope_Col,B02,tags.people,tags.housing,,average,,Averages
B8,Tot_M,Total males,,B05,tags.people,tags.age_gender,,,,Marital
B9,Married_M,Married males,Tot_M|Later_M,B05,tags.people,tags.age_gender,,,,Marital
B10,Later_M,Later males,,B05,tags.people,tags.age_gender,,,,Marital
";

fn catalog(config: GeocensusConfig) -> ColumnCatalog {
    let mut cat = ColumnCatalog::from_config(config).unwrap();
    cat.load_feed(2011, FEED.as_bytes(), &FeedLayout::default()).unwrap();
    cat
}

fn t(id: &str) -> TableId {
    TableId::new(id)
}

#[test]
fn cross_table_denominators_bind_to_prerequisites() {
    let cat = catalog(GeocensusConfig::default());
    let b02 = cat.resolve(2011, &t("B02")).unwrap();

    let ids: Vec<_> = b02.ids().map(|c| c.as_str()).collect();
    assert_eq!(
        ids,
        ["Median_age_persons", "Median_tot_prsnl_inc_weekly", "Average_household_size"]
    );

    let median_age = b02.iter().next().unwrap();
    assert_eq!(median_age.targets.len(), 1);
    assert_eq!(median_age.targets[0].relation, Relation::Universe);
}

#[test]
fn last_declared_prerequisite_wins_a_shared_id() {
    let cat = catalog(GeocensusConfig::default());
    let b01 = cat.resolve(2011, &t("B01")).unwrap();
    let b17b = cat.resolve(2011, &t("B17B")).unwrap();
    let b02 = cat.resolve(2011, &t("B02")).unwrap();

    // Both B01 and B17B define Tot_P_P; B17B is declared after B01.
    let median_age = b02.iter().next().unwrap();
    let bound = &median_age.targets[0].column;
    assert_eq!(bound.name, "Persons stating income");
    let from_b17b = b17b.iter().find(|c| c.id.as_str() == "Tot_P_P").unwrap();
    let from_b01 = b01.iter().find(|c| c.id.as_str() == "Tot_P_P").unwrap();
    assert!(Arc::ptr_eq(bound, from_b17b));
    assert!(!Arc::ptr_eq(bound, from_b01));
}

#[test]
fn declaration_order_decides_shadowing_not_table_id() {
    // B07 is declared last, so it shadows B03.
    let deps = DependencyMap::from_yaml("edges:\n  B09: [B03, B07]\n").unwrap();
    let tags = TagRegistry::builtin(true).unwrap();
    let mut cat = ColumnCatalog::new(GeocensusConfig::default(), deps, tags);
    cat.load_feed(
        2011,
        "\
B1,Tot,Total from B03,,B03,tags.people,tags.age_gender,,,,Three
B2,Tot,Total from B07,,B07,tags.people,tags.age_gender,,,,Seven
B3,Share,Share,Tot,B09,tags.people,tags.age_gender,,,,Nine
"
        .as_bytes(),
        &FeedLayout::default(),
    )
    .unwrap();

    let b09 = cat.resolve(2011, &t("B09")).unwrap();
    let share = b09.iter().next().unwrap();
    assert_eq!(share.targets[0].column.name, "Total from B07");
}

#[test]
fn repeated_tokens_bind_once_in_token_order() {
    let cat = catalog(GeocensusConfig::default());
    let b02 = cat.resolve(2011, &t("B02")).unwrap();
    let income = b02.iter().nth(1).unwrap();
    let targets: Vec<_> = income.targets.iter().map(|x| x.column.id.as_str()).collect();
    assert_eq!(targets, ["P_Tot_Tot", "Tot_P_P"]);
}

#[test]
fn dangling_tokens_are_dropped_by_default() {
    let cat = catalog(GeocensusConfig::default());
    let b02 = cat.resolve(2011, &t("B02")).unwrap();
    let avg = b02.iter().nth(2).unwrap();
    assert!(avg.targets.is_empty());
}

#[test]
fn dangling_tokens_fail_under_reject() {
    let cat = catalog(GeocensusConfig {
        dangling_policy: DanglingPolicy::Reject,
        ..Default::default()
    });
    match cat.resolve(2011, &t("B02")).unwrap_err() {
        MetaError::DanglingDenominator { table, denominator, .. } => {
            assert_eq!(table, t("B02"));
            assert_eq!(denominator, "Nope_Col");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn same_table_binds_only_earlier_rows() {
    let cat = catalog(GeocensusConfig::default());
    let b05 = cat.resolve(2011, &t("B05")).unwrap();
    let married = b05.iter().find(|c| c.id.as_str() == "Married_M").unwrap();
    let targets: Vec<_> = married.targets.iter().map(|x| x.column.id.as_str()).collect();
    assert_eq!(targets, ["Tot_M"]);
    assert_eq!(married.targets[0].relation, Relation::Denominator);
}

#[test]
fn missing_prerequisites_are_named() {
    let deps = DependencyMap::builtin().unwrap();
    let tags = TagRegistry::builtin(true).unwrap();
    let records = geocensus_meta::read_feed(FEED.as_bytes(), &FeedLayout::default()).unwrap();
    let defs = ColumnLoader::new(&tags)
        .load(&records, &Profile::new("BCP"), &t("B02"))
        .unwrap();

    let err = Resolver::new(&deps)
        .resolve(2011, &Profile::new("BCP"), &t("B02"), defs, &Prerequisites::new())
        .unwrap_err();
    match err {
        MetaError::DependencyUnresolved { missing, table, .. } => {
            assert_eq!(table, t("B02"));
            assert_eq!(missing, [t("B01"), t("B17B")]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn prerequisite_from_another_year_is_rejected() {
    let deps = DependencyMap::builtin().unwrap();
    let tags = TagRegistry::builtin(true).unwrap();
    let records = geocensus_meta::read_feed(FEED.as_bytes(), &FeedLayout::default()).unwrap();
    let loader = ColumnLoader::new(&tags);
    let bcp = Profile::new("BCP");
    let resolver = Resolver::new(&deps);

    let b01 = resolver
        .resolve(2016, &bcp, &t("B01"), loader.load(&records, &bcp, &t("B01")).unwrap(), &Prerequisites::new())
        .unwrap();
    let mut prereqs = Prerequisites::new();
    prereqs.insert(t("B01"), Arc::new(b01));

    let err = resolver
        .resolve(2011, &bcp, &t("B05"), loader.load(&records, &bcp, &t("B05")).unwrap(), &prereqs)
        .unwrap_err();
    assert!(matches!(err, MetaError::PrerequisiteMismatch { supplied_year: 2016, .. }));
}

#[test]
fn unknown_tags_depend_on_strictness() {
    let feed = "B1,Tot_P_P,Total persons,,B01,tags.unheard_of,tags.age_gender,,,,Persons\n";

    let mut strict = ColumnCatalog::from_config(GeocensusConfig::default()).unwrap();
    strict.load_feed(2011, feed.as_bytes(), &FeedLayout::default()).unwrap();
    assert!(matches!(
        strict.resolve(2011, &t("B01")),
        Err(MetaError::UnknownTag { .. })
    ));

    let mut lenient = ColumnCatalog::from_config(GeocensusConfig {
        strict_tags: false,
        ..Default::default()
    })
    .unwrap();
    lenient.load_feed(2011, feed.as_bytes(), &FeedLayout::default()).unwrap();
    let b01 = lenient.resolve(2011, &t("B01")).unwrap();
    let tags: Vec<_> = b01.iter().next().unwrap().tags.iter().map(|x| x.id.as_str()).collect();
    assert!(tags.contains(&"tags.unheard_of"));
}

#[test]
fn descriptors_carry_default_weight_and_source_tags_first() {
    let cat = catalog(GeocensusConfig::default());
    let b01 = cat.resolve(2011, &t("B01")).unwrap();
    let first = b01.iter().next().unwrap();
    assert_eq!(first.weight, 5);
    let tags: Vec<_> = first.tags.iter().map(|x| x.id.as_str()).collect();
    assert_eq!(
        tags,
        ["au-census", "au-datapacks-license", "au", "tags.people", "tags.age_gender"]
    );
}

#[test]
fn unloaded_year_is_a_missing_feed() {
    let cat = catalog(GeocensusConfig::default());
    assert!(matches!(
        cat.resolve(2016, &t("G01")),
        Err(MetaError::MissingFeed { year: 2016 })
    ));
}

#[test]
fn b02_sum_rows_bind_prerequisites_as_denominators() {
    let feed = "\
B1,Tot_P_P,Total persons,,B01,tags.people,tags.age_gender,,,,Persons
B2,P_Tot_Tot,Total income persons,,B17B,tags.people,tags.income,,,,Income
B3,Inc_stated,Persons stating income,P_Tot_Tot,B02,tags.people,tags.income,,,,Medians
";
    let mut cat = ColumnCatalog::from_config(GeocensusConfig::default()).unwrap();
    cat.load_feed(2011, feed.as_bytes(), &FeedLayout::default()).unwrap();
    let b02 = cat.resolve(2011, &t("B02")).unwrap();
    let stated = b02.iter().next().unwrap();
    assert_eq!(stated.targets.len(), 1);
    assert_eq!(stated.targets[0].column.id.as_str(), "P_Tot_Tot");
    assert_eq!(stated.targets[0].relation, Relation::Denominator);
}

#[test]
fn part_tables_resolve_under_any_valid_supply_order() {
    let feed = "\
B1,Tot_P_P,Total persons,,B01,tags.people,tags.age_gender,,,,Persons
B2,Occ_Tot,Total employed,,B43D,tags.people,tags.employment,,,,Occupation
B3,Occ_Mgr,Managers,Occ_Tot,B43C,tags.people,tags.employment,,,,Occupation
B4,Occ_Prof,Professionals,Occ_Mgr|Occ_Tot,B43B,tags.people,tags.employment,,,,Occupation
B5,Occ_Lab,Labourers,Occ_Prof|Occ_Mgr|Tot_P_P,B43A,tags.people,tags.employment,,,,Occupation
";
    let deps = DependencyMap::builtin().unwrap();
    let tags = TagRegistry::builtin(true).unwrap();
    let records = geocensus_meta::read_feed(feed.as_bytes(), &FeedLayout::default()).unwrap();
    let loader = ColumnLoader::new(&tags);
    let resolver = Resolver::new(&deps);
    let bcp = Profile::new("BCP");

    let mut resolved = std::collections::BTreeMap::new();
    for table in ["B01", "B43D", "B43C", "B43B"] {
        let mut prereqs = Prerequisites::new();
        for p in deps.prerequisites(&t(table)) {
            prereqs.insert(p.clone(), Arc::clone(&resolved[&p]));
        }
        let defs = loader.load(&records, &bcp, &t(table)).unwrap();
        let set = resolver.resolve(2011, &bcp, &t(table), defs, &prereqs).unwrap();
        resolved.insert(t(table), Arc::new(set));
    }

    let supply = |order: &[&str]| {
        let mut prereqs = Prerequisites::new();
        for id in order {
            prereqs.insert(t(id), Arc::clone(&resolved[&t(id)]));
        }
        let defs = loader.load(&records, &bcp, &t("B43A")).unwrap();
        let set = resolver.resolve(2011, &bcp, &t("B43A"), defs, &prereqs).unwrap();
        let ids = set
            .iter()
            .next()
            .unwrap()
            .targets
            .iter()
            .map(|x| x.column.id.as_str().to_string())
            .collect::<Vec<_>>();
        ids
    };

    let forward = supply(&["B01", "B43D", "B43C", "B43B"]);
    let backward = supply(&["B43B", "B43C", "B43D", "B01"]);
    assert_eq!(forward, ["Occ_Prof", "Occ_Mgr", "Tot_P_P"]);
    assert_eq!(forward, backward);
}

#[test]
fn resolved_sets_serialize_targets_by_id() {
    let cat = catalog(GeocensusConfig::default());
    let b02 = cat.resolve(2011, &t("B02")).unwrap();
    let json = serde_json::to_value(&*b02).unwrap();
    let text = json.to_string();
    assert!(text.contains("\"Median_age_persons\""), "{text}");
    assert!(text.contains("\"relation\":\"universe\""), "{text}");
    assert!(!text.contains("Total persons"), "targets should not inline descriptors: {text}");
}
