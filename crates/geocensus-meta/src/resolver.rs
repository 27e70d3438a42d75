//! Column Dependency Graph Resolver.
//!
//! Resolution is caller-driven: every prerequisite declared for a table must
//! already be resolved and handed in. The resolver checks that, then binds
//! each row's denominator tokens in two scopes:
//!
//! 1. the columns of the supplied prerequisite sets, in declaration order,
//!    where a later prerequisite shadows an id an earlier one defines;
//! 2. columns of the same table resolved from earlier rows.
//!
//! A token found in neither scope is dropped or rejected according to the
//! configured [`DanglingPolicy`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use geocensus_core::config::DanglingPolicy;
use geocensus_core::geo::{Profile, Year};
use geocensus_core::id::{ColumnId, TableId};

use crate::column::{ColumnDescriptor, Target};
use crate::deps::DependencyMap;
use crate::error::{MetaError, Result};
use crate::loader::ColumnDefinition;
use crate::resolved::ResolvedColumnSet;

/// Already-resolved sets handed to [`Resolver::resolve`], keyed by table id.
pub type Prerequisites = BTreeMap<TableId, Arc<ResolvedColumnSet>>;

#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    deps: &'a DependencyMap,
    policy: DanglingPolicy,
    version: u32,
}

impl<'a> Resolver<'a> {
    pub fn new(deps: &'a DependencyMap) -> Self {
        Self {
            deps,
            policy: DanglingPolicy::default(),
            version: 0,
        }
    }

    pub fn with_policy(mut self, policy: DanglingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Version stamped on every set this resolver produces.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn resolve(
        &self,
        year: Year,
        profile: &Profile,
        table: &TableId,
        definitions: Vec<ColumnDefinition>,
        prerequisites: &Prerequisites,
    ) -> Result<ResolvedColumnSet> {
        let declared = self.deps.declaration_order(table);

        let missing: Vec<TableId> = declared
            .iter()
            .filter(|t| !prerequisites.contains_key(*t))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(MetaError::DependencyUnresolved {
                year,
                profile: profile.clone(),
                table: table.clone(),
                missing,
            });
        }

        // Last declaration wins.
        let mut scope: HashMap<&ColumnId, &Arc<ColumnDescriptor>> = HashMap::new();
        for prereq in &declared {
            let Some(set) = prerequisites.get(prereq) else {
                continue;
            };
            if set.year() != year || set.profile() != profile {
                return Err(MetaError::PrerequisiteMismatch {
                    supplied: prereq.clone(),
                    supplied_year: set.year(),
                    supplied_profile: set.profile().clone(),
                    year,
                    profile: profile.clone(),
                });
            }
            for col in set.iter() {
                scope.insert(&col.id, col);
            }
        }

        let ignored = prerequisites.len() - declared.len();
        if ignored > 0 {
            debug!(table = %table, ignored, "undeclared prerequisite sets ignored");
        }

        let mut earlier: HashMap<ColumnId, Arc<ColumnDescriptor>> = HashMap::new();
        let mut columns = Vec::with_capacity(definitions.len());
        let mut dropped = 0usize;

        for def in definitions {
            let mut targets: Vec<Target> = Vec::new();
            let mut seen: HashSet<ColumnId> = HashSet::new();

            for token in &def.denominators {
                let key = ColumnId::new(token.as_str());
                let found = scope
                    .get(&key)
                    .map(|c| Arc::clone(c))
                    .or_else(|| earlier.get(&key).cloned());

                match found {
                    Some(column) => {
                        if seen.insert(key) {
                            targets.push(Target {
                                column,
                                relation: def.relation,
                            });
                        }
                    }
                    None => match self.policy {
                        DanglingPolicy::Drop => {
                            dropped += 1;
                            debug!(table = %table, column = %def.id, denominator = %token, "dropping unresolved denominator");
                        }
                        DanglingPolicy::Reject => {
                            warn!(table = %table, column = %def.id, denominator = %token, "unresolved denominator");
                            return Err(MetaError::DanglingDenominator {
                                table: table.clone(),
                                column: def.id,
                                denominator: token.clone(),
                            });
                        }
                    },
                }
            }

            let descriptor = Arc::new(ColumnDescriptor {
                id: def.id,
                name: def.name,
                description: def.description,
                data_type: def.data_type,
                weight: def.weight,
                aggregate: def.aggregate,
                tags: def.tags,
                targets,
            });
            earlier.insert(descriptor.id.clone(), Arc::clone(&descriptor));
            columns.push(descriptor);
        }

        debug!(
            table = %table,
            year,
            profile = %profile,
            columns = columns.len(),
            prerequisites = declared.len(),
            dropped,
            "resolved column set"
        );

        Ok(ResolvedColumnSet::new(
            year,
            profile.clone(),
            table.clone(),
            self.version,
            columns,
        ))
    }
}
