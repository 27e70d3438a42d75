//! Declarative prerequisite map: table id → set of prerequisite table ids.
//!
//! Declarations are data (see `data/dependencies.yaml`) so they can be
//! audited and tested on their own. The resolver never searches this graph;
//! it only checks that every declared prerequisite was supplied.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use geocensus_core::id::TableId;

use crate::error::{MetaError, Result};

const BUILTIN_DEPENDENCIES: &str = include_str!("../data/dependencies.yaml");

/// Applies one shared prerequisite to a numeric family of table ids.
///
/// `{ prefix: B, from: 26, to: 28, requires: B25 }` covers `B26`, `B27`,
/// `B28` and their parts (`B26A`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRule {
    pub prefix: String,
    pub from: u32,
    pub to: u32,
    pub requires: TableId,
}

impl RangeRule {
    pub fn matches(&self, table: &TableId) -> bool {
        let Some(rest) = table.as_str().strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(n) => n >= self.from && n <= self.to,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyMap {
    /// Each base table is a prerequisite of every other table with its leading character.
    pub base_tables: Vec<TableId>,
    /// Explicit prerequisites, in the order they are declared.
    pub edges: BTreeMap<TableId, Vec<TableId>>,
    pub ranges: Vec<RangeRule>,
}

impl DependencyMap {
    /// Declarations shipped in `data/dependencies.yaml`.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_DEPENDENCIES)
    }

    pub fn from_yaml(src: &str) -> Result<Self> {
        let map: DependencyMap = serde_yaml::from_str(src)?;
        map.validate()?;
        Ok(map)
    }

    /// Structural checks that do not need a traversal.
    pub fn validate(&self) -> Result<()> {
        for base in &self.base_tables {
            if base.prefix_char().is_none() {
                return Err(MetaError::Declaration("empty base table id".into()));
            }
        }
        for (table, prereqs) in &self.edges {
            if prereqs.contains(table) {
                return Err(MetaError::Declaration(format!("{table} lists itself")));
            }
            let unique: BTreeSet<&TableId> = prereqs.iter().collect();
            if unique.len() != prereqs.len() {
                return Err(MetaError::Declaration(format!("{table} lists a prerequisite twice")));
            }
        }
        for rule in &self.ranges {
            if rule.prefix.is_empty() {
                return Err(MetaError::Declaration(format!(
                    "range rule for {} has an empty prefix",
                    rule.requires
                )));
            }
            if rule.from > rule.to {
                return Err(MetaError::Declaration(format!(
                    "range rule {}{}..{} is empty",
                    rule.prefix, rule.from, rule.to
                )));
            }
        }
        Ok(())
    }

    /// Every statically declared prerequisite of `table`.
    pub fn prerequisites(&self, table: &TableId) -> BTreeSet<TableId> {
        let mut out = BTreeSet::new();

        for base in &self.base_tables {
            if base != table && base.prefix_char() == table.prefix_char() {
                out.insert(base.clone());
            }
        }

        if let Some(explicit) = self.edges.get(table) {
            out.extend(explicit.iter().cloned());
        }

        for rule in &self.ranges {
            if &rule.requires != table && rule.matches(table) {
                out.insert(rule.requires.clone());
            }
        }

        out
    }

    /// Declared prerequisites of `table` in declaration order: base tables,
    /// then explicit edges, then range rules. Each id appears once, at its
    /// first declaration.
    pub fn declaration_order(&self, table: &TableId) -> Vec<TableId> {
        let explicit = self.edges.get(table).into_iter().flatten();
        let bases = self
            .base_tables
            .iter()
            .filter(|b| *b != table && b.prefix_char() == table.prefix_char());
        let ranged = self
            .ranges
            .iter()
            .filter(|r| &r.requires != table && r.matches(table))
            .map(|r| &r.requires);

        let mut out: Vec<TableId> = Vec::new();
        for id in bases.chain(explicit).chain(ranged) {
            if !out.contains(id) {
                out.push(id.clone());
            }
        }
        out
    }

    /// Prerequisite closure of `table` in dependency-first order, ending with `table`.
    pub fn resolution_order(&self, table: &TableId) -> Result<Vec<TableId>> {
        self.topological_order(std::slice::from_ref(table))
    }

    /// Verify the declarations reachable from `roots` contain no cycle.
    pub fn check_acyclic<'a>(&self, roots: impl IntoIterator<Item = &'a TableId>) -> Result<()> {
        let roots: Vec<TableId> = roots.into_iter().cloned().collect();
        self.topological_order(&roots).map(|_| ())
    }

    /// Kahn's algorithm over the prerequisite closure of `roots`.
    ///
    /// Ties are broken by table id so the order is deterministic.
    pub fn topological_order(&self, roots: &[TableId]) -> Result<Vec<TableId>> {
        // Collect closure.
        let mut prereqs: HashMap<TableId, BTreeSet<TableId>> = HashMap::new();
        let mut stack: Vec<TableId> = roots.to_vec();
        while let Some(t) = stack.pop() {
            if prereqs.contains_key(&t) {
                continue;
            }
            let p = self.prerequisites(&t);
            stack.extend(p.iter().cloned());
            prereqs.insert(t, p);
        }

        let mut in_degree: HashMap<&TableId, usize> = HashMap::new();
        let mut dependents: HashMap<&TableId, Vec<&TableId>> = HashMap::new();
        for (t, p) in &prereqs {
            in_degree.insert(t, p.len());
            for u in p {
                dependents.entry(u).or_default().push(t);
            }
        }

        let mut ready: BTreeSet<&TableId> = in_degree
            .iter()
            .filter_map(|(t, &deg)| if deg == 0 { Some(*t) } else { None })
            .collect();
        let mut order = Vec::with_capacity(prereqs.len());
        let mut queue: VecDeque<&TableId> = VecDeque::new();

        loop {
            if queue.is_empty() {
                match ready.pop_first() {
                    Some(t) => queue.push_back(t),
                    None => break,
                }
            }
            let Some(t) = queue.pop_front() else { break };
            order.push(t.clone());
            if let Some(nexts) = dependents.get(t) {
                for n in nexts {
                    if let Some(deg) = in_degree.get_mut(n) {
                        *deg -= 1;
                        if *deg == 0 {
                            ready.insert(*n);
                        }
                    }
                }
            }
        }

        if order.len() != prereqs.len() {
            let done: BTreeSet<&TableId> = order.iter().collect();
            let stuck: Vec<TableId> = prereqs
                .keys()
                .filter(|t| !done.contains(t))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            return Err(MetaError::DependencyCycle(stuck));
        }

        Ok(order)
    }

    /// Every table id named anywhere in the declarations.
    pub fn declared_tables(&self) -> BTreeSet<TableId> {
        let mut out: BTreeSet<TableId> = self.base_tables.iter().cloned().collect();
        for (t, p) in &self.edges {
            out.insert(t.clone());
            out.extend(p.iter().cloned());
        }
        out.extend(self.ranges.iter().map(|r| r.requires.clone()));
        out
    }
}
