//! Version-keyed cache of resolved column sets, and the catalog session that
//! drives loading and resolution through it.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use geocensus_core::config::GeocensusConfig;
use geocensus_core::geo::{Profile, Year};
use geocensus_core::id::TableId;

use crate::deps::DependencyMap;
use crate::error::{MetaError, Result};
use crate::feed::{read_feed, FeedLayout, MetadataRecord};
use crate::loader::ColumnLoader;
use crate::resolved::ResolvedColumnSet;
use crate::resolver::{Prerequisites, Resolver};
use crate::tags::TagRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub year: Year,
    pub profile: Profile,
    pub table: TableId,
}

#[derive(Debug, Default)]
struct CacheState {
    version: u32,
    entries: HashMap<CacheKey, Arc<ResolvedColumnSet>>,
}

/// Resolved sets keyed by (year, profile, table).
///
/// Every entry belongs to the current version; changing the version empties
/// the cache. Entries are immutable and shared by `Arc`.
#[derive(Debug, Default)]
pub struct ColumnCache {
    state: Mutex<CacheState>,
}

impl ColumnCache {
    pub fn new(version: u32) -> Self {
        Self {
            state: Mutex::new(CacheState {
                version,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn version(&self) -> u32 {
        self.lock().version
    }

    /// Switch to `version`, invalidating every entry if it differs.
    pub fn set_version(&self, version: u32) {
        let mut state = self.lock();
        if state.version != version {
            debug!(from = state.version, to = version, dropped = state.entries.len(), "column cache invalidated");
            state.version = version;
            state.entries.clear();
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ResolvedColumnSet>> {
        self.lock().entries.get(key).cloned()
    }

    /// Store `set` unless it was resolved under a stale version.
    pub fn insert(&self, key: CacheKey, set: Arc<ResolvedColumnSet>) -> bool {
        let mut state = self.lock();
        if set.version() != state.version {
            return false;
        }
        state.entries.insert(key, set);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything needed to resolve any table of a loaded year.
pub struct ColumnCatalog {
    config: GeocensusConfig,
    deps: DependencyMap,
    tags: TagRegistry,
    feeds: HashMap<Year, Vec<MetadataRecord>>,
    cache: ColumnCache,
}

impl ColumnCatalog {
    pub fn new(config: GeocensusConfig, deps: DependencyMap, tags: TagRegistry) -> Self {
        let cache = ColumnCache::new(config.columns_version);
        Self {
            config,
            deps,
            tags,
            feeds: HashMap::new(),
            cache,
        }
    }

    /// Catalog using the built-in dependency declarations and tag registry.
    pub fn from_config(config: GeocensusConfig) -> Result<Self> {
        config.validate()?;
        let deps = DependencyMap::builtin()?;
        let tags = TagRegistry::builtin(config.strict_tags)?;
        Ok(Self::new(config, deps, tags))
    }

    pub fn config(&self) -> &GeocensusConfig {
        &self.config
    }

    pub fn deps(&self) -> &DependencyMap {
        &self.deps
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn cache(&self) -> &ColumnCache {
        &self.cache
    }

    pub fn add_feed(&mut self, year: Year, records: Vec<MetadataRecord>) {
        self.feeds.insert(year, records);
    }

    pub fn load_feed<R: Read>(&mut self, year: Year, reader: R, layout: &FeedLayout) -> Result<usize> {
        let records = read_feed(reader, layout)?;
        let n = records.len();
        info!(year, rows = n, "metadata feed loaded");
        self.add_feed(year, records);
        Ok(n)
    }

    /// Bump the columns version, dropping every cached set.
    pub fn set_version(&mut self, version: u32) {
        self.config.columns_version = version;
        self.cache.set_version(version);
    }

    /// Resolve `table` for `year`, resolving its prerequisite closure first.
    pub fn resolve(&self, year: Year, table: &TableId) -> Result<Arc<ResolvedColumnSet>> {
        let profile = self.config.profile_for(year)?.clone();
        let records = self
            .feeds
            .get(&year)
            .ok_or(MetaError::MissingFeed { year })?;

        let version = self.cache.version();
        let loader = ColumnLoader::new(&self.tags).with_weight(self.config.default_weight)?;
        let resolver = Resolver::new(&self.deps)
            .with_policy(self.config.dangling_policy)
            .with_version(version);

        let mut resolved = Prerequisites::new();
        for t in self.deps.resolution_order(table)? {
            let key = CacheKey {
                year,
                profile: profile.clone(),
                table: t.clone(),
            };
            let set = match self.cache.get(&key) {
                Some(hit) => hit,
                None => {
                    let defs = loader.load(records, &profile, &t)?;
                    let set = Arc::new(resolver.resolve(year, &profile, &t, defs, &resolved)?);
                    self.cache.insert(key, Arc::clone(&set));
                    set
                }
            };
            resolved.insert(t, set);
        }

        resolved
            .remove(table)
            .ok_or_else(|| MetaError::Declaration(format!("{table} missing from its own resolution order")))
    }
}
