pub mod parser;
pub mod search;
pub mod similarity;
pub mod source;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::product::{CatalogItem, Category, ItemKey};
use crate::errors::CatalogLoadError;

use self::source::{CatalogRecord, CatalogSource};

/// Immutable menu snapshot, indexed by normalized key and kept in source order.
#[derive(Clone, Debug, Default)]
pub struct CatalogIndex {
    items: Vec<CatalogItem>,
    by_key: HashMap<ItemKey, usize>,
}

impl CatalogIndex {
    pub fn from_records(records: Vec<CatalogRecord>) -> Result<Self, CatalogLoadError> {
        let mut items = Vec::with_capacity(records.len());
        let mut by_key = HashMap::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let name = record.name.trim();
            if name.is_empty() {
                return Err(CatalogLoadError::InvalidRecord {
                    index,
                    reason: "`name` must not be empty".to_string(),
                });
            }
            if record.price < Decimal::ZERO {
                return Err(CatalogLoadError::InvalidRecord {
                    index,
                    reason: format!("`price` for `{name}` must not be negative"),
                });
            }

            let item = CatalogItem::new(
                name,
                record.price,
                Category::from_label(&record.category),
                record.description.filter(|description| !description.trim().is_empty()),
            );
            if by_key.contains_key(&item.key) {
                return Err(CatalogLoadError::DuplicateKey { key: item.key.0 });
            }
            by_key.insert(item.key.clone(), items.len());
            items.push(item);
        }

        Ok(Self { items, by_key })
    }

    /// Exact lookup; the input is trimmed and lowercased first.
    pub fn lookup(&self, name: &str) -> Option<&CatalogItem> {
        self.get(&ItemKey::normalize(name))
    }

    pub fn get(&self, key: &ItemKey) -> Option<&CatalogItem> {
        self.by_key.get(key).map(|position| &self.items[*position])
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn items_by_category(&self, category: Category) -> Vec<&CatalogItem> {
        self.items.iter().filter(|item| item.category == category).collect()
    }

    /// First item, in catalog order, whose lowercased name contains `fragment`.
    pub fn find_by_name_fragment(&self, fragment: &str) -> Option<&CatalogItem> {
        let fragment = fragment.to_lowercase();
        self.items.iter().find(|item| item.name.to_lowercase().contains(&fragment))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug)]
enum CatalogState {
    Unloaded,
    Loaded(Arc<CatalogIndex>),
    Failed(CatalogLoadError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogStatus {
    Unloaded,
    Loaded { items: usize },
    Failed { reason: String },
}

/// Process-wide catalog cache.
///
/// Loads once and hands out `Arc` snapshots. A reload builds a fresh index
/// and swaps it in, so readers holding an older snapshot are unaffected.
pub struct CatalogStore {
    source: Arc<dyn CatalogSource>,
    state: RwLock<CatalogState>,
    load_gate: Mutex<()>,
}

impl CatalogStore {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source, state: RwLock::new(CatalogState::Unloaded), load_gate: Mutex::new(()) }
    }

    /// Loads the catalog if it is not loaded yet; retries after a failure.
    pub fn load(&self) -> Result<Arc<CatalogIndex>, CatalogLoadError> {
        if let CatalogState::Loaded(index) = self.read_state() {
            return Ok(index);
        }

        let _gate = match self.load_gate.lock() {
            Ok(gate) => gate,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let CatalogState::Loaded(index) = self.read_state() {
            return Ok(index);
        }

        match self.build() {
            Ok(index) => {
                self.write_state(CatalogState::Loaded(index.clone()));
                Ok(index)
            }
            Err(error) => {
                self.write_state(CatalogState::Failed(error.clone()));
                Err(error)
            }
        }
    }

    /// Current snapshot. Loads lazily on first use and retries the source
    /// on every call while the last load failed, so a corrected menu is
    /// picked up without a restart.
    pub fn snapshot(&self) -> Result<Arc<CatalogIndex>, CatalogLoadError> {
        match self.read_state() {
            CatalogState::Loaded(index) => Ok(index),
            CatalogState::Unloaded | CatalogState::Failed(_) => self.load(),
        }
    }

    /// Drops the cached index; the next snapshot reloads from the source.
    pub fn invalidate(&self) {
        let _gate = match self.load_gate.lock() {
            Ok(gate) => gate,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.write_state(CatalogState::Unloaded);
        info!(
            event_name = "catalog.invalidated",
            source = %self.source.describe(),
            "catalog invalidated"
        );
    }

    /// Rebuilds the index from the source and swaps it in. On failure a
    /// previously loaded index keeps serving.
    pub fn reload(&self) -> Result<Arc<CatalogIndex>, CatalogLoadError> {
        let _gate = match self.load_gate.lock() {
            Ok(gate) => gate,
            Err(poisoned) => poisoned.into_inner(),
        };

        match self.build() {
            Ok(index) => {
                self.write_state(CatalogState::Loaded(index.clone()));
                Ok(index)
            }
            Err(error) => {
                if !matches!(self.read_state(), CatalogState::Loaded(_)) {
                    self.write_state(CatalogState::Failed(error.clone()));
                }
                Err(error)
            }
        }
    }

    pub fn status(&self) -> CatalogStatus {
        match self.read_state() {
            CatalogState::Unloaded => CatalogStatus::Unloaded,
            CatalogState::Loaded(index) => CatalogStatus::Loaded { items: index.len() },
            CatalogState::Failed(error) => CatalogStatus::Failed { reason: error.to_string() },
        }
    }

    fn build(&self) -> Result<Arc<CatalogIndex>, CatalogLoadError> {
        let source = self.source.describe();
        let index = self
            .source
            .fetch()
            .and_then(CatalogIndex::from_records)
            .inspect_err(|error| {
                warn!(
                    event_name = "catalog.load_failed",
                    source = %source,
                    error = %error,
                    "catalog load failed"
                );
            })?;

        info!(
            event_name = "catalog.loaded",
            source = %source,
            items = index.len(),
            "catalog loaded"
        );
        Ok(Arc::new(index))
    }

    fn read_state(&self) -> CatalogState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write_state(&self, next: CatalogState) {
        match self.state.write() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
