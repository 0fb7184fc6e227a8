//! Lookup data sources and the per-field lookup binding.
//!
//! A `LookupDataSource` resolves identifiers and lists candidates for a
//! lookup field. It is an external collaborator: retry and timeout policy
//! belong to the implementation, and calls are synchronous.
//!
//! A `LookupBinding` wraps one data source for exactly one field and tracks
//! whether the field's candidate list is stale. The binding is marked stale
//! only by fields it declares as triggers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::values::{LookupKey, LookupValue, Value};

/// Page length used when the caller does not ask for one.
pub const DEFAULT_PAGE_LENGTH: usize = 10;

/// First row of the first page.
pub const FIRST_ROW: usize = 0;

// ──────────────────────────────────────────────
// Query
// ──────────────────────────────────────────────

/// A request for lookup candidates.
///
/// `parameters` carries the current values of the binding's trigger fields,
/// so that a data source can restrict candidates by them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub filter: Option<String>,
    pub first_row: usize,
    pub page_length: usize,
    pub parameters: BTreeMap<String, Option<Value>>,
}

impl Default for LookupQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupQuery {
    pub fn new() -> Self {
        LookupQuery {
            filter: None,
            first_row: FIRST_ROW,
            page_length: DEFAULT_PAGE_LENGTH,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_page(mut self, first_row: usize, page_length: usize) -> Self {
        self.first_row = first_row;
        self.page_length = page_length;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Option<Value>) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

// ──────────────────────────────────────────────
// Trait
// ──────────────────────────────────────────────

/// Synchronous resolver of lookup values.
pub trait LookupDataSource: Send + Sync + fmt::Debug {
    /// Resolve a single identifier. `None` means "not found".
    fn find_by_id(&self, key: &LookupKey) -> Option<LookupValue>;

    /// List candidates matching the query, in display order.
    fn find_entities(&self, query: &LookupQuery) -> Vec<LookupValue>;
}

// ──────────────────────────────────────────────
// StaticLookupDataSource
// ──────────────────────────────────────────────

/// A data source over a fixed list of values.
///
/// Filtering is a case-insensitive substring match on the display name or
/// the key. Query parameters are ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticLookupDataSource {
    values: Vec<LookupValue>,
}

impl StaticLookupDataSource {
    pub fn new(values: Vec<LookupValue>) -> Self {
        StaticLookupDataSource { values }
    }

    pub fn values(&self) -> &[LookupValue] {
        &self.values
    }
}

impl LookupDataSource for StaticLookupDataSource {
    fn find_by_id(&self, key: &LookupKey) -> Option<LookupValue> {
        self.values.iter().find(|v| v.key() == key).cloned()
    }

    fn find_entities(&self, query: &LookupQuery) -> Vec<LookupValue> {
        let needle = query
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);
        self.values
            .iter()
            .filter(|v| match &needle {
                Some(n) => {
                    v.display_name().to_lowercase().contains(n)
                        || v.key().to_string().to_lowercase().contains(n)
                }
                None => true,
            })
            .skip(query.first_row)
            .take(query.page_length)
            .cloned()
            .collect()
    }
}

// ──────────────────────────────────────────────
// LookupBinding
// ──────────────────────────────────────────────

/// A field's lookup capability: resolver, trigger names and staleness.
///
/// The data source and trigger set are immutable and shared between clones;
/// the staleness flag is plain owned state, so a cloned binding starts with
/// the source's staleness and evolves independently from then on.
#[derive(Debug, Clone)]
pub struct LookupBinding {
    data_source: Arc<dyn LookupDataSource>,
    depends_on: Arc<BTreeSet<String>>,
    numeric_key: bool,
    staled: bool,
}

impl LookupBinding {
    pub fn new(
        data_source: Arc<dyn LookupDataSource>,
        depends_on: Arc<BTreeSet<String>>,
        numeric_key: bool,
    ) -> Self {
        LookupBinding {
            data_source,
            depends_on,
            numeric_key,
            staled: false,
        }
    }

    pub fn is_numeric_key(&self) -> bool {
        self.numeric_key
    }

    /// Names of the fields whose change makes this lookup stale.
    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn is_staled(&self) -> bool {
        self.staled
    }

    /// Mark the candidate list stale because `triggering_field` changed.
    ///
    /// Returns `true` only when the flag actually flipped: fields that are
    /// not declared triggers, or a binding that is already stale, leave the
    /// state untouched.
    pub fn set_staled(&mut self, triggering_field: &str) -> bool {
        if self.staled || !self.depends_on.contains(triggering_field) {
            return false;
        }
        self.staled = true;
        true
    }

    pub fn find_by_id(&self, key: &LookupKey) -> Option<LookupValue> {
        self.data_source.find_by_id(key)
    }

    /// Fetch candidates. Fetching refreshes the list, so staleness is cleared.
    pub fn find_entities(&mut self, query: &LookupQuery) -> Vec<LookupValue> {
        let values = self.data_source.find_entities(query);
        self.staled = false;
        values
    }
}
