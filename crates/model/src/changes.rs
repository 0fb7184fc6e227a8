//! Change collection for UI synchronization.
//!
//! A collector accumulates "field F of document D changed in way K" events
//! over one mutation batch. Events form a set: recording the same
//! (document, field, kind) twice keeps the first reason and adds nothing.

use std::collections::{BTreeMap, BTreeSet};

use crate::document::Document;
use crate::field::Field;
use crate::path::DocumentPath;
use crate::reason::Reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    Value,
    Readonly,
    Mandatory,
    Displayed,
    LookupValuesStaled,
    ValidStatus,
}

impl ChangeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::Value => "value",
            ChangeKind::Readonly => "readonly",
            ChangeKind::Mandatory => "mandatory",
            ChangeKind::Displayed => "displayed",
            ChangeKind::LookupValuesStaled => "lookup_values_staled",
            ChangeKind::ValidStatus => "valid_status",
        }
    }
}

// ──────────────────────────────────────────────
// Change sets
// ──────────────────────────────────────────────

/// Change kinds recorded for one field.
#[derive(Debug, Clone, Default)]
pub struct FieldChanges {
    kinds: BTreeMap<ChangeKind, Reason>,
}

impl FieldChanges {
    /// Returns `true` if `kind` was not yet recorded.
    fn record(&mut self, kind: ChangeKind, reason: &Reason) -> bool {
        if self.kinds.contains_key(&kind) {
            return false;
        }
        self.kinds.insert(kind, reason.clone());
        true
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ChangeKind> + '_ {
        self.kinds.keys().copied()
    }

    pub fn reason(&self, kind: ChangeKind) -> Option<&Reason> {
        self.kinds.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// All field changes recorded for one document instance.
#[derive(Debug, Clone)]
pub struct DocumentChanges {
    path: DocumentPath,
    fields: BTreeMap<String, FieldChanges>,
}

impl DocumentChanges {
    pub fn new(path: DocumentPath) -> Self {
        DocumentChanges {
            path,
            fields: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn field(&self, field_name: &str) -> Option<&FieldChanges> {
        self.fields.get(field_name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldChanges)> {
        self.fields.iter().map(|(name, changes)| (name.as_str(), changes))
    }

    pub fn field_names(&self) -> BTreeSet<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(FieldChanges::is_empty)
    }

    fn record(&mut self, field_name: &str, kind: ChangeKind, reason: &Reason) -> bool {
        self.fields
            .entry(field_name.to_string())
            .or_default()
            .record(kind, reason)
    }

    fn merge(&mut self, other: &DocumentChanges) {
        for (field_name, changes) in &other.fields {
            for (kind, reason) in &changes.kinds {
                self.record(field_name, *kind, reason);
            }
        }
    }

    /// `{"document": "type/id", "fields": {"Name": ["value", ...]}}`
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(name, changes)| {
                let kinds = changes
                    .kinds()
                    .map(|k| serde_json::Value::String(k.name().to_string()))
                    .collect();
                (name.clone(), serde_json::Value::Array(kinds))
            })
            .collect();
        serde_json::json!({
            "document": self.path.to_string(),
            "fields": fields,
        })
    }
}

// ──────────────────────────────────────────────
// Collector protocol
// ──────────────────────────────────────────────

/// Accumulates UI-relevant mutation events across one edit operation.
///
/// Collectors are single-owner and not meant for concurrent accumulation;
/// a nested operation's collector is folded into its caller's with
/// [`ChangesCollector::collect_from`].
pub trait ChangesCollector {
    /// Record one (document, field, kind) tuple.
    fn collect_change(
        &mut self,
        path: &DocumentPath,
        field_name: &str,
        kind: ChangeKind,
        reason: &Reason,
    );

    /// Merge every event of `other` into this collector (set union).
    fn collect_from(&mut self, other: &dyn ChangesCollector);

    fn is_empty(&self) -> bool;

    fn document_changes_by_path(&self) -> &BTreeMap<DocumentPath, DocumentChanges>;

    /// Take all accumulated events, leaving the collector empty.
    fn drain(&mut self) -> BTreeMap<DocumentPath, DocumentChanges>;

    fn field_names(&self, path: &DocumentPath) -> BTreeSet<String> {
        self.document_changes_by_path()
            .get(path)
            .map(DocumentChanges::field_names)
            .unwrap_or_default()
    }

    fn collect_value_changed(&mut self, field: &Field, reason: &Reason) {
        self.collect_change(field.document_path(), field.field_name(), ChangeKind::Value, reason);
    }

    fn collect_readonly_changed(&mut self, field: &Field, reason: &Reason) {
        self.collect_change(field.document_path(), field.field_name(), ChangeKind::Readonly, reason);
    }

    fn collect_mandatory_changed(&mut self, field: &Field, reason: &Reason) {
        self.collect_change(field.document_path(), field.field_name(), ChangeKind::Mandatory, reason);
    }

    fn collect_displayed_changed(&mut self, field: &Field, reason: &Reason) {
        self.collect_change(field.document_path(), field.field_name(), ChangeKind::Displayed, reason);
    }

    fn collect_lookup_values_staled(&mut self, field: &Field, reason: &Reason) {
        self.collect_change(
            field.document_path(),
            field.field_name(),
            ChangeKind::LookupValuesStaled,
            reason,
        );
    }

    fn collect_valid_status_changed(&mut self, field: &Field, reason: &Reason) {
        self.collect_change(field.document_path(), field.field_name(), ChangeKind::ValidStatus, reason);
    }

    /// Record a value change for every field of `document` whose value
    /// differs from its baseline. Returns whether anything was recorded.
    fn collect_from_document(&mut self, document: &Document, reason: &Reason) -> bool {
        let mut collected = false;
        for field in document.fields().iter().filter(|f| f.has_changes()) {
            self.collect_value_changed(field, reason);
            collected = true;
        }
        collected
    }
}

// ──────────────────────────────────────────────
// Implementations
// ──────────────────────────────────────────────

/// The collector used by edit operations that report to the UI.
#[derive(Debug, Clone, Default)]
pub struct DocumentChangesCollector {
    documents: BTreeMap<DocumentPath, DocumentChanges>,
}

impl DocumentChangesCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes of one document, if any were recorded.
    pub fn document_changes(&self, path: &DocumentPath) -> Option<&DocumentChanges> {
        self.documents.get(path)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.documents.values().map(DocumentChanges::to_json).collect())
    }
}

impl ChangesCollector for DocumentChangesCollector {
    fn collect_change(
        &mut self,
        path: &DocumentPath,
        field_name: &str,
        kind: ChangeKind,
        reason: &Reason,
    ) {
        let recorded = self
            .documents
            .entry(path.clone())
            .or_insert_with(|| DocumentChanges::new(path.clone()))
            .record(field_name, kind, reason);
        if recorded {
            tracing::trace!(document = %path, field = field_name, kind = kind.name(), "change collected");
        }
    }

    fn collect_from(&mut self, other: &dyn ChangesCollector) {
        for (path, changes) in other.document_changes_by_path() {
            self.documents
                .entry(path.clone())
                .or_insert_with(|| DocumentChanges::new(path.clone()))
                .merge(changes);
        }
    }

    fn is_empty(&self) -> bool {
        self.documents.values().all(DocumentChanges::is_empty)
    }

    fn document_changes_by_path(&self) -> &BTreeMap<DocumentPath, DocumentChanges> {
        &self.documents
    }

    fn drain(&mut self) -> BTreeMap<DocumentPath, DocumentChanges> {
        std::mem::take(&mut self.documents)
    }
}

static NO_CHANGES: BTreeMap<DocumentPath, DocumentChanges> = BTreeMap::new();

/// Collector that records nothing. Use it for internal edits that must not
/// produce a client-visible diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullChangesCollector;

impl NullChangesCollector {
    pub const INSTANCE: NullChangesCollector = NullChangesCollector;
}

impl ChangesCollector for NullChangesCollector {
    fn collect_change(&mut self, _: &DocumentPath, _: &str, _: ChangeKind, _: &Reason) {}

    fn collect_from(&mut self, _: &dyn ChangesCollector) {}

    fn is_empty(&self) -> bool {
        true
    }

    fn document_changes_by_path(&self) -> &BTreeMap<DocumentPath, DocumentChanges> {
        &NO_CHANGES
    }

    fn drain(&mut self) -> BTreeMap<DocumentPath, DocumentChanges> {
        BTreeMap::new()
    }

    fn collect_from_document(&mut self, _: &Document, _: &Reason) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str) -> DocumentPath {
        DocumentPath::new("C_Order", id)
    }

    #[test]
    fn recording_is_idempotent_and_keeps_first_reason() {
        let mut c = DocumentChangesCollector::new();
        let path = order("1");
        c.collect_change(&path, "Qty", ChangeKind::Value, &Reason::from("first"));
        c.collect_change(&path, "Qty", ChangeKind::Value, &Reason::from("second"));

        let changes = c.document_changes(&path).unwrap();
        let qty = changes.field("Qty").unwrap();
        assert_eq!(qty.kinds().collect::<Vec<_>>(), vec![ChangeKind::Value]);
        assert_eq!(qty.reason(ChangeKind::Value).unwrap().get(), "first");
    }

    #[test]
    fn merge_is_a_set_union() {
        let reason = Reason::from("test");
        let mut x = DocumentChangesCollector::new();
        x.collect_change(&order("1"), "Qty", ChangeKind::Value, &reason);
        x.collect_change(&order("1"), "Qty", ChangeKind::ValidStatus, &reason);

        let mut y = DocumentChangesCollector::new();
        y.collect_change(&order("1"), "Qty", ChangeKind::Value, &reason);
        y.collect_change(&order("1"), "Description", ChangeKind::Readonly, &reason);
        y.collect_change(&order("2"), "Qty", ChangeKind::Mandatory, &reason);

        let mut merged = DocumentChangesCollector::new();
        merged.collect_from(&x);
        merged.collect_from(&y);

        let first = merged.document_changes(&order("1")).unwrap();
        assert_eq!(
            merged.field_names(&order("1")),
            ["Description", "Qty"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert_eq!(
            first.field("Qty").unwrap().kinds().collect::<Vec<_>>(),
            vec![ChangeKind::Value, ChangeKind::ValidStatus]
        );
        assert!(merged
            .document_changes(&order("2"))
            .unwrap()
            .field("Qty")
            .unwrap()
            .contains(ChangeKind::Mandatory));
    }

    #[test]
    fn reasons_stay_deferred_while_collecting() {
        let mut c = DocumentChangesCollector::new();
        let reason = Reason::new(|| panic!("reason must not be evaluated"));
        c.collect_change(&order("1"), "Qty", ChangeKind::Value, &reason);
        let mut other = DocumentChangesCollector::new();
        other.collect_from(&c);
        assert!(!reason.is_evaluated());
    }

    #[test]
    fn drain_empties_the_collector() {
        let mut c = DocumentChangesCollector::new();
        c.collect_change(&order("1"), "Qty", ChangeKind::Value, &Reason::from("x"));
        let drained = c.drain();
        assert_eq!(drained.len(), 1);
        assert!(c.is_empty());
        assert!(c.document_changes_by_path().is_empty());
    }

    #[test]
    fn null_collector_stays_empty() {
        let mut c = NullChangesCollector::INSTANCE;
        let mut source = DocumentChangesCollector::new();
        source.collect_change(&order("1"), "Qty", ChangeKind::Value, &Reason::from("x"));

        c.collect_change(&order("1"), "Qty", ChangeKind::Value, &Reason::from("x"));
        c.collect_from(&source);
        assert!(c.is_empty());
        assert!(c.document_changes_by_path().is_empty());
        assert!(c.field_names(&order("1")).is_empty());
        assert!(c.drain().is_empty());
        assert_eq!(std::mem::size_of::<NullChangesCollector>(), 0);
    }

    #[test]
    fn json_lists_kinds_per_field() {
        let mut c = DocumentChangesCollector::new();
        c.collect_change(&order("7"), "Qty", ChangeKind::Value, &Reason::from("x"));
        assert_eq!(
            c.to_json(),
            serde_json::json!([{ "document": "C_Order/7", "fields": { "Qty": ["value"] } }])
        );
    }
}
