//! The document aggregate: an ordered arena of fields built from a
//! [`DocumentDescriptor`].
//!
//! A document has a single writer. Concurrent or speculative edits work on a
//! [`Document::copy`], and batches are applied copy-on-write by
//! [`Document::process_value_changes`].

use std::sync::Arc;

use webdoc_core::{LookupQuery, LookupValue, RawValue, Value, FIRST_ROW};

use crate::changes::{ChangesCollector, DocumentChangesCollector, NullChangesCollector};
use crate::descriptor::DocumentDescriptor;
use crate::error::DocumentError;
use crate::field::Field;
use crate::logic::LogicContext;
use crate::path::DocumentPath;
use crate::reason::Reason;

#[derive(Debug)]
pub struct Document {
    descriptor: Arc<DocumentDescriptor>,
    path: DocumentPath,
    fields: Vec<Field>,
}

impl Document {
    /// A new, empty document with one field per descriptor field.
    pub fn new(descriptor: Arc<DocumentDescriptor>, document_id: impl Into<String>) -> Self {
        let path = DocumentPath::new(descriptor.document_type(), document_id);
        let fields = descriptor
            .fields()
            .iter()
            .map(|d| Field::new(Arc::clone(d), path.clone()))
            .collect();
        let mut document = Document {
            descriptor,
            path,
            fields,
        };
        document.evaluate_all_flags(&mut NullChangesCollector, &Reason::from("new document"));
        document
    }

    pub fn descriptor(&self) -> &Arc<DocumentDescriptor> {
        &self.descriptor
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, field_name: &str) -> Option<&Field> {
        self.descriptor
            .field_index(field_name)
            .map(|i| &self.fields[i])
    }

    fn index_of(&self, field_name: &str) -> Result<usize, DocumentError> {
        self.descriptor
            .field_index(field_name)
            .ok_or_else(|| DocumentError::UnknownField {
                document: self.path.to_string(),
                field_name: field_name.to_string(),
            })
    }

    // ──────────────────────────────────────────────
    // Loading
    // ──────────────────────────────────────────────

    /// Set baseline values, then evaluate every field's dynamic flags.
    /// Loading reports no changes. On error the document is left as it was.
    pub fn load<I, K>(&mut self, values: I) -> Result<(), DocumentError>
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: AsRef<str>,
    {
        let mut loaded = self.copy();
        for (field_name, raw) in values {
            let idx = loaded.index_of(field_name.as_ref())?;
            loaded.fields[idx].set_initial_value(&raw)?;
        }
        loaded.evaluate_all_flags(&mut NullChangesCollector, &Reason::from("document loaded"));
        *self = loaded;
        Ok(())
    }

    pub fn load_json(
        &mut self,
        values: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), DocumentError> {
        self.load(
            values
                .iter()
                .map(|(name, v)| (name.as_str(), RawValue::from_json(v))),
        )
    }

    // ──────────────────────────────────────────────
    // Edits
    // ──────────────────────────────────────────────

    /// Apply one named value change.
    ///
    /// On an actual change, lookups that declare the field as a trigger are
    /// marked stale (one hop) and the flag rules reading the field are
    /// re-evaluated. Returns whether the value changed.
    pub fn process_value_change(
        &mut self,
        field_name: &str,
        raw: &RawValue,
        reason: &Reason,
        changes: &mut dyn ChangesCollector,
    ) -> Result<bool, DocumentError> {
        let idx = self.index_of(field_name)?;
        if !self.fields[idx].set_value(raw, changes, reason)? {
            return Ok(false);
        }

        let descriptor = Arc::clone(&self.descriptor);
        for &dep in descriptor.lookup_dependents(field_name) {
            let field = &mut self.fields[dep];
            if field.set_lookup_values_staled(field_name) {
                tracing::debug!(
                    document = %self.path,
                    field = field.field_name(),
                    trigger = field_name,
                    "lookup values staled"
                );
                changes.collect_lookup_values_staled(field, reason);
            }
        }
        for &dep in descriptor.logic_dependents(field_name) {
            self.evaluate_flags(dep, changes, reason);
        }
        Ok(true)
    }

    /// Apply a batch of changes atomically.
    ///
    /// The batch runs against a copy with a private collector. Only when
    /// every change succeeds is the copy swapped in and its events merged
    /// into `changes`; on error neither this document nor `changes` is
    /// touched.
    pub fn process_value_changes<I, K>(
        &mut self,
        batch: I,
        reason: &Reason,
        changes: &mut dyn ChangesCollector,
    ) -> Result<(), DocumentError>
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: AsRef<str>,
    {
        let mut working = self.copy();
        let mut local = DocumentChangesCollector::new();
        for (field_name, raw) in batch {
            working.process_value_change(field_name.as_ref(), &raw, reason, &mut local)?;
        }
        *self = working;
        changes.collect_from(&local);
        Ok(())
    }

    /// An independent snapshot with copied field state.
    pub fn copy(&self) -> Document {
        Document {
            descriptor: Arc::clone(&self.descriptor),
            path: self.path.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| f.copy(self.path.clone()))
                .collect(),
        }
    }

    /// Re-baseline every field after a save.
    pub fn mark_saved(&mut self) {
        for field in &mut self.fields {
            field.mark_saved();
        }
    }

    fn evaluate_all_flags(&mut self, changes: &mut dyn ChangesCollector, reason: &Reason) {
        for idx in 0..self.fields.len() {
            self.evaluate_flags(idx, changes, reason);
        }
    }

    fn evaluate_flags(&mut self, idx: usize, changes: &mut dyn ChangesCollector, reason: &Reason) {
        let descriptor = Arc::clone(self.fields[idx].descriptor());
        let ctx: &dyn LogicContext = &*self;
        let mandatory = descriptor.mandatory_logic().evaluate(ctx);
        let readonly = descriptor.readonly_logic().evaluate(ctx);
        let displayed = descriptor.display_logic().evaluate(ctx);

        let field = &mut self.fields[idx];
        field.set_mandatory(mandatory, changes, reason);
        field.set_readonly(readonly, changes, reason);
        field.set_displayed(displayed, changes, reason);
    }

    // ──────────────────────────────────────────────
    // Queries
    // ──────────────────────────────────────────────

    pub fn is_valid(&self) -> bool {
        self.fields.iter().all(Field::is_valid)
    }

    pub fn invalid_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.is_valid())
            .map(Field::field_name)
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.fields.iter().any(Field::has_changes)
    }

    /// Lookup candidates for `field_name`, filtered and paged. The current
    /// values of the lookup's trigger fields are passed as query parameters.
    pub fn lookup_values(
        &mut self,
        field_name: &str,
        filter: Option<&str>,
        page_length: usize,
    ) -> Result<Vec<LookupValue>, DocumentError> {
        let idx = self.index_of(field_name)?;
        let mut query = LookupQuery::new().with_page(FIRST_ROW, page_length);
        if let Some(filter) = filter {
            query = query.with_filter(filter);
        }
        if let Some(lookup) = self.fields[idx].descriptor().lookup() {
            for trigger in lookup.depends_on() {
                let value = self.field(trigger).and_then(Field::value).cloned();
                query = query.with_parameter(trigger.clone(), value);
            }
        }
        Ok(self.fields[idx].lookup_values(&query)?)
    }

    /// Current values keyed by field name.
    pub fn to_json_values(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|f| (f.field_name().to_string(), f.value_as_json()))
            .collect()
    }
}

impl LogicContext for Document {
    fn field_value(&self, field_name: &str) -> Option<&Value> {
        self.field(field_name).and_then(Field::value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeKind;
    use crate::descriptor::FieldDescriptor;
    use crate::logic::LogicExpr;
    use webdoc_core::FieldType;

    fn descriptor() -> Arc<DocumentDescriptor> {
        let d = DocumentDescriptor::builder("C_Order")
            .add_field(
                FieldDescriptor::builder("DeliveryRule", FieldType::Text)
                    .build()
                    .unwrap(),
            )
            .add_field(
                FieldDescriptor::builder("DeliveryDate", FieldType::DateTime)
                    .mandatory(LogicExpr::Equals {
                        field: "DeliveryRule".into(),
                        value: "F".into(),
                    })
                    .displayed(LogicExpr::IsSet("DeliveryRule".into()))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        Arc::new(d)
    }

    #[test]
    fn new_document_evaluates_flags() {
        let doc = Document::new(descriptor(), "1");
        let date = doc.field("DeliveryDate").unwrap();
        assert!(!date.is_displayed());
        assert!(!date.is_mandatory());
        assert!(doc.is_valid());
    }

    #[test]
    fn value_change_reevaluates_dependent_rules() {
        let mut doc = Document::new(descriptor(), "1");
        let mut c = DocumentChangesCollector::new();
        doc.process_value_change("DeliveryRule", &"F".into(), &Reason::from("edit"), &mut c)
            .unwrap();

        let date = doc.field("DeliveryDate").unwrap();
        assert!(date.is_displayed());
        assert!(date.is_mandatory());
        assert_eq!(doc.invalid_fields(), vec!["DeliveryDate"]);

        let kinds: Vec<ChangeKind> = c
            .document_changes(doc.path())
            .unwrap()
            .field("DeliveryDate")
            .unwrap()
            .kinds()
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Mandatory, ChangeKind::Displayed, ChangeKind::ValidStatus]
        );
    }

    #[test]
    fn unknown_field_is_reported() {
        let mut doc = Document::new(descriptor(), "1");
        let err = doc
            .process_value_change("Nope", &"x".into(), &Reason::from("edit"), &mut NullChangesCollector)
            .unwrap_err();
        assert_eq!(
            err,
            DocumentError::UnknownField {
                document: "C_Order/1".into(),
                field_name: "Nope".into(),
            }
        );
    }

    #[test]
    fn load_is_silent_and_sets_baseline() {
        let mut doc = Document::new(descriptor(), "1");
        let values = serde_json::json!({ "DeliveryRule": "F", "DeliveryDate": "2024-03-01" });
        doc.load_json(values.as_object().unwrap()).unwrap();
        assert!(!doc.has_changes());
        assert!(doc.is_valid());
        assert_eq!(
            doc.to_json_values()["DeliveryDate"],
            serde_json::json!("2024-03-01T00:00:00Z")
        );
    }

    #[test]
    fn failed_load_leaves_document_unchanged() {
        let mut doc = Document::new(descriptor(), "1");
        let err = doc
            .load([
                ("DeliveryRule", RawValue::from("F")),
                ("DeliveryDate", RawValue::from("not a date")),
            ])
            .unwrap_err();
        assert!(matches!(err, DocumentError::Field(_)));

        let rule = doc.field("DeliveryRule").unwrap();
        assert_eq!(rule.value(), None);
        assert_eq!(rule.initial_value(), None);
        let date = doc.field("DeliveryDate").unwrap();
        assert!(!date.is_displayed());
        assert!(!date.is_mandatory());
    }
}
