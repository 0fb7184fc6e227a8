use std::sync::Arc;

use webdoc_core::{
    coerce, value_to_json, FieldError, FieldType, LookupBinding, LookupQuery, LookupValue, RawValue,
    Value,
};

use crate::changes::{ChangesCollector, NullChangesCollector};
use crate::descriptor::FieldDescriptor;
use crate::path::DocumentPath;
use crate::reason::Reason;

/// One field of one document instance.
///
/// The stored value is always `None` or a [`Value`] of the descriptor's
/// declared type. Flags hold the evaluated per-instance state; the
/// descriptor's rules are evaluated by the owning document.
#[derive(Debug)]
pub struct Field {
    descriptor: Arc<FieldDescriptor>,
    document_path: DocumentPath,
    lookup: Option<LookupBinding>,
    initial_value: Option<Value>,
    value: Option<Value>,
    mandatory: bool,
    readonly: bool,
    displayed: bool,
    valid: bool,
}

impl Field {
    pub fn new(descriptor: Arc<FieldDescriptor>, document_path: DocumentPath) -> Self {
        let lookup = descriptor.create_lookup_binding();
        let mandatory = descriptor.mandatory_logic().as_constant().unwrap_or(false);
        let readonly = descriptor.readonly_logic().as_constant().unwrap_or(false);
        let displayed = descriptor.display_logic().as_constant().unwrap_or(true);
        Field {
            descriptor,
            document_path,
            lookup,
            initial_value: None,
            value: None,
            mandatory,
            readonly,
            displayed,
            valid: !mandatory,
        }
    }

    pub fn descriptor(&self) -> &Arc<FieldDescriptor> {
        &self.descriptor
    }

    pub fn field_name(&self) -> &str {
        self.descriptor.field_name()
    }

    pub fn field_type(&self) -> FieldType {
        self.descriptor.field_type()
    }

    pub fn document_path(&self) -> &DocumentPath {
        &self.document_path
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn initial_value(&self) -> Option<&Value> {
        self.initial_value.as_ref()
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_key(&self) -> bool {
        self.descriptor.is_key()
    }

    pub fn is_virtual(&self) -> bool {
        self.descriptor.is_virtual_field()
    }

    pub fn is_calculated(&self) -> bool {
        self.descriptor.is_calculated()
    }

    /// True when the current value differs from the baseline.
    pub fn has_changes(&self) -> bool {
        self.value != self.initial_value
    }

    // ──────────────────────────────────────────────
    // Value
    // ──────────────────────────────────────────────

    fn convert(&self, raw: &RawValue) -> Result<Option<Value>, FieldError> {
        coerce(
            self.descriptor.field_name(),
            raw,
            self.descriptor.field_type(),
            self.lookup.as_ref(),
        )
    }

    /// Set the loaded value: both the baseline and the current value.
    /// Produces no change events.
    pub fn set_initial_value(&mut self, raw: &RawValue) -> Result<(), FieldError> {
        let value = self.convert(raw)?;
        self.initial_value = value.clone();
        self.value = value;
        self.update_valid(&mut NullChangesCollector, &Reason::from("initial value"));
        Ok(())
    }

    /// Coerce and store `raw`. Returns `false` without reporting anything
    /// when the coerced value equals the current one.
    pub fn set_value(
        &mut self,
        raw: &RawValue,
        changes: &mut dyn ChangesCollector,
        reason: &Reason,
    ) -> Result<bool, FieldError> {
        let value = self.convert(raw)?;
        if value == self.value {
            return Ok(false);
        }
        tracing::trace!(
            document = %self.document_path,
            field = self.field_name(),
            old = ?self.value,
            new = ?value,
            "value changed"
        );
        self.value = value;
        changes.collect_value_changed(self, reason);
        self.update_valid(changes, reason);
        Ok(true)
    }

    /// Make the current value the new baseline.
    pub fn mark_saved(&mut self) {
        self.initial_value = self.value.clone();
    }

    /// Recompute validity. Reports and returns `true` only on a flip.
    pub fn update_valid(&mut self, changes: &mut dyn ChangesCollector, reason: &Reason) -> bool {
        let valid = self.check_valid();
        if valid == self.valid {
            return false;
        }
        tracing::debug!(
            document = %self.document_path,
            field = self.field_name(),
            valid,
            "validity changed"
        );
        self.valid = valid;
        changes.collect_valid_status_changed(self, reason);
        true
    }

    fn check_valid(&self) -> bool {
        !(self.mandatory && self.value.is_none())
    }

    // ──────────────────────────────────────────────
    // Flags
    // ──────────────────────────────────────────────

    pub fn set_mandatory(
        &mut self,
        mandatory: bool,
        changes: &mut dyn ChangesCollector,
        reason: &Reason,
    ) {
        if self.mandatory == mandatory {
            return;
        }
        self.mandatory = mandatory;
        changes.collect_mandatory_changed(self, reason);
        self.update_valid(changes, reason);
    }

    pub fn set_readonly(
        &mut self,
        readonly: bool,
        changes: &mut dyn ChangesCollector,
        reason: &Reason,
    ) {
        if self.readonly == readonly {
            return;
        }
        self.readonly = readonly;
        changes.collect_readonly_changed(self, reason);
    }

    pub fn set_displayed(
        &mut self,
        displayed: bool,
        changes: &mut dyn ChangesCollector,
        reason: &Reason,
    ) {
        if self.displayed == displayed {
            return;
        }
        self.displayed = displayed;
        changes.collect_displayed_changed(self, reason);
    }

    // ──────────────────────────────────────────────
    // Lookup
    // ──────────────────────────────────────────────

    pub fn is_lookup_with_numeric_key(&self) -> bool {
        self.lookup.as_ref().map_or(false, LookupBinding::is_numeric_key)
    }

    pub fn is_lookup_values_stale(&self) -> bool {
        self.lookup.as_ref().map_or(false, LookupBinding::is_staled)
    }

    /// Mark the lookup stale if `triggering_field` is one of its declared
    /// dependencies. Returns whether the flag flipped.
    pub fn set_lookup_values_staled(&mut self, triggering_field: &str) -> bool {
        match self.lookup.as_mut() {
            Some(binding) => binding.set_staled(triggering_field),
            None => false,
        }
    }

    /// Candidate values for this field. Fetching clears staleness.
    pub fn lookup_values(&mut self, query: &LookupQuery) -> Result<Vec<LookupValue>, FieldError> {
        let binding = self.lookup.as_mut().ok_or_else(|| FieldError::NotLookup {
            field_name: self.descriptor.field_name().to_string(),
        })?;
        Ok(binding.find_entities(query))
    }

    // ──────────────────────────────────────────────
    // Conversions
    // ──────────────────────────────────────────────

    fn value_as(&self, target: FieldType) -> Option<Value> {
        let value = self.value.clone()?;
        coerce(self.field_name(), &RawValue::Typed(value), target, None)
            .ok()
            .flatten()
    }

    /// The value as an integer, or `default` when absent or not convertible.
    pub fn value_as_int(&self, default: i64) -> i64 {
        match self.value_as(FieldType::Integer) {
            Some(Value::Integer(i)) => i,
            _ => default,
        }
    }

    pub fn value_as_bool(&self) -> bool {
        matches!(self.value_as(FieldType::Boolean), Some(Value::Boolean(true)))
    }

    pub fn value_as_json(&self) -> serde_json::Value {
        value_to_json(self.value.as_ref())
    }

    pub fn display_string(&self) -> String {
        self.value
            .as_ref()
            .map(Value::display_string)
            .unwrap_or_default()
    }

    /// An independent copy owned by `document_path`. The lookup binding is
    /// cloned, never shared.
    pub fn copy(&self, document_path: DocumentPath) -> Field {
        Field {
            descriptor: Arc::clone(&self.descriptor),
            document_path,
            lookup: self.lookup.clone(),
            initial_value: self.initial_value.clone(),
            value: self.value.clone(),
            mandatory: self.mandatory,
            readonly: self.readonly,
            displayed: self.displayed,
            valid: self.valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeKind, DocumentChangesCollector};
    use crate::descriptor::LookupDescriptor;
    use std::str::FromStr;

    fn path() -> DocumentPath {
        DocumentPath::new("C_Order", "1")
    }

    fn field(name: &str, field_type: FieldType, mandatory: bool) -> Field {
        let d = FieldDescriptor::builder(name, field_type)
            .mandatory(mandatory)
            .build()
            .unwrap();
        Field::new(Arc::new(d), path())
    }

    fn region() -> Field {
        let lookup = LookupDescriptor::of_values(
            vec![LookupValue::integer(7, "Bavaria"), LookupValue::integer(8, "Saxony")],
            ["C_Country_ID"],
        );
        let d = FieldDescriptor::builder("C_Region_ID", FieldType::IntegerLookup)
            .lookup(lookup)
            .build()
            .unwrap();
        Field::new(Arc::new(d), path())
    }

    fn kinds(c: &DocumentChangesCollector, field: &str) -> Vec<ChangeKind> {
        c.document_changes(&path())
            .and_then(|d| d.field(field))
            .map(|f| f.kinds().collect())
            .unwrap_or_default()
    }

    #[test]
    fn mandatory_decimal_tracks_validity() {
        let mut qty = field("Qty", FieldType::Decimal, true);
        assert!(!qty.is_valid());

        let mut c = DocumentChangesCollector::new();
        let reason = Reason::from("user edit");
        assert!(qty.set_value(&"12.5".into(), &mut c, &reason).unwrap());
        assert_eq!(
            qty.value(),
            Some(&Value::Decimal(rust_decimal::Decimal::from_str("12.5").unwrap()))
        );
        assert!(qty.is_valid());

        let mut c = DocumentChangesCollector::new();
        assert!(qty.set_value(&"".into(), &mut c, &reason).unwrap());
        assert_eq!(qty.value(), None);
        assert!(!qty.is_valid());
        assert_eq!(kinds(&c, "Qty"), vec![ChangeKind::Value, ChangeKind::ValidStatus]);
    }

    #[test]
    fn equal_value_is_a_no_op() {
        let mut qty = field("Qty", FieldType::Integer, false);
        let mut c = DocumentChangesCollector::new();
        let reason = Reason::from("x");
        assert!(qty.set_value(&RawValue::Integer(3), &mut c, &reason).unwrap());
        c.drain();
        assert!(!qty.set_value(&"3".into(), &mut c, &reason).unwrap());
        assert!(c.is_empty());
    }

    #[test]
    fn conversion_errors_leave_the_value_untouched() {
        let mut qty = field("Qty", FieldType::Integer, false);
        qty.set_initial_value(&RawValue::Integer(5)).unwrap();
        let mut c = DocumentChangesCollector::new();
        let err = qty
            .set_value(&"five".into(), &mut c, &Reason::from("x"))
            .unwrap_err();
        assert_eq!(err.field_name(), "Qty");
        assert_eq!(qty.value(), Some(&Value::Integer(5)));
        assert!(c.is_empty());
    }

    #[test]
    fn set_mandatory_rederives_validity() {
        let mut desc = field("Description", FieldType::Text, false);
        let mut c = DocumentChangesCollector::new();
        let reason = Reason::from("rule");
        desc.set_mandatory(true, &mut c, &reason);
        assert!(!desc.is_valid());
        assert_eq!(
            kinds(&c, "Description"),
            vec![ChangeKind::Mandatory, ChangeKind::ValidStatus]
        );

        desc.set_value(&"hello".into(), &mut c, &reason).unwrap();
        assert!(desc.is_valid());
    }

    #[test]
    fn flag_setters_report_only_flips() {
        let mut f = field("Description", FieldType::Text, false);
        let mut c = DocumentChangesCollector::new();
        let reason = Reason::from("rule");
        f.set_readonly(false, &mut c, &reason);
        f.set_displayed(true, &mut c, &reason);
        assert!(c.is_empty());
        f.set_readonly(true, &mut c, &reason);
        f.set_displayed(false, &mut c, &reason);
        assert_eq!(
            kinds(&c, "Description"),
            vec![ChangeKind::Readonly, ChangeKind::Displayed]
        );
    }

    #[test]
    fn initial_value_sets_baseline_without_events() {
        let mut qty = field("Qty", FieldType::Integer, true);
        qty.set_initial_value(&"4".into()).unwrap();
        assert!(qty.is_valid());
        assert!(!qty.has_changes());

        let mut c = DocumentChangesCollector::new();
        qty.set_value(&RawValue::Integer(9), &mut c, &Reason::from("x")).unwrap();
        assert!(qty.has_changes());
        qty.mark_saved();
        assert!(!qty.has_changes());
        assert_eq!(qty.initial_value(), Some(&Value::Integer(9)));
    }

    #[test]
    fn staleness_flips_only_for_declared_triggers() {
        let mut r = region();
        assert!(!r.set_lookup_values_staled("Description"));
        assert!(!r.is_lookup_values_stale());
        assert!(r.set_lookup_values_staled("C_Country_ID"));
        assert!(r.is_lookup_values_stale());
        assert!(!r.set_lookup_values_staled("C_Country_ID"));

        let values = r.lookup_values(&LookupQuery::new().with_filter("bav")).unwrap();
        assert_eq!(values, vec![LookupValue::integer(7, "Bavaria")]);
        assert!(!r.is_lookup_values_stale());
    }

    #[test]
    fn lookup_values_on_plain_field_is_a_capability_error() {
        let mut qty = field("Qty", FieldType::Integer, false);
        let err = qty.lookup_values(&LookupQuery::new()).unwrap_err();
        assert_eq!(err, FieldError::NotLookup { field_name: "Qty".into() });
    }

    #[test]
    fn lookup_field_resolves_numeric_text() {
        let mut r = region();
        let mut c = DocumentChangesCollector::new();
        r.set_value(&"8".into(), &mut c, &Reason::from("x")).unwrap();
        assert_eq!(r.display_string(), "Saxony");
        assert_eq!(r.value_as_int(-1), 8);
        assert!(r.is_lookup_with_numeric_key());
        assert_eq!(r.value_as_json(), serde_json::json!({ "key": 8, "display": "Saxony" }));
    }

    #[test]
    fn copy_is_independent() {
        let mut r = region();
        let mut c = DocumentChangesCollector::new();
        r.set_value(&RawValue::Integer(7), &mut c, &Reason::from("x")).unwrap();
        let mut copy = r.copy(DocumentPath::new("C_Order", "2"));
        assert!(copy.set_lookup_values_staled("C_Country_ID"));
        assert!(!r.is_lookup_values_stale());
        assert_eq!(copy.value(), r.value());
        assert_eq!(copy.document_path().document_id(), "2");
    }

    #[test]
    fn boolean_and_int_accessors_default() {
        let mut flag = field("IsSOTrx", FieldType::Boolean, false);
        assert!(!flag.value_as_bool());
        assert_eq!(flag.value_as_int(42), 42);
        flag.set_initial_value(&"Y".into()).unwrap();
        assert!(flag.value_as_bool());
        assert_eq!(flag.display_string(), "Yes");
    }
}
