//! Field and document descriptors.
//!
//! Descriptors are immutable metadata shared by every document of a type.
//! They are built once (from code, JSON or attribute definitions) and then
//! handed out behind `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use webdoc_core::{
    FieldType, LookupBinding, LookupDataSource, LookupKey, LookupValue, StaticLookupDataSource,
};

use crate::error::DescriptorError;
use crate::logic::LogicExpr;

// ──────────────────────────────────────────────
// Lookup descriptor
// ──────────────────────────────────────────────

/// Declares a field's lookup capability: the resolver and the fields whose
/// change makes the field's candidate list stale.
#[derive(Debug, Clone)]
pub struct LookupDescriptor {
    data_source: Arc<dyn LookupDataSource>,
    depends_on: Arc<BTreeSet<String>>,
}

impl LookupDescriptor {
    pub fn new<I, S>(data_source: Arc<dyn LookupDataSource>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LookupDescriptor {
            data_source,
            depends_on: Arc::new(depends_on.into_iter().map(Into::into).collect()),
        }
    }

    /// A lookup over a fixed list of values.
    pub fn of_values<I, S>(values: Vec<LookupValue>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Arc::new(StaticLookupDataSource::new(values)), depends_on)
    }

    pub fn data_source(&self) -> &Arc<dyn LookupDataSource> {
        &self.data_source
    }

    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    /// A fresh, non-stale binding for one field instance.
    pub fn create_binding(&self, numeric_key: bool) -> LookupBinding {
        LookupBinding::new(
            Arc::clone(&self.data_source),
            Arc::clone(&self.depends_on),
            numeric_key,
        )
    }
}

// ──────────────────────────────────────────────
// Field descriptor
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    field_name: String,
    caption: String,
    field_type: FieldType,
    mandatory_logic: LogicExpr,
    readonly_logic: LogicExpr,
    display_logic: LogicExpr,
    lookup: Option<LookupDescriptor>,
    key: bool,
    virtual_field: bool,
    calculated: bool,
}

impl FieldDescriptor {
    pub fn builder(field_name: impl Into<String>, field_type: FieldType) -> FieldDescriptorBuilder {
        let field_name = field_name.into();
        FieldDescriptorBuilder {
            descriptor: FieldDescriptor {
                caption: field_name.clone(),
                field_name,
                field_type,
                mandatory_logic: LogicExpr::FALSE,
                readonly_logic: LogicExpr::FALSE,
                display_logic: LogicExpr::TRUE,
                lookup: None,
                key: false,
                virtual_field: false,
                calculated: false,
            },
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn mandatory_logic(&self) -> &LogicExpr {
        &self.mandatory_logic
    }

    pub fn readonly_logic(&self) -> &LogicExpr {
        &self.readonly_logic
    }

    pub fn display_logic(&self) -> &LogicExpr {
        &self.display_logic
    }

    pub fn lookup(&self) -> Option<&LookupDescriptor> {
        self.lookup.as_ref()
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn is_virtual_field(&self) -> bool {
        self.virtual_field
    }

    pub fn is_calculated(&self) -> bool {
        self.calculated
    }

    /// Binding for a new field instance, or `None` for non-lookup fields.
    pub fn create_lookup_binding(&self) -> Option<LookupBinding> {
        self.lookup
            .as_ref()
            .map(|l| l.create_binding(self.field_type.is_numeric_lookup()))
    }

    /// Fields read by the mandatory, readonly or display rules.
    pub fn logic_dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.mandatory_logic.referenced_fields();
        deps.extend(self.readonly_logic.referenced_fields());
        deps.extend(self.display_logic.referenced_fields());
        deps
    }
}

pub struct FieldDescriptorBuilder {
    descriptor: FieldDescriptor,
}

impl FieldDescriptorBuilder {
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.descriptor.caption = caption.into();
        self
    }

    pub fn mandatory(mut self, logic: impl Into<LogicExpr>) -> Self {
        self.descriptor.mandatory_logic = logic.into();
        self
    }

    pub fn readonly(mut self, logic: impl Into<LogicExpr>) -> Self {
        self.descriptor.readonly_logic = logic.into();
        self
    }

    pub fn displayed(mut self, logic: impl Into<LogicExpr>) -> Self {
        self.descriptor.display_logic = logic.into();
        self
    }

    pub fn lookup(mut self, lookup: LookupDescriptor) -> Self {
        self.descriptor.lookup = Some(lookup);
        self
    }

    pub fn key(mut self, key: bool) -> Self {
        self.descriptor.key = key;
        self
    }

    pub fn virtual_field(mut self, virtual_field: bool) -> Self {
        self.descriptor.virtual_field = virtual_field;
        self
    }

    pub fn calculated(mut self, calculated: bool) -> Self {
        self.descriptor.calculated = calculated;
        self
    }

    pub fn build(self) -> Result<FieldDescriptor, DescriptorError> {
        let d = self.descriptor;
        if d.lookup.is_some() && !d.field_type.is_lookup() {
            return Err(DescriptorError::LookupOnPlainField {
                field_name: d.field_name,
                field_type: d.field_type.to_string(),
            });
        }
        Ok(d)
    }
}

// ──────────────────────────────────────────────
// Document descriptor
// ──────────────────────────────────────────────

/// Ordered field descriptors of one document type plus the dependency
/// edges derived from them.
#[derive(Debug)]
pub struct DocumentDescriptor {
    document_type: String,
    caption: String,
    fields: Vec<Arc<FieldDescriptor>>,
    index: BTreeMap<String, usize>,
    /// trigger field -> lookup fields that go stale when it changes
    lookup_dependents: BTreeMap<String, Vec<usize>>,
    /// field -> fields whose mandatory/readonly/display rules read it
    logic_dependents: BTreeMap<String, Vec<usize>>,
}

impl DocumentDescriptor {
    pub fn builder(document_type: impl Into<String>) -> DocumentDescriptorBuilder {
        let document_type = document_type.into();
        DocumentDescriptorBuilder {
            caption: document_type.clone(),
            document_type,
            fields: Vec::new(),
        }
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    pub fn field(&self, field_name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.index.get(field_name).map(|&i| &self.fields[i])
    }

    pub fn field_index(&self, field_name: &str) -> Option<usize> {
        self.index.get(field_name).copied()
    }

    /// Positions of the lookup fields that declare `trigger` as a dependency.
    pub fn lookup_dependents(&self, trigger: &str) -> &[usize] {
        self.lookup_dependents
            .get(trigger)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Positions of the fields whose flag rules read `field_name`.
    pub fn logic_dependents(&self, field_name: &str) -> &[usize] {
        self.logic_dependents
            .get(field_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Parse a document descriptor from JSON.
    ///
    /// ```json
    /// { "document_type": "C_Order", "caption": "Sales Order",
    ///   "fields": [ { "name": "Qty", "type": "decimal", "mandatory": true },
    ///               { "name": "C_Region_ID", "type": "integer_lookup",
    ///                 "lookup": { "values": [ { "key": 1, "display": "Bavaria" } ],
    ///                             "depends_on": [ "C_Country_ID" ] } } ] }
    /// ```
    pub fn from_json(v: &serde_json::Value) -> Result<DocumentDescriptor, DescriptorError> {
        let doc: DocumentJson =
            serde_json::from_value(v.clone()).map_err(|e| DescriptorError::Invalid {
                message: e.to_string(),
            })?;
        let mut builder = DocumentDescriptor::builder(doc.document_type);
        if let Some(caption) = doc.caption {
            builder = builder.caption(caption);
        }
        for field in doc.fields {
            builder = builder.add_field(field.into_descriptor()?);
        }
        builder.build()
    }
}

pub struct DocumentDescriptorBuilder {
    document_type: String,
    caption: String,
    fields: Vec<FieldDescriptor>,
}

impl DocumentDescriptorBuilder {
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn add_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<DocumentDescriptor, DescriptorError> {
        let mut index = BTreeMap::new();
        for (i, f) in self.fields.iter().enumerate() {
            if index.insert(f.field_name.clone(), i).is_some() {
                return Err(DescriptorError::DuplicateField {
                    document_type: self.document_type,
                    field_name: f.field_name.clone(),
                });
            }
        }

        let mut lookup_dependents: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut logic_dependents: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, f) in self.fields.iter().enumerate() {
            let lookup_deps = f.lookup.iter().flat_map(|l| l.depends_on().iter().cloned());
            for trigger in lookup_deps {
                if trigger == f.field_name {
                    return Err(DescriptorError::SelfDependency {
                        field_name: trigger,
                    });
                }
                check_known(&index, &f.field_name, &trigger)?;
                lookup_dependents.entry(trigger).or_default().push(i);
            }
            for dep in f.logic_dependencies() {
                check_known(&index, &f.field_name, &dep)?;
                logic_dependents.entry(dep).or_default().push(i);
            }
        }

        Ok(DocumentDescriptor {
            document_type: self.document_type,
            caption: self.caption,
            fields: self.fields.into_iter().map(Arc::new).collect(),
            index,
            lookup_dependents,
            logic_dependents,
        })
    }
}

fn check_known(
    index: &BTreeMap<String, usize>,
    field_name: &str,
    dependency: &str,
) -> Result<(), DescriptorError> {
    if index.contains_key(dependency) {
        Ok(())
    } else {
        Err(DescriptorError::UnknownDependency {
            field_name: field_name.to_string(),
            dependency: dependency.to_string(),
        })
    }
}

// ──────────────────────────────────────────────
// JSON form
// ──────────────────────────────────────────────

#[derive(Deserialize)]
struct DocumentJson {
    document_type: String,
    caption: Option<String>,
    fields: Vec<FieldJson>,
}

#[derive(Deserialize)]
struct FieldJson {
    name: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    caption: Option<String>,
    mandatory: Option<serde_json::Value>,
    readonly: Option<serde_json::Value>,
    displayed: Option<serde_json::Value>,
    #[serde(default)]
    key: bool,
    #[serde(default, rename = "virtual")]
    virtual_field: bool,
    #[serde(default)]
    calculated: bool,
    lookup: Option<LookupJson>,
}

#[derive(Deserialize)]
struct LookupJson {
    #[serde(default)]
    values: Vec<LookupEntryJson>,
    #[serde(default)]
    depends_on: Vec<String>,
}

#[derive(Deserialize)]
struct LookupEntryJson {
    key: serde_json::Value,
    #[serde(default, alias = "caption")]
    display: String,
}

impl FieldJson {
    fn into_descriptor(self) -> Result<FieldDescriptor, DescriptorError> {
        let mut builder = FieldDescriptor::builder(self.name.clone(), self.field_type)
            .key(self.key)
            .virtual_field(self.virtual_field)
            .calculated(self.calculated);
        if let Some(caption) = self.caption {
            builder = builder.caption(caption);
        }
        if let Some(v) = &self.mandatory {
            builder = builder.mandatory(LogicExpr::from_json(v)?);
        }
        if let Some(v) = &self.readonly {
            builder = builder.readonly(LogicExpr::from_json(v)?);
        }
        if let Some(v) = &self.displayed {
            builder = builder.displayed(LogicExpr::from_json(v)?);
        }
        if let Some(lookup) = self.lookup {
            let numeric = self.field_type.is_numeric_lookup();
            let values = lookup
                .values
                .into_iter()
                .map(|entry| {
                    let key = lookup_key(&self.name, &entry.key, numeric)?;
                    Ok(LookupValue::new(key, entry.display))
                })
                .collect::<Result<Vec<_>, DescriptorError>>()?;
            builder = builder.lookup(LookupDescriptor::of_values(values, lookup.depends_on));
        }
        builder.build()
    }
}

fn lookup_key(
    field_name: &str,
    key: &serde_json::Value,
    numeric: bool,
) -> Result<LookupKey, DescriptorError> {
    let invalid = || DescriptorError::Invalid {
        message: format!("invalid lookup key {} for field '{}'", key, field_name),
    };
    match (key, numeric) {
        (serde_json::Value::Number(n), true) => n.as_i64().map(LookupKey::Integer).ok_or_else(invalid),
        (serde_json::Value::String(s), true) => {
            s.trim().parse().map(LookupKey::Integer).map_err(|_| invalid())
        }
        (serde_json::Value::Number(n), false) => Ok(LookupKey::Text(n.to_string())),
        (serde_json::Value::String(s), false) => Ok(LookupKey::Text(s.clone())),
        _ => Err(invalid()),
    }
}
