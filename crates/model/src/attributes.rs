//! Document descriptors for product attribute sets.
//!
//! An attribute set is a named list of attributes, each with a one-letter
//! value type code. The factory turns a set into a [`DocumentDescriptor`]
//! and caches the result by attribute set id.

use std::sync::Arc;

use webdoc_core::{FieldType, LookupValue};

use crate::cache::{DescriptorCache, DEFAULT_CAPACITY};
use crate::descriptor::{DocumentDescriptor, FieldDescriptor, LookupDescriptor};
use crate::error::DescriptorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeValueType {
    Date,
    List,
    Number,
    String,
}

impl AttributeValueType {
    pub fn from_code(code: &str) -> Option<AttributeValueType> {
        match code {
            "D" => Some(AttributeValueType::Date),
            "L" => Some(AttributeValueType::List),
            "N" => Some(AttributeValueType::Number),
            "S" => Some(AttributeValueType::String),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AttributeValueType::Date => "D",
            AttributeValueType::List => "L",
            AttributeValueType::Number => "N",
            AttributeValueType::String => "S",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            AttributeValueType::Date => FieldType::DateTime,
            AttributeValueType::List => FieldType::TextLookup,
            AttributeValueType::Number => FieldType::Decimal,
            AttributeValueType::String => FieldType::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    pub name: String,
    pub caption: String,
    /// Raw value type code as stored with the attribute.
    pub value_type: String,
    pub mandatory: bool,
    /// Allowed values of a list attribute.
    pub values: Vec<LookupValue>,
}

#[derive(Debug, Clone)]
pub struct AttributeSet {
    pub id: i64,
    pub name: String,
    pub attributes: Vec<AttributeDefinition>,
}

/// Where attribute sets come from.
pub trait AttributeSetSource: Send + Sync {
    fn load_attribute_set(&self, attribute_set_id: i64) -> Result<AttributeSet, DescriptorError>;
}

/// Document type name used for the descriptor of an attribute set.
pub fn attribute_set_document_type(attribute_set_id: i64) -> String {
    format!("attribute_set_{}", attribute_set_id)
}

/// Build the descriptor for one attribute set.
pub fn build_descriptor(set: &AttributeSet) -> Result<DocumentDescriptor, DescriptorError> {
    let mut builder = DocumentDescriptor::builder(attribute_set_document_type(set.id))
        .caption(set.name.clone());
    for attribute in &set.attributes {
        let value_type = AttributeValueType::from_code(&attribute.value_type).ok_or_else(|| {
            DescriptorError::UnsupportedAttributeValueType {
                attribute: attribute.name.clone(),
                value_type: attribute.value_type.clone(),
            }
        })?;
        let mut field = FieldDescriptor::builder(attribute.name.clone(), value_type.field_type())
            .caption(attribute.caption.clone())
            .mandatory(attribute.mandatory);
        if value_type == AttributeValueType::List {
            field = field.lookup(LookupDescriptor::of_values(
                attribute.values.clone(),
                Vec::<String>::new(),
            ));
        }
        builder = builder.add_field(field.build()?);
    }
    builder.build()
}

/// Cached attribute-set descriptors.
pub struct AttributeSetDescriptorFactory<S> {
    source: S,
    cache: DescriptorCache<i64, DocumentDescriptor>,
}

impl<S: AttributeSetSource> AttributeSetDescriptorFactory<S> {
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(source: S, capacity: u64) -> Self {
        AttributeSetDescriptorFactory {
            source,
            cache: DescriptorCache::new("attribute_set_descriptors", capacity),
        }
    }

    pub fn descriptor(
        &self,
        attribute_set_id: i64,
    ) -> Result<Arc<DocumentDescriptor>, DescriptorError> {
        if attribute_set_id <= 0 {
            return Err(DescriptorError::AttributeSetUnavailable {
                attribute_set_id,
                message: "no attribute set id".to_string(),
            });
        }
        self.cache.get_or_load(attribute_set_id, |&id| {
            let set = self.source.load_attribute_set(id)?;
            build_descriptor(&set)
        })
    }

    /// Drop the cached descriptor so the next request reloads it.
    pub fn invalidate(&self, attribute_set_id: i64) {
        self.cache.invalidate(&attribute_set_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Sets {
        loads: AtomicUsize,
    }

    impl AttributeSetSource for Sets {
        fn load_attribute_set(&self, id: i64) -> Result<AttributeSet, DescriptorError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if id != 17 {
                return Err(DescriptorError::AttributeSetUnavailable {
                    attribute_set_id: id,
                    message: "not found".into(),
                });
            }
            Ok(AttributeSet {
                id,
                name: "Wine".into(),
                attributes: vec![
                    attribute("Vintage", "D", false, vec![]),
                    attribute(
                        "Color",
                        "L",
                        true,
                        vec![LookupValue::text("R", "Red"), LookupValue::text("W", "White")],
                    ),
                    attribute("Volume", "N", false, vec![]),
                    attribute("Label", "S", false, vec![]),
                ],
            })
        }
    }

    fn attribute(name: &str, code: &str, mandatory: bool, values: Vec<LookupValue>) -> AttributeDefinition {
        AttributeDefinition {
            name: name.into(),
            caption: name.into(),
            value_type: code.into(),
            mandatory,
            values,
        }
    }

    #[test]
    fn maps_value_types_to_field_types() {
        let factory = AttributeSetDescriptorFactory::new(Sets { loads: AtomicUsize::new(0) });
        let d = factory.descriptor(17).unwrap();
        assert_eq!(d.document_type(), "attribute_set_17");
        let types: Vec<FieldType> = d.fields().iter().map(|f| f.field_type()).collect();
        assert_eq!(
            types,
            vec![FieldType::DateTime, FieldType::TextLookup, FieldType::Decimal, FieldType::Text]
        );
        let color = d.field("Color").unwrap();
        assert_eq!(color.mandatory_logic().as_constant(), Some(true));
        assert!(color.lookup().is_some());
    }

    #[test]
    fn descriptors_are_cached_until_invalidated() {
        let factory = AttributeSetDescriptorFactory::new(Sets { loads: AtomicUsize::new(0) });
        let first = factory.descriptor(17).unwrap();
        let second = factory.descriptor(17).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.source.loads.load(Ordering::SeqCst), 1);

        factory.invalidate(17);
        factory.descriptor(17).unwrap();
        assert_eq!(factory.source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rejects_missing_ids_and_unknown_types() {
        let factory = AttributeSetDescriptorFactory::new(Sets { loads: AtomicUsize::new(0) });
        assert!(matches!(
            factory.descriptor(0),
            Err(DescriptorError::AttributeSetUnavailable { attribute_set_id: 0, .. })
        ));
        assert!(factory.descriptor(3).is_err());

        let set = AttributeSet {
            id: 1,
            name: "Odd".into(),
            attributes: vec![attribute("Shape", "X", false, vec![])],
        };
        assert_eq!(
            build_descriptor(&set).unwrap_err(),
            DescriptorError::UnsupportedAttributeValueType {
                attribute: "Shape".into(),
                value_type: "X".into(),
            }
        );
    }
}
