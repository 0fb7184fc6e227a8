//! Document runtime for webdoc: descriptors, fields, documents and change
//! collection.
//!
//! A [`Document`] is built from a shared [`DocumentDescriptor`] and owns one
//! [`Field`] per descriptor field. Edits go through
//! [`Document::process_value_change`], which coerces the raw value, updates
//! validity, stales dependent lookups and re-evaluates flag rules. Every
//! UI-visible transition is reported to a [`ChangesCollector`].

pub mod attributes;
pub mod cache;
pub mod changes;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod field;
pub mod logic;
pub mod path;
pub mod reason;

pub use attributes::{
    AttributeDefinition, AttributeSet, AttributeSetDescriptorFactory, AttributeSetSource,
    AttributeValueType,
};
pub use cache::DescriptorCache;
pub use changes::{
    ChangeKind, ChangesCollector, DocumentChanges, DocumentChangesCollector, FieldChanges,
    NullChangesCollector,
};
pub use descriptor::{DocumentDescriptor, FieldDescriptor, LookupDescriptor};
pub use document::Document;
pub use error::{DescriptorError, DocumentError};
pub use field::Field;
pub use logic::{LogicContext, LogicExpr};
pub use path::DocumentPath;
pub use reason::Reason;
