//! webdoc core -- typed field values, raw value coercion and lookup bindings.
//!
//! Documents in a metadata-driven UI are dynamic bags of named fields. This
//! crate holds the leaf pieces every field is built from: the closed set of
//! target types and typed values, the tagged raw representations a transport
//! delivers, the coercion engine that maps one onto the other, and the lookup
//! binding that resolves reference values and tracks staleness.

pub mod coerce;
pub mod error;
pub mod lookup;
pub mod raw;
pub mod values;

pub use coerce::{coerce, parse_date_time};
pub use error::FieldError;
pub use lookup::{
    LookupBinding, LookupDataSource, LookupQuery, StaticLookupDataSource, DEFAULT_PAGE_LENGTH,
    FIRST_ROW,
};
pub use raw::RawValue;
pub use values::{value_to_json, FieldType, LookupKey, LookupValue, Value};
