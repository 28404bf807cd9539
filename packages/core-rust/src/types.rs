use std::collections::BTreeMap;

/// Field/value pairs of a store hash record.
///
/// Ordered so that a record always serializes to the same JSON text.
pub type FieldMap = BTreeMap<String, String>;
