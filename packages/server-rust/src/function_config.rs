//! Static function-config file: fixed records seeded into the store.
//!
//! Each non-blank line has the form `name | field1,value1,field2,value2`.
//! All whitespace is removed from both halves, and the right-hand side is a
//! flat list of field/value pairs written as one hash under `name`.

use std::path::Path;

use crate::error::ConfigError;

/// One record declared in the function-config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parses the text of a function-config file.
///
/// # Errors
///
/// Returns [`ConfigError`] naming the 1-based line for a missing `|`, an
/// empty record name, or an odd number of field/value items.
pub fn parse(text: &str) -> Result<Vec<FunctionRecord>, ConfigError> {
    let mut records = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let (name, values) = raw
            .split_once('|')
            .ok_or(ConfigError::MissingSeparator { line })?;
        let name = strip_whitespace(name);
        if name.is_empty() {
            return Err(ConfigError::EmptyName { line });
        }

        let values = strip_whitespace(values);
        let items: Vec<&str> = if values.is_empty() {
            Vec::new()
        } else {
            values.split(',').collect()
        };
        if items.len() % 2 != 0 {
            return Err(ConfigError::UnpairedFields {
                line,
                count: items.len(),
            });
        }

        let fields = items
            .chunks_exact(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
        records.push(FunctionRecord { name, fields });
    }

    Ok(records)
}

/// Reads and parses the function-config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Unreadable`] if the file cannot be read, or any
/// parse error from [`parse`].
pub async fn load(path: &Path) -> Result<Vec<FunctionRecord>, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    parse(&text)
}
