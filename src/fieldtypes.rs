// 🔎 Field Type Audit - which value types appear in each CSV column
// Every cell starts life as a string; this infers what it actually holds

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Rows right after the header that carry column metadata, not data
pub const METADATA_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// "NULL" or empty
    NoneType,
    /// Brace-wrapped multi-value cell ("{1.1|2.2}")
    List,
    Int,
    Float,
    Str,
}

impl FieldType {
    pub fn infer(value: &str) -> Self {
        if value == "NULL" || value.is_empty() {
            FieldType::NoneType
        } else if value.starts_with('{') {
            FieldType::List
        } else if is_integer(value.trim()) {
            FieldType::Int
        } else if value.trim().parse::<f64>().is_ok() {
            FieldType::Float
        } else {
            FieldType::Str
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::NoneType => "NoneType",
            FieldType::List => "list",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Str => "str",
        }
    }
}

/// Optional sign followed by digits, of any length
fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types seen per requested field, skipping the metadata rows
pub fn audit_file(path: &Path, fields: &[&str]) -> Result<BTreeMap<String, BTreeSet<FieldType>>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let mut columns = Vec::with_capacity(fields.len());
    for field in fields {
        match headers.iter().position(|h| h == *field) {
            Some(idx) => columns.push((field.to_string(), idx)),
            None => bail!("Field {:?} not found in {}", field, path.display()),
        }
    }

    let mut field_types: BTreeMap<String, BTreeSet<FieldType>> = fields
        .iter()
        .map(|f| (f.to_string(), BTreeSet::new()))
        .collect();

    for (row_num, result) in reader.records().enumerate().skip(METADATA_ROWS) {
        let record = result.with_context(|| {
            format!("Failed to parse CSV line {} in {}", row_num + 2, path.display())
        })?;

        for (field, idx) in &columns {
            let value = record.get(*idx).unwrap_or("");
            if let Some(types) = field_types.get_mut(field) {
                types.insert(FieldType::infer(value));
            }
        }
    }

    Ok(field_types)
}

// ============================================================================
// TESTS
// ============================================================================
