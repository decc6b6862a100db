//! Record assembly.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ConfigError;
use crate::models::record::{CalendarKey, ExtractionRecord, FieldValues, SourceDocument};

/// A field computed from another one: `name = from * factor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedField {
    pub name: String,
    pub from: String,
    pub factor: f64,
}

impl DerivedField {
    pub fn new(name: impl Into<String>, from: impl Into<String>, factor: f64) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            factor,
        }
    }
}

/// Combines extracted fields and a calendar key into a record.
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    primary: Vec<String>,
    derived: Vec<DerivedField>,
}

impl RecordAssembler {
    /// `primary` lists the fields of which at least one must be present.
    pub fn new(primary: Vec<String>, derived: Vec<DerivedField>) -> Result<Self, ConfigError> {
        if primary.is_empty() {
            return Err(ConfigError::Invalid("no primary fields configured".to_string()));
        }
        if let Some(bad) = derived.iter().find(|d| !d.factor.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "derived field {:?} has factor {}",
                bad.name, bad.factor
            )));
        }
        Ok(Self { primary, derived })
    }

    /// Whether any primary field is present.
    pub fn has_primary(&self, fields: &FieldValues) -> bool {
        self.primary.iter().any(|f| fields.contains_key(f))
    }

    /// Build a record; `None` without a key or without any primary field.
    pub fn assemble(
        &self,
        mut fields: FieldValues,
        key: Option<CalendarKey>,
        source: SourceDocument,
    ) -> Option<ExtractionRecord> {
        let key = key?;
        if !self.has_primary(&fields) {
            return None;
        }

        for derived in &self.derived {
            if let Some(value) = fields.get(&derived.from).copied() {
                trace!("{} = {} * {}", derived.name, derived.from, derived.factor);
                fields.insert(derived.name.clone(), value * derived.factor);
            }
        }

        Some(ExtractionRecord::new(key, fields, source))
    }
}
