//! Persisted store types.

use std::collections::BTreeMap;

use cw_core::TimeAxis;
use serde::{Deserialize, Serialize};

/// Store-level manifest, written once at creation.
///
/// The axis recorded here is the run period every series in the store is
/// validated against; it takes the place of a global time-step table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreManifest {
    pub format_version: u32,
    pub store_id: String,
    pub created: String,
    pub axis: TimeAxis,
}

pub const FORMAT_VERSION: u32 = 1;

/// A constant per-catchment parameter with its unit tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub value: f64,
    pub unit: String,
}

/// Constant parameters of one catchment (total area, application area, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, Parameter>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64, unit: impl Into<String>) {
        self.0.insert(
            name.into(),
            Parameter {
                value,
                unit: unit.into(),
            },
        );
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.0.get(name).map(|p| p.value)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Parameter)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_lookup() {
        let mut params = ParameterSet::new();
        params.insert("A_tot", 1.5e7, "m**2");
        params.insert("A_appl", 2.0e6, "m**2");

        assert_eq!(params.value("A_tot"), Some(1.5e7));
        assert_eq!(params.get("A_appl").unwrap().unit, "m**2");
        assert_eq!(params.value("missing"), None);
        assert_eq!(params.len(), 2);
    }
}
