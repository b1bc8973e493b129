//! Core data types shared across the orchestrator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Level of a node in the geographic hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    Country,
    State,
    City,
}

/// A single node of the country → state → city hierarchy.
///
/// Supplied by the location directory and immutable once fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationNode {
    /// Short code: ISO-2 for countries, state ISO where available,
    /// otherwise the name itself.
    pub code: String,
    pub name: String,
    pub kind: LocationKind,
    pub parent_code: Option<String>,
}

impl LocationNode {
    pub fn country(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: LocationKind::Country,
            parent_code: None,
        }
    }

    pub fn state(code: impl Into<String>, name: impl Into<String>, country_code: &str) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: LocationKind::State,
            parent_code: Some(country_code.to_string()),
        }
    }

    pub fn city(name: impl Into<String>, state_code: &str) -> Self {
        let name = name.into();
        Self {
            code: name.clone(),
            name,
            kind: LocationKind::City,
            parent_code: Some(state_code.to_string()),
        }
    }
}

/// One scheduled unit of work: a city when city-level scraping is enabled,
/// otherwise a state. Ephemeral, created per run and never persisted.
#[derive(Clone, Debug)]
pub struct Task {
    /// Fully rendered search query for this leaf, e.g.
    /// "dentist in Springfield, Illinois, United States".
    pub query: String,
    pub country: LocationNode,
    pub state: LocationNode,
    pub city: Option<LocationNode>,
}

impl Task {
    /// Progress-tree key of the leaf this task completes.
    pub fn leaf_key(&self) -> String {
        match &self.city {
            Some(city) => format!("{}-{}-{}", self.country.code, self.state.code, city.name),
            None => format!("{}-{}", self.country.code, self.state.name),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.city {
            Some(city) => write!(f, "{}/{}/{}", self.country.code, self.state.name, city.name),
            None => write!(f, "{}/{}", self.country.code, self.state.name),
        }
    }
}

/// A raw business listing plus provenance metadata.
///
/// Optional fields are omitted from JSON entirely so export columns reflect
/// the union of keys actually present in a batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    /// Identifier assigned by the origin website. Carried as data only; the
    /// same listing can surface under different source ids across nearby
    /// search radii, so it does not anchor identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    // Provenance, stamped by the orchestrator on completion
    #[serde(default)]
    pub source_query: String,
    #[serde(default)]
    pub source_country_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl BusinessRecord {
    /// Identity key for deduplication: `(name, formatted_address, phone)`
    /// with empty strings substituted for missing fields.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.name,
            self.formatted_address.as_deref().unwrap_or(""),
            self.phone_number.as_deref().unwrap_or("")
        )
    }
}

/// Output formats an export snapshot can be written in
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_substitutes_empty_for_missing_fields() {
        let record = BusinessRecord {
            name: "Acme".to_string(),
            ..Default::default()
        };
        assert_eq!(record.identity_key(), "Acme||");

        let full = BusinessRecord {
            name: "Acme".to_string(),
            formatted_address: Some("1 Main St".to_string()),
            phone_number: Some("+1 555 0100".to_string()),
            ..Default::default()
        };
        assert_eq!(full.identity_key(), "Acme|1 Main St|+1 555 0100");
    }

    #[test]
    fn leaf_key_uses_state_name_without_city_and_state_code_with_city() {
        let country = LocationNode::country("MK", "North Macedonia");
        let state = LocationNode::state("85", "Skopje Region", "MK");

        let state_task = Task {
            query: "q".to_string(),
            country: country.clone(),
            state: state.clone(),
            city: None,
        };
        assert_eq!(state_task.leaf_key(), "MK-Skopje Region");

        let city_task = Task {
            query: "q".to_string(),
            country,
            state: state.clone(),
            city: Some(LocationNode::city("Skopje", &state.code)),
        };
        assert_eq!(city_task.leaf_key(), "MK-85-Skopje");
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let record = BusinessRecord {
            name: "Acme".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("formatted_address"));
        assert!(!object.contains_key("phone_number"));
        assert!(object.contains_key("name"));
    }
}
