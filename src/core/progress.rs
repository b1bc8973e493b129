//! Persisted completion tree per (query, country)
//!
//! The tree records which leaves, states, and countries have been fully
//! processed. Entries are monotonic: once `true` they are never cleared by a
//! later run; re-scraping a completed leaf requires deleting its entry or
//! the whole file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;

/// Nested completion state, keyed as:
/// countries by `countryCode`, states by `countryCode-stateName`,
/// cities by `countryCode-stateCode-cityName`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressTree {
    completed: CompletedSets,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CompletedSets {
    #[serde(default)]
    countries: BTreeMap<String, bool>,
    #[serde(default)]
    states: BTreeMap<String, bool>,
    #[serde(default)]
    cities: BTreeMap<String, bool>,
}

impl ProgressTree {
    fn state_key(country_code: &str, state_name: &str) -> String {
        format!("{country_code}-{state_name}")
    }

    fn city_key(country_code: &str, state_code: &str, city_name: &str) -> String {
        format!("{country_code}-{state_code}-{city_name}")
    }

    pub fn mark_country_complete(&mut self, country_code: &str) {
        self.completed
            .countries
            .insert(country_code.to_string(), true);
    }

    pub fn mark_state_complete(&mut self, country_code: &str, state_name: &str) {
        self.completed
            .states
            .insert(Self::state_key(country_code, state_name), true);
    }

    pub fn mark_city_complete(&mut self, country_code: &str, state_code: &str, city_name: &str) {
        self.completed
            .cities
            .insert(Self::city_key(country_code, state_code, city_name), true);
    }

    pub fn is_country_done(&self, country_code: &str) -> bool {
        self.completed
            .countries
            .get(country_code)
            .copied()
            .unwrap_or(false)
    }

    pub fn is_state_done(&self, country_code: &str, state_name: &str) -> bool {
        self.completed
            .states
            .get(&Self::state_key(country_code, state_name))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_city_done(&self, country_code: &str, state_code: &str, city_name: &str) -> bool {
        self.completed
            .cities
            .get(&Self::city_key(country_code, state_code, city_name))
            .copied()
            .unwrap_or(false)
    }
}

/// Loads and saves progress trees under
/// `{base}/{query}/{country}/progress.json`.
pub struct ProgressStore {
    base_dir: PathBuf,
}

impl ProgressStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn country_dir(&self, query: &str, country_code: &str) -> PathBuf {
        self.base_dir
            .join(sanitize_path_segment(query))
            .join(country_code)
    }

    fn progress_path(&self, query: &str, country_code: &str) -> PathBuf {
        self.country_dir(query, country_code).join("progress.json")
    }

    /// Load the tree for a (query, country) pair.
    ///
    /// A missing or corrupt file yields an empty tree; corruption is logged
    /// and never fatal.
    pub async fn load(&self, query: &str, country_code: &str) -> ProgressTree {
        let path = self.progress_path(query, country_code);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => {
                debug!("No progress file at {}, starting fresh", path.display());
                return ProgressTree::default();
            }
        };

        match serde_json::from_str::<ProgressTree>(&content) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(
                    "Progress file {} is corrupt ({}), starting fresh",
                    path.display(),
                    e
                );
                ProgressTree::default()
            }
        }
    }

    /// Save the tree atomically: write to a temp path, then rename, so a
    /// crash mid-write never leaves a truncated file.
    pub async fn save(&self, query: &str, country_code: &str, tree: &ProgressTree) -> Result<()> {
        let path = self.progress_path(query, country_code);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(tree)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!("Saved progress to {}", path.display());
        Ok(())
    }
}

/// Make a query or scope name safe as a single path component.
pub fn sanitize_path_segment(segment: &str) -> String {
    let cleaned: String = segment
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
