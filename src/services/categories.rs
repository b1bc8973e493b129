//! Category allow-list filtering
//!
//! Reads one category substring per line from a config file, matched
//! case-insensitively against a record's category field. An absent file
//! means no filtering at all.

use std::path::Path;
use tracing::{debug, info};

/// Read-only, process-wide allow-list initialized once at startup.
#[derive(Clone, Debug, Default)]
pub struct CategoryFilter {
    patterns: Vec<String>,
}

impl CategoryFilter {
    /// Load the allow-list from `path`. A missing or unreadable file yields
    /// an empty (pass-everything) filter.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No category file at {}, filtering disabled", path.display());
                return Self::default();
            }
        };

        let patterns: Vec<String> = content
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();

        info!(
            "Loaded {} allowed category patterns from {}",
            patterns.len(),
            path.display()
        );
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a record with this category passes the filter. With an empty
    /// allow-list everything passes; with a non-empty one, a record without
    /// a category cannot match and is dropped.
    pub fn allows(&self, category: Option<&str>) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        match category {
            Some(category) => {
                let lower = category.to_lowercase();
                self.patterns.iter().any(|pattern| lower.contains(pattern))
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn absent_file_passes_everything() {
        let filter = CategoryFilter::load(Path::new("/nonexistent/allowed_categories.txt"));
        assert!(filter.is_empty());
        assert!(filter.allows(Some("Dentist")));
        assert!(filter.allows(None));
    }

    #[test]
    fn matches_are_case_insensitive_substrings() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dental").unwrap();
        writeln!(file, "Clinic").unwrap();

        let filter = CategoryFilter::load(file.path());
        assert!(filter.allows(Some("Dental office")));
        assert!(filter.allows(Some("Eye CLINIC")));
        assert!(!filter.allows(Some("Restaurant")));
        assert!(!filter.allows(None));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# trusted categories").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "dental").unwrap();

        let filter = CategoryFilter::load(file.path());
        assert!(!filter.is_empty());
        assert!(filter.allows(Some("dental lab")));
        assert!(!filter.allows(Some("# trusted categories")));
    }
}
