//! Run configuration
//!
//! CLI flags with environment-variable fallbacks, so precedence is
//! CLI > environment > default. A `.env` file is loaded by main before
//! parsing, which slots in below real environment variables.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, ScraperError};
use crate::types::ExportFormat;

/// Resumable business scraper over a country/state/city hierarchy
#[derive(Parser, Debug, Clone)]
#[command(name = "prospector")]
#[command(about = "Scrapes business listings per geographic leaf, resumably and with bounded concurrency")]
pub struct Args {
    /// Search term, e.g. "dentist"
    #[arg(long, env = "PROSPECTOR_QUERY")]
    pub query: String,

    /// Comma-separated ISO-2 country codes to process, in order
    #[arg(long, env = "PROSPECTOR_COUNTRIES", value_delimiter = ',', required = true)]
    pub countries: Vec<String>,

    /// Enumerate one task per city instead of one per state
    #[arg(long, env = "PROSPECTOR_INCLUDE_CITIES", action = clap::ArgAction::SetTrue)]
    pub include_cities: bool,

    /// Translate the query into each country's primary language (best effort)
    #[arg(long, env = "PROSPECTOR_LOCALIZE", action = clap::ArgAction::SetTrue)]
    pub localize: bool,

    /// Maximum concurrent tasks per country
    #[arg(long, env = "PROSPECTOR_PARALLEL", default_value_t = 1)]
    pub parallel: usize,

    /// Lower bound of the randomized inter-task pause, in milliseconds
    #[arg(long, env = "PROSPECTOR_MIN_DELAY", default_value_t = 10)]
    pub min_delay: u64,

    /// Upper bound of the randomized inter-task pause, in milliseconds
    #[arg(long, env = "PROSPECTOR_MAX_DELAY", default_value_t = 100)]
    pub max_delay: u64,

    /// Max retry attempts per task (0 = fail immediately on first error)
    #[arg(long, env = "PROSPECTOR_RETRY", default_value_t = 0)]
    pub retry: u32,

    /// Export formats to write at each snapshot scope
    #[arg(long, env = "PROSPECTOR_EXPORT", value_delimiter = ',', default_value = "json")]
    pub export: Vec<ExportFormat>,

    /// Root directory for progress files and result snapshots
    #[arg(long, env = "PROSPECTOR_OUTPUT", default_value = "./output")]
    pub output: PathBuf,

    /// Allow-list of category substrings, one per line; absent file disables filtering
    #[arg(long, env = "PROSPECTOR_CATEGORIES_FILE", default_value = "./allowed_categories.txt")]
    pub categories_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PROSPECTOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Validated run settings derived from [`Args`]
#[derive(Debug, Clone)]
pub struct Settings {
    pub query: String,
    pub countries: Vec<String>,
    pub include_cities: bool,
    pub localize: bool,
    pub parallel: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub retry: u32,
    pub export: Vec<ExportFormat>,
    pub output_dir: PathBuf,
    pub categories_file: PathBuf,
}

impl Settings {
    pub fn from_args(args: Args) -> Result<Self> {
        if args.query.trim().is_empty() {
            return Err(ScraperError::Config("query must not be empty".to_string()));
        }
        if args.parallel < 1 {
            return Err(ScraperError::Config("parallel must be at least 1".to_string()));
        }
        if args.min_delay > args.max_delay {
            return Err(ScraperError::Config(format!(
                "min-delay ({}) must not exceed max-delay ({})",
                args.min_delay, args.max_delay
            )));
        }

        let countries: Vec<String> = args
            .countries
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        if countries.is_empty() {
            return Err(ScraperError::Config(
                "at least one country code must be supplied".to_string(),
            ));
        }

        let mut export = args.export;
        export.sort();
        export.dedup();

        Ok(Self {
            query: args.query.trim().to_string(),
            countries,
            include_cities: args.include_cities,
            localize: args.localize,
            parallel: args.parallel,
            min_delay: Duration::from_millis(args.min_delay),
            max_delay: Duration::from_millis(args.max_delay),
            retry: args.retry,
            export,
            output_dir: args.output,
            categories_file: args.categories_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["prospector", "--query", "dentist", "--countries", "mk,de"])
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::from_args(base_args()).unwrap();
        assert_eq!(settings.parallel, 1);
        assert_eq!(settings.retry, 0);
        assert_eq!(settings.min_delay, Duration::from_millis(10));
        assert_eq!(settings.max_delay, Duration::from_millis(100));
        assert_eq!(settings.export, vec![ExportFormat::Json]);
        assert!(!settings.include_cities);
        assert!(!settings.localize);
    }

    #[test]
    fn country_codes_are_normalized_to_uppercase() {
        let settings = Settings::from_args(base_args()).unwrap();
        assert_eq!(settings.countries, vec!["MK", "DE"]);
    }

    #[test]
    fn rejects_inverted_delay_window() {
        let mut args = base_args();
        args.min_delay = 500;
        args.max_delay = 100;
        assert!(Settings::from_args(args).is_err());
    }

    #[test]
    fn export_formats_parse_as_comma_set_and_dedupe() {
        let args = Args::parse_from([
            "prospector",
            "--query",
            "dentist",
            "--countries",
            "mk",
            "--export",
            "json,csv,json",
        ]);
        let settings = Settings::from_args(args).unwrap();
        assert_eq!(settings.export, vec![ExportFormat::Json, ExportFormat::Csv]);
    }
}
