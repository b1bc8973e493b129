//! Run-level state and summary statistics

use std::time::{Duration, Instant};

/// How processing one country ended.
///
/// `Interrupted` is never persisted as such; on disk it is simply a
/// partially-filled progress tree, which the next run resumes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CountryOutcome {
    /// Every leaf was already marked complete; no fetch calls were issued
    AlreadyComplete,
    /// All states finished and the country was marked complete
    Completed,
    /// Some leaves failed after retries; the country stays incomplete
    Partial,
    /// Cancellation arrived while this country was in flight
    Interrupted,
    /// The location directory could not list this country
    ListingFailed,
}

/// Aggregated statistics across one run
#[derive(Debug)]
pub struct RunStats {
    started: Instant,
    pub countries_processed: u32,
    pub countries_completed: u32,
    pub countries_skipped: u32,
    pub total_businesses: u64,
    pub completed_leaves: u32,
    pub failed_leaves: u32,
    pub skipped_leaves: u32,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            countries_processed: 0,
            countries_completed: 0,
            countries_skipped: 0,
            total_businesses: 0,
            completed_leaves: 0,
            failed_leaves: 0,
            skipped_leaves: 0,
        }
    }

    pub fn record_country(&mut self, outcome: &CountryOutcome, deduplicated: usize) {
        self.total_businesses += deduplicated as u64;
        match outcome {
            CountryOutcome::Completed => {
                self.countries_processed += 1;
                self.countries_completed += 1;
            }
            CountryOutcome::AlreadyComplete => self.countries_skipped += 1,
            CountryOutcome::ListingFailed => self.countries_skipped += 1,
            CountryOutcome::Partial | CountryOutcome::Interrupted => {
                self.countries_processed += 1
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Human-readable run summary printed at exit.
    pub fn summary(&self) -> String {
        format!(
            "{} countries processed ({} completed, {} skipped), {} unique businesses, {} leaves done / {} failed / {} already complete, elapsed {:.1}s",
            self.countries_processed,
            self.countries_completed,
            self.countries_skipped,
            self.total_businesses,
            self.completed_leaves,
            self.failed_leaves,
            self.skipped_leaves,
            self.elapsed().as_secs_f64()
        )
    }
}
