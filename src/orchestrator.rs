//! Per-country orchestration
//!
//! Drives one country end-to-end: loads the progress tree, builds the task
//! list from the location directory (skipping completed leaves up front),
//! runs the bounded scheduler, merges results through the deduplicator, and
//! persists progress plus export snapshots at every state boundary. Countries
//! are processed strictly one after another so total concurrent fetch
//! sessions stay bounded by the configured parallelism.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Settings;
use crate::core::{
    dedup, CancellationFlag, CountryOutcome, ProgressStore, ProgressTree, RetryPolicy, RunStats,
    TaskOutcome, TaskScheduler,
};
use crate::error::{Result, ScraperError};
use crate::logging;
use crate::services::{CategoryFilter, ExportManager};
use crate::traits::{BusinessFetcher, LocationDirectory, Translator};
use crate::types::{BusinessRecord, LocationNode, Task};

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Composes the progress store, scheduler, deduplicator, and exporter over
/// the injected collaborators.
pub struct Orchestrator<D, F, T>
where
    D: LocationDirectory,
    F: BusinessFetcher + 'static,
    T: Translator,
{
    settings: Settings,
    directory: D,
    fetcher: Arc<F>,
    translator: T,
    progress: ProgressStore,
    exporter: ExportManager,
    categories: CategoryFilter,
    cancel: CancellationFlag,
}

impl<D, F, T> Orchestrator<D, F, T>
where
    D: LocationDirectory,
    F: BusinessFetcher + 'static,
    T: Translator,
{
    pub fn new(
        settings: Settings,
        directory: D,
        fetcher: F,
        translator: T,
        cancel: CancellationFlag,
    ) -> Self {
        let progress = ProgressStore::new(&settings.output_dir);
        let exporter = ExportManager::new(&settings.output_dir);
        let categories = CategoryFilter::load(&settings.categories_file);
        Self {
            settings,
            directory,
            fetcher: Arc::new(fetcher),
            translator,
            progress,
            exporter,
            categories,
            cancel,
        }
    }

    /// Replace the category filter, mainly for tests.
    pub fn with_category_filter(mut self, categories: CategoryFilter) -> Self {
        self.categories = categories;
        self
    }

    /// Process every configured country in order and return run statistics.
    ///
    /// Fails only when the location directory was unreachable for every
    /// requested country and nothing at all was processed.
    pub async fn run(&self) -> Result<RunStats> {
        let mut stats = RunStats::new();
        let mut listing_failures = 0usize;

        for code in &self.settings.countries {
            if self.cancel.is_cancelled() {
                logging::log_shutdown("skipping remaining countries");
                break;
            }

            let (outcome, deduplicated) = self.process_country(code, &mut stats).await;
            if outcome == CountryOutcome::ListingFailed {
                listing_failures += 1;
            }
            let interrupted = outcome == CountryOutcome::Interrupted;
            stats.record_country(&outcome, deduplicated);
            if interrupted {
                break;
            }
        }

        if listing_failures == self.settings.countries.len() && stats.countries_processed == 0 {
            return Err(ScraperError::directory(
                "location directory unreachable for every requested country",
            ));
        }
        Ok(stats)
    }

    async fn process_country(&self, code: &str, stats: &mut RunStats) -> (CountryOutcome, usize) {
        let country = match self.directory.country(code).await {
            Ok(country) => country,
            Err(e) => {
                logging::log_error(&format!("Listing country {code}"), &e);
                return (CountryOutcome::ListingFailed, 0);
            }
        };

        let mut tree = self.progress.load(&self.settings.query, &country.code).await;
        if tree.is_country_done(&country.code) {
            info!("⏭️  {} already complete, no fetches needed", country.name);
            return (CountryOutcome::AlreadyComplete, 0);
        }

        let states = match self.directory.states(&country).await {
            Ok(states) => states,
            Err(e) => {
                logging::log_error(&format!("Listing states of {}", country.name), &e);
                return (CountryOutcome::ListingFailed, 0);
            }
        };

        let search_query = self.render_query(&country).await;
        let (tasks, mut pending) = self
            .build_tasks(&country, &states, &search_query, &mut tree)
            .await;
        logging::log_progress(
            "Country start",
            &format!(
                "{}: {} tasks across {} states (parallel {})",
                country.name,
                tasks.len(),
                states.len(),
                self.settings.parallel
            ),
        );

        // The snapshot closure makes the scheduler skip any leaf finished
        // before this run; freshly built tasks are all unfinished, so this
        // is a second guard rather than the primary filter.
        let skip_tree = tree.clone();
        let skip_country = country.code.clone();
        let should_skip = move |task: &Task| match &task.city {
            Some(city) => skip_tree.is_city_done(&skip_country, &task.state.code, &city.name),
            None => skip_tree.is_state_done(&skip_country, &task.state.name),
        };

        let retry = RetryPolicy::new(self.settings.retry, RETRY_BASE_DELAY);
        let fetcher = self.fetcher.clone();
        let execute = move |task: Task| {
            let fetcher = fetcher.clone();
            async move {
                let label = task.to_string();
                retry
                    .run(&label, || {
                        let fetcher = fetcher.clone();
                        let query = task.query.clone();
                        let country_code = task.country.code.clone();
                        async move { fetcher.fetch(&query, &country_code).await }
                    })
                    .await
            }
        };

        let scheduler = TaskScheduler::new(
            self.settings.parallel,
            self.settings.min_delay,
            self.settings.max_delay,
            self.cancel.clone(),
        );
        let mut completions = scheduler.run(tasks, should_skip, execute);

        // Single consumer: every tree and accumulator mutation happens here,
        // so concurrent completions never interleave a read-modify-write.
        let mut accumulated: Vec<BusinessRecord> = Vec::new();
        let mut failures_per_state: HashMap<String, u32> = HashMap::new();
        while let Some(completion) = completions.recv().await {
            let task = completion.task;
            let state_name = task.state.name.clone();

            match completion.outcome {
                TaskOutcome::Fetched(raw) => {
                    let prepared = self.prepare_records(raw, &task);
                    let kept = prepared.len();
                    accumulated = dedup::merge(accumulated, prepared);
                    match &task.city {
                        Some(city) => {
                            tree.mark_city_complete(&country.code, &task.state.code, &city.name)
                        }
                        None => tree.mark_state_complete(&country.code, &state_name),
                    }
                    stats.completed_leaves += 1;
                    logging::log_progress("Leaf complete", &format!("{task} ({kept} records)"));
                }
                TaskOutcome::Failed(message) => {
                    *failures_per_state.entry(state_name.clone()).or_insert(0) += 1;
                    stats.failed_leaves += 1;
                    logging::log_error(&format!("Task {task}"), &message);
                }
                TaskOutcome::Skipped => stats.skipped_leaves += 1,
            }

            if let Some(remaining) = pending.get_mut(&state_name) {
                *remaining -= 1;
                if *remaining == 0 {
                    pending.remove(&state_name);
                    let failed = failures_per_state.get(&state_name).copied().unwrap_or(0);
                    if self.settings.include_cities && failed == 0 {
                        tree.mark_state_complete(&country.code, &state_name);
                    }
                    // State boundary: persist progress and snapshot the
                    // state's accumulated subset.
                    self.persist(&country.code, &tree).await;
                    self.export_scope(&accumulated, &country.code, &state_name, Some(&state_name))
                        .await;
                }
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            // Flush state snapshots for states interrupted mid-stream so
            // nothing fetched this run is lost.
            for state_name in pending.keys() {
                self.export_scope(&accumulated, &country.code, state_name, Some(state_name))
                    .await;
            }
        }

        let all_states_done = states
            .iter()
            .all(|state| tree.is_state_done(&country.code, &state.name));
        if !cancelled && all_states_done {
            tree.mark_country_complete(&country.code);
        }

        self.persist(&country.code, &tree).await;
        self.export_scope(&accumulated, &country.code, &country.code, None)
            .await;

        let outcome = if cancelled {
            CountryOutcome::Interrupted
        } else if tree.is_country_done(&country.code) {
            logging::log_success(&format!(
                "{} complete: {} unique businesses",
                country.name,
                accumulated.len()
            ));
            CountryOutcome::Completed
        } else {
            warn!(
                "⚠️  {} finished with failed leaves; they will be retried next run",
                country.name
            );
            CountryOutcome::Partial
        };
        (outcome, accumulated.len())
    }

    /// Translate the configured query when localization is on, falling back
    /// to the original on any error.
    async fn render_query(&self, country: &LocationNode) -> String {
        if !self.settings.localize {
            return self.settings.query.clone();
        }
        match self
            .translator
            .translate(&self.settings.query, &country.code)
            .await
        {
            Ok(translated) => {
                if translated != self.settings.query {
                    info!(
                        "🌐 Localized query for {}: '{}'",
                        country.name, translated
                    );
                }
                translated
            }
            Err(e) => {
                warn!(
                    "Translation for {} failed ({}), using original query",
                    country.name, e
                );
                self.settings.query.clone()
            }
        }
    }

    /// Build the task list, skipping leaves already done as a fast path, and
    /// return scheduled-leaf counts per state for boundary tracking.
    async fn build_tasks(
        &self,
        country: &LocationNode,
        states: &[LocationNode],
        search_query: &str,
        tree: &mut ProgressTree,
    ) -> (Vec<Task>, HashMap<String, usize>) {
        let mut tasks = Vec::new();
        let mut pending = HashMap::new();

        for state in states {
            if tree.is_state_done(&country.code, &state.name) {
                continue;
            }

            if self.settings.include_cities {
                let cities = match self.directory.cities(country, state).await {
                    Ok(cities) => cities,
                    Err(e) => {
                        logging::log_error(&format!("Listing cities of {}", state.name), &e);
                        continue;
                    }
                };

                let mut scheduled = 0usize;
                for city in cities {
                    if tree.is_city_done(&country.code, &state.code, &city.name) {
                        continue;
                    }
                    tasks.push(Task {
                        query: format!(
                            "{} in {}, {}, {}",
                            search_query, city.name, state.name, country.name
                        ),
                        country: country.clone(),
                        state: state.clone(),
                        city: Some(city),
                    });
                    scheduled += 1;
                }

                if scheduled == 0 {
                    // Every city finished on a previous run; promote the
                    // state now so the invariant holds.
                    tree.mark_state_complete(&country.code, &state.name);
                } else {
                    pending.insert(state.name.clone(), scheduled);
                }
            } else {
                tasks.push(Task {
                    query: format!("{} in {}, {}", search_query, state.name, country.name),
                    country: country.clone(),
                    state: state.clone(),
                    city: None,
                });
                pending.insert(state.name.clone(), 1);
            }
        }

        (tasks, pending)
    }

    /// Stamp provenance and apply the category allow-list.
    fn prepare_records(&self, raw: Vec<BusinessRecord>, task: &Task) -> Vec<BusinessRecord> {
        raw.into_iter()
            .filter(|record| self.categories.allows(record.category.as_deref()))
            .map(|mut record| {
                record.source_query = task.query.clone();
                record.source_country_code = task.country.code.clone();
                record.country = task.country.name.clone();
                record.state = task.state.name.clone();
                record.city = task.city.as_ref().map(|city| city.name.clone());
                record
            })
            .collect()
    }

    /// Save the tree; a failure is logged and the run continues on the
    /// in-memory tree.
    async fn persist(&self, country_code: &str, tree: &ProgressTree) {
        if let Err(e) = self
            .progress
            .save(&self.settings.query, country_code, tree)
            .await
        {
            logging::log_error("Saving progress", &e);
        }
    }

    /// Export a snapshot for one scope: the state subset when `state_filter`
    /// is set, otherwise the whole country accumulator.
    async fn export_scope(
        &self,
        accumulated: &[BusinessRecord],
        country_code: &str,
        scope: &str,
        state_filter: Option<&str>,
    ) {
        let subset: Vec<BusinessRecord> = match state_filter {
            Some(state) => accumulated
                .iter()
                .filter(|record| record.state == state)
                .cloned()
                .collect(),
            None => accumulated.to_vec(),
        };
        if subset.is_empty() {
            return;
        }
        self.exporter
            .write(
                &subset,
                &self.settings.query,
                country_code,
                scope,
                &self.settings.export,
            )
            .await;
    }
}
