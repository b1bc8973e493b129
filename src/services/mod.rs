//! Service implementations
//!
//! Real implementations of the collaborator traits plus the export and
//! category-filter services. Everything that touches the network or the
//! filesystem lives here.

pub mod categories;
pub mod exporter;
pub mod fetcher;
pub mod locations;
pub mod translate;

pub use categories::CategoryFilter;
pub use exporter::ExportManager;
pub use fetcher::MapsFetcher;
pub use locations::CountriesNowDirectory;
pub use translate::GoogleTranslator;
