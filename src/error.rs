//! Scraper-specific error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("fetch failed for '{query}': {message}")]
    Fetch { query: String, message: String },

    #[error("location directory error: {message}")]
    Directory { message: String },

    #[error("translation failed: {message}")]
    Translation { message: String },

    #[error("export to {path} failed: {message}")]
    Export { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl ScraperError {
    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
        }
    }

    pub fn fetch(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            query: query.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
