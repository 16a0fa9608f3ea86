pub mod categorizer;
pub mod checksum;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod fmt;
pub mod importer;
pub mod models;
pub mod reports;
pub mod settings;
pub mod store;
pub mod upload;

pub use error::{Result, TallyError};
pub use fetcher::{FetchOutcome, FetchStatus, PaginatedFetcher, SkipReason};
pub use importer::RawLayout;
pub use store::ActivityStore;
