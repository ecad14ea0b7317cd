//! Source fetchers: the collaborators that actually pull data for a chart.

pub mod command;
pub mod errors;
pub mod file;
pub mod registry;
pub mod traits;

pub use command::CommandFetcher;
pub use errors::FetchError;
pub use file::{CsvRowCounter, FileFetcher, RecordParser};
pub use registry::{FetcherRegistry, HybridFetcher};
pub use traits::{ProgressReporter, RefreshProgress, SourceFetcher};
