pub mod browser;
pub mod cache;
pub mod config;
pub mod errors;
pub mod filters;
pub mod query;
pub mod report;
pub mod results;
pub mod search;

pub use browser::{ResultBrowser, Viewer};
pub use cache::{PdfTextCache, PdfToText, TextExtractor};
pub use config::{ConfigOverrides, CoralConfig};
pub use errors::{SearchError, SearchResult};
pub use filters::SearchFilters;
pub use query::{Query, SearchMode, SearchRequest};
pub use results::{Match, MatchOrigin, ResultSet, SearchOutput};
pub use search::{search, CancellationToken, SearchEngine};
