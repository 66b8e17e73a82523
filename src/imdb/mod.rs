//! IMDb lookup: search, page fetching, metadata extraction and caption
//! rendering driven by per-user display preferences.

/// Ephemeral store of queries waiting for a language choice
pub mod candidates;
/// Caption rendering (default layout and custom templates)
pub mod compose;
/// Translation and streaming availability lookups
pub mod enrich;
/// HTML to `MovieRecord` extraction
pub mod extractor;
/// Detail page retrieval with challenge fallbacks
pub mod fetcher;
/// Section visibility toggles
pub mod layout;
/// Domain records shared by the pipeline
pub mod model;
/// User preference operations on top of storage
pub mod preferences;
/// Title suggestion search
pub mod resolver;
/// End-to-end lookup wiring
pub mod service;

pub use candidates::CandidateCache;
pub use layout::{Language, Layout, LayoutField};
pub use model::{MovieCandidate, MovieRecord, Person};
pub use preferences::PreferenceStore;
pub use service::ImdbService;

use thiserror::Error;

/// Failures of the IMDb lookup pipeline.
///
/// Display strings are shown to users verbatim.
#[derive(Error, Debug)]
pub enum ImdbError {
    /// Blank query or malformed title identifier
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// Suggestion endpoint unreachable or returned an HTTP error
    #[error("IMDb search is unavailable: {0}")]
    SearchUnavailable(String),
    /// Detail page could not be retrieved
    #[error("failed to fetch the IMDb page: {0}")]
    FetchFailed(String),
    /// Every retrieval strategy ran without yielding structured metadata
    #[error(
        "could not read IMDb metadata (status={status}, waf={}, solver={solver_responded})",
        waf_action.as_deref().unwrap_or("none")
    )]
    MetadataUnavailable {
        /// Status of the direct request
        status: u16,
        /// WAF action header of the direct request
        waf_action: Option<String>,
        /// Whether the solver returned a body at all
        solver_responded: bool,
    },
}

/// Canonical detail page of a numeric title id.
#[must_use]
pub fn title_url(id: &str) -> String {
    format!("https://www.imdb.com/title/tt{id}/")
}

/// Validate the numeric part of a `tt` identifier.
///
/// # Errors
///
/// Returns `ImdbError::InvalidQuery` if `id` is empty or not all digits.
pub fn validate_title_id(id: &str) -> Result<&str, ImdbError> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id)
    } else {
        Err(ImdbError::InvalidQuery(format!("bad title id: {id}")))
    }
}
