//! Title search through IMDb's public suggestion endpoint.

#![allow(clippy::non_std_lazy_statics)]

use crate::config::IMDB_HTTP_TIMEOUT_SECS;
use crate::imdb::model::MovieCandidate;
use crate::imdb::ImdbError;
use lazy_regex::lazy_regex;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Suggestion endpoint; the query becomes the last path segment.
pub const SUGGESTION_ENDPOINT: &str = "https://v3.sg.media-imdb.com/suggestion/titles/x/";

static RE_TITLE_ID: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"tt(\d+)");

/// Result of a search that reached the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Candidates in endpoint ranking order
    Found(Vec<MovieCandidate>),
    /// The endpoint answered with no suggestions
    NoResults,
}

#[derive(Debug, Deserialize)]
struct SuggestionResponse {
    #[serde(default)]
    d: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    id: Option<String>,
    l: Option<String>,
    y: Option<i64>,
    yr: Option<String>,
    q: Option<String>,
}

/// Client of the suggestion endpoint.
#[derive(Clone)]
pub struct MovieResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl MovieResolver {
    /// Resolver against the public endpoint.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: SUGGESTION_ENDPOINT.to_string(),
        }
    }

    /// Look up candidates for a free-text query.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for a blank query, `SearchUnavailable` for transport,
    /// HTTP or decoding failures.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, ImdbError> {
        let url = suggestion_url(&self.endpoint, query)?;
        debug!("IMDb suggestion request: {url}");

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(IMDB_HTTP_TIMEOUT_SECS))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ImdbError::SearchUnavailable(e.to_string()))?;

        let body: SuggestionResponse = response
            .json()
            .await
            .map_err(|e| ImdbError::SearchUnavailable(e.to_string()))?;

        Ok(candidates_from(body))
    }
}

/// Build the suggestion url for `query`.
///
/// # Errors
///
/// Returns `InvalidQuery` if the query is blank.
pub fn suggestion_url(endpoint: &str, query: &str) -> Result<Url, ImdbError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ImdbError::InvalidQuery("empty query".to_string()));
    }

    let mut url =
        Url::parse(endpoint).map_err(|e| ImdbError::SearchUnavailable(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ImdbError::SearchUnavailable(format!("bad endpoint: {endpoint}")))?
        .pop_if_empty()
        .push(&format!("{query}.json"));
    Ok(url)
}

/// Decode a raw suggestion payload.
///
/// # Errors
///
/// Returns `SearchUnavailable` if the payload is not valid JSON.
pub fn parse_suggestions(body: &str) -> Result<SearchOutcome, ImdbError> {
    serde_json::from_str(body)
        .map(candidates_from)
        .map_err(|e| ImdbError::SearchUnavailable(e.to_string()))
}

fn candidates_from(response: SuggestionResponse) -> SearchOutcome {
    let candidates: Vec<MovieCandidate> = response
        .d
        .into_iter()
        .filter_map(|suggestion| {
            let candidate = candidate_from(suggestion);
            if candidate.is_none() {
                warn!("Dropping IMDb suggestion without a title id");
            }
            candidate
        })
        .collect();

    if candidates.is_empty() {
        SearchOutcome::NoResults
    } else {
        SearchOutcome::Found(candidates)
    }
}

fn candidate_from(suggestion: Suggestion) -> Option<MovieCandidate> {
    let id = RE_TITLE_ID
        .captures(suggestion.id.as_deref()?)?
        .get(1)?
        .as_str()
        .to_string();

    let year = suggestion
        .yr
        .filter(|yr| !yr.is_empty())
        .or_else(|| suggestion.y.map(|y| y.to_string()));

    let kind = suggestion
        .q
        .map_or_else(|| "N/A".to_string(), |q| title_case(&q.replace("feature", "movie")));

    Some(MovieCandidate {
        id,
        title: suggestion.l.unwrap_or_default(),
        year,
        kind,
    })
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_url_escapes_query() -> Result<(), ImdbError> {
        let url = suggestion_url(SUGGESTION_ENDPOINT, "AC/DC live")?;
        assert_eq!(
            url.as_str(),
            "https://v3.sg.media-imdb.com/suggestion/titles/x/AC%2FDC%20live.json"
        );
        Ok(())
    }

    #[test]
    fn test_blank_query_rejected() {
        assert!(matches!(
            suggestion_url(SUGGESTION_ENDPOINT, "   "),
            Err(ImdbError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_parse_candidates() -> Result<(), ImdbError> {
        let body = r#"{"d": [
            {"id": "tt0107290", "l": "Jurassic Park", "y": 1993, "q": "feature"},
            {"id": "tt0903747", "l": "Breaking Bad", "y": 2008, "yr": "2008-2013", "q": "TV series"},
            {"id": "nm0000229", "l": "Steven Spielberg"},
            {"id": "tt1234567", "l": "Untitled"}
        ]}"#;

        let SearchOutcome::Found(candidates) = parse_suggestions(body)? else {
            panic!("expected candidates");
        };
        assert_eq!(candidates.len(), 3);

        assert_eq!(candidates[0].id, "0107290");
        assert_eq!(candidates[0].year_display(), "1993");
        assert_eq!(candidates[0].kind, "Movie");

        assert_eq!(candidates[1].year.as_deref(), Some("2008-2013"));
        assert_eq!(candidates[1].kind, "Tv Series");

        assert_eq!(candidates[2].year_display(), "N/A");
        assert_eq!(candidates[2].kind, "N/A");
        Ok(())
    }

    #[test]
    fn test_empty_suggestions_are_no_results() -> Result<(), ImdbError> {
        assert_eq!(parse_suggestions(r#"{"d": []}"#)?, SearchOutcome::NoResults);
        assert_eq!(parse_suggestions(r#"{"v": 1}"#)?, SearchOutcome::NoResults);
        Ok(())
    }

    #[test]
    fn test_garbage_is_unavailable() {
        assert!(matches!(
            parse_suggestions("<html>rate limited</html>"),
            Err(ImdbError::SearchUnavailable(_))
        ));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("TV mini-series"), "Tv Mini-Series");
        assert_eq!(title_case("video game"), "Video Game");
    }
}
