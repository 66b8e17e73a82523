//! Title page retrieval.
//!
//! A request walks a fixed sequence of [`FetchStage`]s and stops at the
//! first page that yields structured metadata:
//!
//! 1. `Direct`: plain GET. HTTP errors are final; a 202, a WAF action
//!    header or an empty body moves on to the scraper.
//! 2. `Scraper`: cookie-keeping client, up to three attempts while the
//!    response still looks like a challenge, then `FinalScrape` whose
//!    non-2xx status is final.
//! 3. `Solver`: remote headless renderer, used once when a page parsed
//!    without metadata. If it does not help and the scraper never ran, the
//!    scraper gets one more turn.

use crate::config::{
    IMDB_ACCEPT_LANGUAGE, IMDB_HTTP_TIMEOUT_SECS, IMDB_SCRAPER_ATTEMPTS,
    IMDB_SCRAPER_TIMEOUT_SECS, IMDB_SOLVER_TIMEOUT_SECS, IMDB_USER_AGENT,
};
use crate::imdb::model::MovieRecord;
use crate::imdb::{extractor, title_url, ImdbError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header IMDb's WAF sets on challenge responses
pub const WAF_ACTION_HEADER: &str = "x-amzn-waf-action";

/// A page as returned by one retrieval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// HTTP status
    pub status: u16,
    /// Value of the WAF action header, if any
    pub waf_action: Option<String>,
    /// Response body
    pub body: String,
}

impl RawPage {
    /// Whether a direct response must be retried through the scraper.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.status == 202 || self.waf_action.is_some() || self.body.trim().is_empty()
    }

    /// Whether a scraper response is still an unsolved challenge.
    #[must_use]
    pub fn is_challenge(&self) -> bool {
        self.status == 202
            || self.waf_action.as_deref() == Some("challenge")
            || self.body.trim().is_empty()
    }

    const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The three ways of getting a title page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Plain request with browser headers.
    async fn direct(&self, url: &str) -> Result<RawPage, ImdbError>;
    /// One attempt through the challenge-solving client.
    async fn scrape(&self, url: &str) -> Result<RawPage, ImdbError>;
    /// Rendered page from the solver service. Failures are logged and
    /// reported as `None`.
    async fn solve(&self, url: &str) -> Option<String>;
}

/// Step of the retrieval state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Plain request
    Direct,
    /// Scraper attempt, starting at 1
    Scraper {
        /// Attempt number
        attempt: u32,
    },
    /// Last scraper attempt, errors are final
    FinalScrape,
    /// Solver service
    Solver,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Scraper { attempt } => write!(f, "scraper#{attempt}"),
            Self::FinalScrape => f.write_str("final-scrape"),
            Self::Solver => f.write_str("solver"),
        }
    }
}

/// Stages visited by one fetch, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTrace {
    stages: Vec<FetchStage>,
}

impl FetchTrace {
    fn record(&mut self, stage: FetchStage) {
        self.stages.push(stage);
    }

    /// Visited stages
    #[must_use]
    pub fn stages(&self) -> &[FetchStage] {
        &self.stages
    }

    /// Whether the solver was consulted
    #[must_use]
    pub fn used_solver(&self) -> bool {
        self.stages.contains(&FetchStage::Solver)
    }
}

impl fmt::Display for FetchTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

/// A parsed title page together with how it was obtained.
#[derive(Debug, Clone)]
pub struct FetchedTitle {
    /// Extracted record
    pub record: MovieRecord,
    /// Stages visited
    pub trace: FetchTrace,
}

/// Bookkeeping carried between stages.
#[derive(Default)]
struct FetchState {
    direct_status: u16,
    waf_action: Option<String>,
    scraper_ran: bool,
    solver_ran: bool,
    solver_responded: bool,
}

impl FetchState {
    fn unavailable(&self) -> ImdbError {
        ImdbError::MetadataUnavailable {
            status: self.direct_status,
            waf_action: self.waf_action.clone(),
            solver_responded: self.solver_responded,
        }
    }

    /// Where to go after a page parsed without metadata.
    fn after_parse_miss(&self) -> Result<FetchStage, ImdbError> {
        if self.solver_ran {
            Err(self.unavailable())
        } else {
            Ok(FetchStage::Solver)
        }
    }
}

enum Transition {
    Next(FetchStage),
    Page(String),
}

/// Drives a [`PageSource`] through the fetch stages.
#[derive(Clone)]
pub struct PageFetcher {
    source: Arc<dyn PageSource>,
    scraper_attempts: u32,
}

impl PageFetcher {
    /// Fetcher with the default attempt budget.
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            scraper_attempts: IMDB_SCRAPER_ATTEMPTS,
        }
    }

    /// Fetch and parse the page of the numeric title id `id`.
    ///
    /// # Errors
    ///
    /// `FetchFailed` when a final stage fails, `MetadataUnavailable` when
    /// every stage ran without yielding metadata.
    pub async fn fetch(&self, id: &str) -> Result<FetchedTitle, ImdbError> {
        let url = title_url(id);
        let mut trace = FetchTrace::default();
        let mut state = FetchState::default();
        let mut stage = FetchStage::Direct;

        loop {
            trace.record(stage);
            let transition = self.step(stage, &url, &mut state).await?;

            stage = match transition {
                Transition::Next(next) => next,
                Transition::Page(html) => {
                    if let Some(record) = extractor::extract(&html, id) {
                        debug!("IMDb page {url} fetched via {trace}");
                        if trace.used_solver() {
                            info!("Fetched IMDb metadata via solver for {url}");
                        }
                        return Ok(FetchedTitle { record, trace });
                    }
                    warn!(
                        "IMDb metadata missing after {trace} (status={}, waf={:?}) for {url}",
                        state.direct_status, state.waf_action
                    );
                    state.after_parse_miss()?
                }
            };
        }
    }

    async fn step(
        &self,
        stage: FetchStage,
        url: &str,
        state: &mut FetchState,
    ) -> Result<Transition, ImdbError> {
        match stage {
            FetchStage::Direct => {
                let page = self.source.direct(url).await?;
                state.direct_status = page.status;
                state.waf_action.clone_from(&page.waf_action);

                if page.status >= 400 {
                    return Err(ImdbError::FetchFailed(format!(
                        "HTTP {} for {url}",
                        page.status
                    )));
                }
                if page.is_blocked() {
                    warn!(
                        "IMDb returned status={} waf={:?} for {url}; retrying via scraper",
                        page.status, page.waf_action
                    );
                    return Ok(Transition::Next(FetchStage::Scraper { attempt: 1 }));
                }
                Ok(Transition::Page(page.body))
            }
            FetchStage::Scraper { attempt } => {
                state.scraper_ran = true;
                let page = self.source.scrape(url).await?;
                if !page.is_challenge() {
                    return Ok(Transition::Page(page.body));
                }
                debug!("Scraper attempt {attempt} still challenged for {url}");
                if attempt < self.scraper_attempts {
                    Ok(Transition::Next(FetchStage::Scraper {
                        attempt: attempt + 1,
                    }))
                } else {
                    Ok(Transition::Next(FetchStage::FinalScrape))
                }
            }
            FetchStage::FinalScrape => {
                let page = self.source.scrape(url).await?;
                if !page.is_success() {
                    return Err(ImdbError::FetchFailed(format!(
                        "scraper got HTTP {} for {url}",
                        page.status
                    )));
                }
                Ok(Transition::Page(page.body))
            }
            FetchStage::Solver => {
                state.solver_ran = true;
                if let Some(html) = self.source.solve(url).await {
                    state.solver_responded = true;
                    if extractor::has_metadata(&html) {
                        return Ok(Transition::Page(html));
                    }
                }
                if state.scraper_ran {
                    Err(state.unavailable())
                } else {
                    Ok(Transition::Next(FetchStage::Scraper { attempt: 1 }))
                }
            }
        }
    }
}

/// Real [`PageSource`] over HTTP.
///
/// The scraper is a blocking, cookie-keeping client so challenge cookies
/// set by one attempt are presented on the next. It runs on the blocking
/// thread pool.
pub struct HttpPageSource {
    client: reqwest::Client,
    scraper: Arc<reqwest::blocking::Client>,
    solver_url: Option<String>,
}

impl HttpPageSource {
    /// Build the HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built.
    pub async fn new(
        client: reqwest::Client,
        solver_url: Option<String>,
    ) -> Result<Self, ImdbError> {
        // The blocking client owns a runtime and must be built off the async threads
        let scraper = tokio::task::spawn_blocking(|| {
            reqwest::blocking::Client::builder()
                .cookie_store(true)
                .default_headers(browser_headers())
                .timeout(Duration::from_secs(IMDB_SCRAPER_TIMEOUT_SECS))
                .build()
        })
        .await
        .map_err(|e| ImdbError::FetchFailed(e.to_string()))?
        .map_err(|e| ImdbError::FetchFailed(e.to_string()))?;

        Ok(Self {
            client,
            scraper: Arc::new(scraper),
            solver_url: solver_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn direct(&self, url: &str) -> Result<RawPage, ImdbError> {
        let response = self
            .client
            .get(url)
            .headers(browser_headers())
            .timeout(Duration::from_secs(IMDB_HTTP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| ImdbError::FetchFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let waf_action = header_text(response.headers(), WAF_ACTION_HEADER);
        let body = response
            .text()
            .await
            .map_err(|e| ImdbError::FetchFailed(e.to_string()))?;
        Ok(RawPage {
            status,
            waf_action,
            body,
        })
    }

    async fn scrape(&self, url: &str) -> Result<RawPage, ImdbError> {
        let scraper = Arc::clone(&self.scraper);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let response = scraper
                .get(&url)
                .send()
                .map_err(|e| ImdbError::FetchFailed(e.to_string()))?;
            let status = response.status().as_u16();
            let waf_action = header_text(response.headers(), WAF_ACTION_HEADER);
            let body = response
                .text()
                .map_err(|e| ImdbError::FetchFailed(e.to_string()))?;
            Ok(RawPage {
                status,
                waf_action,
                body,
            })
        })
        .await
        .map_err(|e| ImdbError::FetchFailed(e.to_string()))?
    }

    async fn solve(&self, url: &str) -> Option<String> {
        let solver = self.solver_url.as_deref()?;
        let result = self
            .client
            .get(solver)
            .query(&[("url", url)])
            .headers(browser_headers())
            .timeout(Duration::from_secs(IMDB_SOLVER_TIMEOUT_SECS))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let body = match result {
            Ok(response) => response.text().await,
            Err(e) => {
                warn!("Solver HTTP error for {url}: {e}");
                return None;
            }
        };
        match body {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!("Solver returned an empty body for {url}");
                None
            }
            Err(e) => {
                warn!("Solver body read failed for {url}: {e}");
                None
            }
        }
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(IMDB_USER_AGENT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(IMDB_ACCEPT_LANGUAGE));
    headers
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    const GOOD_PAGE: &str = r#"<html><head><title>Heat (1995)</title>
        <script type="application/ld+json">{"name": "Heat"}</script></head></html>"#;
    const BARE_PAGE: &str = "<html><head><title>Heat</title></head><body>shell</body></html>";

    fn page(status: u16, waf: Option<&str>, body: &str) -> RawPage {
        RawPage {
            status,
            waf_action: waf.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_direct_success_skips_fallbacks() -> Result<(), ImdbError> {
        let mut source = MockPageSource::new();
        source
            .expect_direct()
            .times(1)
            .returning(|_| Ok(page(200, None, GOOD_PAGE)));
        source.expect_scrape().never();
        source.expect_solve().never();

        let fetched = PageFetcher::new(Arc::new(source)).fetch("0113277").await?;
        assert_eq!(fetched.record.title, "Heat");
        assert_eq!(fetched.trace.stages(), &[FetchStage::Direct]);
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_is_final() {
        let mut source = MockPageSource::new();
        source
            .expect_direct()
            .returning(|_| Ok(page(503, None, "down")));
        source.expect_scrape().never();
        source.expect_solve().never();

        let result = PageFetcher::new(Arc::new(source)).fetch("1").await;
        assert!(matches!(result, Err(ImdbError::FetchFailed(_))));
    }

    #[tokio::test]
    async fn test_waf_then_scraper_second_attempt() -> Result<(), ImdbError> {
        let mut seq = Sequence::new();
        let mut source = MockPageSource::new();
        source
            .expect_direct()
            .times(1)
            .returning(|_| Ok(page(202, Some("challenge"), "")));
        source
            .expect_scrape()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(202, Some("challenge"), "")));
        source
            .expect_scrape()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(200, None, GOOD_PAGE)));
        source.expect_solve().never();

        let fetched = PageFetcher::new(Arc::new(source)).fetch("1").await?;
        assert_eq!(
            fetched.trace.stages(),
            &[
                FetchStage::Direct,
                FetchStage::Scraper { attempt: 1 },
                FetchStage::Scraper { attempt: 2 },
            ]
        );
        assert!(!fetched.trace.used_solver());
        Ok(())
    }

    #[tokio::test]
    async fn test_final_scrape_error_status() {
        let mut seq = Sequence::new();
        let mut source = MockPageSource::new();
        source
            .expect_direct()
            .returning(|_| Ok(page(202, None, "")));
        source
            .expect_scrape()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(200, Some("challenge"), "<html></html>")));
        source
            .expect_scrape()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(403, None, "forbidden")));
        source.expect_solve().never();

        let result = PageFetcher::new(Arc::new(source)).fetch("1").await;
        assert!(matches!(result, Err(ImdbError::FetchFailed(ref m)) if m.contains("403")));
    }

    #[tokio::test]
    async fn test_solver_rescues_bare_page() -> Result<(), ImdbError> {
        let mut source = MockPageSource::new();
        source
            .expect_direct()
            .returning(|_| Ok(page(200, None, BARE_PAGE)));
        source.expect_scrape().never();
        source
            .expect_solve()
            .times(1)
            .returning(|_| Some(GOOD_PAGE.to_string()));

        let fetched = PageFetcher::new(Arc::new(source)).fetch("1").await?;
        assert_eq!(
            fetched.trace.stages(),
            &[FetchStage::Direct, FetchStage::Solver]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_solver_miss_forces_scraper_once() -> Result<(), ImdbError> {
        let mut source = MockPageSource::new();
        source
            .expect_direct()
            .returning(|_| Ok(page(200, None, BARE_PAGE)));
        source.expect_solve().times(1).returning(|_| None);
        source
            .expect_scrape()
            .times(1)
            .returning(|_| Ok(page(200, None, GOOD_PAGE)));

        let fetched = PageFetcher::new(Arc::new(source)).fetch("1").await?;
        assert_eq!(
            fetched.trace.stages(),
            &[
                FetchStage::Direct,
                FetchStage::Solver,
                FetchStage::Scraper { attempt: 1 },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_stages_report_unavailable() {
        let mut source = MockPageSource::new();
        source
            .expect_direct()
            .returning(|_| Ok(page(202, Some("captcha"), "")));
        source
            .expect_scrape()
            .times(1)
            .returning(|_| Ok(page(200, None, BARE_PAGE)));
        source
            .expect_solve()
            .times(1)
            .returning(|_| Some(BARE_PAGE.to_string()));

        let result = PageFetcher::new(Arc::new(source)).fetch("1").await;
        match result {
            Err(ImdbError::MetadataUnavailable {
                status,
                waf_action,
                solver_responded,
            }) => {
                assert_eq!(status, 202);
                assert_eq!(waf_action.as_deref(), Some("captcha"));
                assert!(solver_responded);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
