//! End-to-end IMDb lookup used by the bot handlers.

use crate::config::{Settings, CANDIDATE_CACHE_MAX_SIZE, IMDB_HTTP_TIMEOUT_SECS};
use crate::imdb::candidates::CandidateCache;
use crate::imdb::compose::{compose_caption, CaptionContext, Composed};
use crate::imdb::enrich::{localize, Enricher, WebEnricher};
use crate::imdb::fetcher::{FetchTrace, HttpPageSource, PageFetcher};
use crate::imdb::layout::{Language, Layout};
use crate::imdb::preferences::PreferenceStore;
use crate::imdb::resolver::{MovieResolver, SearchOutcome};
use crate::imdb::{validate_title_id, ImdbError};
use crate::storage::StorageProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A rendered title ready for delivery.
#[derive(Debug, Clone)]
pub struct TitleView {
    /// Caption, buttons and template error if any
    pub composed: Composed,
    /// Poster to attach, if the page had one
    pub poster_url: Option<String>,
    /// How the page was obtained
    pub trace: FetchTrace,
}

/// Search, fetch, extraction and rendering behind one handle.
#[derive(Clone)]
pub struct ImdbService {
    resolver: MovieResolver,
    candidates: CandidateCache,
    fetcher: PageFetcher,
    preferences: PreferenceStore,
    enricher: Arc<dyn Enricher>,
}

impl ImdbService {
    /// Assemble a service from its parts.
    #[must_use]
    pub const fn new(
        resolver: MovieResolver,
        candidates: CandidateCache,
        fetcher: PageFetcher,
        preferences: PreferenceStore,
        enricher: Arc<dyn Enricher>,
    ) -> Self {
        Self {
            resolver,
            candidates,
            fetcher,
            preferences,
            enricher,
        }
    }

    /// Build the production service: shared HTTP client, IMDb page source,
    /// Google Translate and JustWatch.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub async fn from_settings(
        settings: &Settings,
        storage: Arc<dyn StorageProvider>,
        candidate_ttl_secs: u64,
    ) -> Result<Self, ImdbError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(IMDB_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ImdbError::FetchFailed(e.to_string()))?;

        let source = HttpPageSource::new(
            client.clone(),
            settings.solver_url().map(str::to_string),
        )
        .await?;

        Ok(Self::new(
            MovieResolver::new(client.clone()),
            CandidateCache::new(candidate_ttl_secs, CANDIDATE_CACHE_MAX_SIZE),
            PageFetcher::new(Arc::new(source)),
            PreferenceStore::new(storage),
            Arc::new(WebEnricher::new(client)),
        ))
    }

    /// User preferences
    #[must_use]
    pub const fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    /// Queries waiting for a language choice
    #[must_use]
    pub const fn candidates(&self) -> &CandidateCache {
        &self.candidates
    }

    /// Search titles matching `query`.
    ///
    /// # Errors
    ///
    /// See [`MovieResolver::search`].
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, ImdbError> {
        self.resolver.search(query).await
    }

    /// Fetch title `id` and render it for `user_id` in `lang`.
    ///
    /// `bot_handle` is the default credit line. Unreadable preferences fall
    /// back to defaults rather than failing the lookup.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for a malformed id, otherwise see [`PageFetcher::fetch`].
    pub async fn lookup(
        &self,
        user_id: i64,
        id: &str,
        lang: Language,
        bot_handle: &str,
    ) -> Result<TitleView, ImdbError> {
        let id = validate_title_id(id)?;
        let fetched = self.fetcher.fetch(id).await?;
        info!("IMDb tt{id} fetched for user {user_id} via {}", fetched.trace);

        let layout = self.preferences.get_layout(user_id).await.unwrap_or_else(|e| {
            warn!("Layout unavailable for user {user_id}: {e}");
            Layout::default()
        });
        let template = self
            .preferences
            .get_custom_template(user_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Template unavailable for user {user_id}: {e}");
                None
            });
        let credit = self
            .preferences
            .get_credit_override(user_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Credit override unavailable for user {user_id}: {e}");
                None
            })
            .unwrap_or_else(|| bot_handle.to_string());

        let localized = localize(self.enricher.as_ref(), &fetched.record, lang).await;
        let ctx = CaptionContext::build(&fetched.record, &localized, lang, &credit);
        let composed = compose_caption(&ctx, &layout, lang, template.as_deref());

        if let Some(e) = &composed.template_error {
            warn!("Invalid IMDb custom template for user {user_id}: {e}");
        }

        Ok(TitleView {
            composed,
            poster_url: fetched.record.poster_url,
            trace: fetched.trace,
        })
    }
}
