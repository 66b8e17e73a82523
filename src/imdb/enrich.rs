//! Localisation and streaming availability for a fetched title.
//!
//! Both lookups are best effort: a failure is logged and the caption is
//! rendered with the untranslated text or without availability.

use crate::config::IMDB_HTTP_TIMEOUT_SECS;
use crate::imdb::layout::Language;
use crate::imdb::model::MovieRecord;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

const TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
const JUSTWATCH_ENDPOINT: &str = "https://apis.justwatch.com/graphql";

const JUSTWATCH_QUERY: &str = "query GetSearchTitles($filter: TitleFilter!, $country: Country!, \
$language: Language!, $first: Int!) { popularTitles(country: $country, filter: $filter, \
first: $first) { edges { node { content(country: $country, language: $language) { title } \
offers(country: $country, platform: WEB) { monetizationType standardWebURL \
package { clearName } } } } } }";

/// External lookups used to decorate a caption.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Translate `text` into `target` (ISO code). `None` on failure.
    async fn translate(&self, text: &str, target: &str) -> Option<String>;
    /// Streaming offers for `title` in `country`, formatted as HTML links.
    /// `None` on failure or when nothing is offered.
    async fn availability(&self, title: &str, country: &str) -> Option<String>;
}

/// Caption text that depends on the result language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Localized {
    /// Runtime, translated for Indonesian
    pub duration: Option<String>,
    /// Plot, translated for Indonesian
    pub plot: Option<String>,
    /// Awards, translated for Indonesian
    pub awards: Option<String>,
    /// Streaming availability markup, empty when unknown
    pub availability: String,
}

impl Localized {
    /// Page text as-is, without availability.
    #[must_use]
    pub fn untranslated(record: &MovieRecord) -> Self {
        Self {
            duration: record.runtime.clone(),
            plot: record.plot.clone(),
            awards: record.awards.clone(),
            availability: String::new(),
        }
    }
}

/// Country used for availability lookups of a result language.
#[must_use]
pub const fn availability_country(lang: Language) -> &'static str {
    match lang {
        Language::English => "US",
        Language::Indonesian => "ID",
    }
}

/// Localise `record` for `lang`.
pub async fn localize(enricher: &dyn Enricher, record: &MovieRecord, lang: Language) -> Localized {
    let mut localized = Localized::untranslated(record);

    if lang == Language::Indonesian {
        for slot in [
            &mut localized.duration,
            &mut localized.plot,
            &mut localized.awards,
        ] {
            if let Some(text) = slot.as_mut() {
                if let Some(translated) = enricher.translate(text, lang.code()).await {
                    *text = translated;
                }
            }
        }
    }

    localized.availability = enricher
        .availability(record.search_title(), availability_country(lang))
        .await
        .unwrap_or_default();
    localized
}

/// [`Enricher`] backed by Google Translate and JustWatch.
#[derive(Clone)]
pub struct WebEnricher {
    client: reqwest::Client,
}

impl WebEnricher {
    /// Wrap a shared HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn request_translation(&self, text: &str, target: &str) -> Result<String, String> {
        let body: Value = self
            .client
            .get(TRANSLATE_ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .timeout(Duration::from_secs(IMDB_HTTP_TIMEOUT_SECS))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        parse_translation(&body).ok_or_else(|| "unexpected translate payload".to_string())
    }

    async fn request_offers(&self, title: &str, country: &str) -> Result<Value, String> {
        let language = if country == "ID" { "id" } else { "en" };
        let payload = json!({
            "operationName": "GetSearchTitles",
            "query": JUSTWATCH_QUERY,
            "variables": {
                "filter": {"searchQuery": title},
                "country": country,
                "language": language,
                "first": 1
            }
        });

        self.client
            .post(JUSTWATCH_ENDPOINT)
            .json(&payload)
            .timeout(Duration::from_secs(IMDB_HTTP_TIMEOUT_SECS))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Enricher for WebEnricher {
    async fn translate(&self, text: &str, target: &str) -> Option<String> {
        match self.request_translation(text, target).await {
            Ok(translated) => Some(translated),
            Err(e) => {
                warn!("Translation to {target} failed: {e}");
                None
            }
        }
    }

    async fn availability(&self, title: &str, country: &str) -> Option<String> {
        match self.request_offers(title, country).await {
            Ok(body) => format_offers(&body),
            Err(e) => {
                warn!("JustWatch lookup for '{title}' ({country}) failed: {e}");
                None
            }
        }
    }
}

/// Join the translated segments of a `translate_a/single` response.
fn parse_translation(body: &Value) -> Option<String> {
    let text: String = body
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Subscription and free offers of the first hit, one link per provider.
fn format_offers(body: &Value) -> Option<String> {
    let offers = body
        .pointer("/data/popularTitles/edges/0/node/offers")?
        .as_array()?;

    let mut seen = HashSet::new();
    let links: Vec<String> = offers
        .iter()
        .filter(|offer| {
            matches!(
                offer.get("monetizationType").and_then(Value::as_str),
                Some("FLATRATE" | "FREE" | "ADS")
            )
        })
        .filter_map(|offer| {
            let name = offer.pointer("/package/clearName")?.as_str()?;
            let url = offer.get("standardWebURL")?.as_str()?;
            seen.insert(name.to_string()).then(|| {
                format!(
                    "<a href='{}'>{}</a>",
                    html_escape::encode_single_quoted_attribute(url),
                    html_escape::encode_text(name)
                )
            })
        })
        .collect();

    (!links.is_empty()).then(|| links.join(" | "))
}
