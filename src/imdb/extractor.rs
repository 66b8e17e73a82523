//! Turns a title page into a [`MovieRecord`].
//!
//! The `application/ld+json` block is the primary source; without it a page
//! counts as having no metadata. People come from the Next.js page state
//! when present, falling back per role to the ld+json credits. Auxiliary
//! fields are read from known `data-testid` list items and are simply left
//! empty when the markup is missing.
//!
//! `scraper::Html` is not `Send`, so everything here is synchronous and the
//! document never outlives a call.

#![allow(clippy::non_std_lazy_statics)]

use crate::imdb::model::{Credits, MovieRecord, Person, Release};
use crate::imdb::title_url;
use lazy_regex::lazy_regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

static RE_PAGE_YEAR: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\d{4}\W\d{4}|\d{4}-?");

const LINK_ITEM: &str = ".ipc-metadata-list-item__list-content-item--link";

/// Extract a record from `html` for the numeric title id `id`.
///
/// Returns `None` when the page carries no structured metadata.
#[must_use]
pub fn extract(html: &str, id: &str) -> Option<MovieRecord> {
    let doc = Html::parse_document(html);
    let metadata = structured_data(&doc)?;

    let release = section(&doc, "title-details-releasedate").and_then(|li| {
        let link = select_first(li, LINK_ITEM)?;
        let text = element_text(link)?;
        let href = link.value().attr("href").unwrap_or_default();
        Some(Release {
            text,
            url: format!("https://www.imdb.com{href}"),
        })
    });

    Some(MovieRecord {
        imdb_code: format!("tt{id}"),
        imdb_url: title_url(id),
        title: json_text(&metadata, "name").unwrap_or_else(|| "N/A".to_string()),
        year: page_year(&doc),
        aka: json_text(&metadata, "alternateName"),
        kind: json_text(&metadata, "@type"),
        runtime: section(&doc, "title-techspec_runtime")
            .and_then(|li| select_first(li, ".ipc-metadata-list-item__content-container"))
            .and_then(element_text),
        content_rating: json_text(&metadata, "contentRating"),
        rating_value: metadata
            .get("aggregateRating")
            .and_then(|r| json_text(r, "ratingValue")),
        rating_count: metadata
            .get("aggregateRating")
            .and_then(|r| json_text(r, "ratingCount")),
        release,
        genres: json_list(metadata.get("genre")),
        countries: section_links(&doc, "title-details-origin"),
        languages: section_links(&doc, "title-details-languages"),
        credits: extract_people(&doc, &metadata),
        plot: json_text(&metadata, "description"),
        keywords: json_text(&metadata, "keywords")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        awards: section(&doc, "award_information")
            .and_then(|li| select_first(li, ".ipc-metadata-list-item__list-content-item"))
            .and_then(element_text),
        trailer_url: metadata.get("trailer").and_then(|t| json_text(t, "url")),
        poster_url: json_text(&metadata, "image"),
    })
}

/// Whether `html` carries a usable structured-data block.
#[must_use]
pub fn has_metadata(html: &str) -> bool {
    structured_data(&Html::parse_document(html)).is_some()
}

fn structured_data(doc: &Html) -> Option<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    let raw: String = doc.select(&selector).next()?.text().collect();
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            warn!("IMDb ld+json block is not an object");
            None
        }
        Err(e) => {
            warn!("Failed to decode IMDb ld+json block: {e}");
            None
        }
    }
}

fn page_year(doc: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|sel| doc.select(&sel).next().map(|t| t.text().collect::<String>()))
        .and_then(|title| RE_PAGE_YEAR.find(&title).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| "N/A".to_string())
}

fn section<'a>(doc: &'a Html, testid: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(&format!(r#"li[data-testid="{testid}"]"#)).ok()?;
    doc.select(&selector).next()
}

fn select_first<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    element.select(&selector).next()
}

fn section_links(doc: &Html, testid: &str) -> Vec<String> {
    let Some(li) = section(doc, testid) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse(LINK_ITEM) else {
        return Vec::new();
    };
    li.select(&selector).filter_map(element_text).collect()
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// String or number field, entity-decoded and trimmed. Empty counts as absent.
fn json_text(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => html_escape::decode_html_entities(s).trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// A field that may hold one string or an array of strings.
fn json_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![html_escape::decode_html_entities(s).into_owned()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| html_escape::decode_html_entities(s).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// One role's people with first-wins deduplication.
#[derive(Default)]
struct RoleList {
    people: Vec<Person>,
    seen: HashSet<String>,
}

impl RoleList {
    fn add(&mut self, name: Option<&str>, url: Option<String>) {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return;
        };
        let person = Person {
            name: html_escape::decode_html_entities(name).into_owned(),
            url,
        };
        if self.seen.insert(person.dedup_key()) {
            self.people.push(person);
        }
    }

    fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

fn extract_people(doc: &Html, metadata: &Value) -> Credits {
    let mut directors = RoleList::default();
    let mut writers = RoleList::default();
    let mut cast = RoleList::default();

    if let Some(main_column) = next_data(doc)
        .as_ref()
        .and_then(|data| data.pointer("/props/pageProps/mainColumnData"))
    {
        for group in json_array(main_column.get("crewV2")) {
            let grouping = group
                .pointer("/grouping/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            let target = if grouping.contains("director") {
                &mut directors
            } else if grouping.contains("writer") {
                &mut writers
            } else {
                continue;
            };
            for credit in json_array(group.get("credits")) {
                let (name, url) = credit_person(credit);
                target.add(name, url);
            }
        }

        // Later cast groups repeat the first one
        for group in json_array(main_column.get("castV2")) {
            for credit in json_array(group.get("credits")) {
                let (name, url) = credit_person(credit);
                cast.add(name, url);
            }
            if !cast.is_empty() {
                break;
            }
        }
    }

    if directors.is_empty() {
        for item in one_or_many(metadata.get("director")) {
            directors.add(item.get("name").and_then(Value::as_str), json_text(item, "url"));
        }
    }
    if writers.is_empty() {
        for item in one_or_many(metadata.get("creator")) {
            if item.get("@type").and_then(Value::as_str) != Some("Person") {
                continue;
            }
            writers.add(item.get("name").and_then(Value::as_str), json_text(item, "url"));
        }
    }
    if cast.is_empty() {
        for item in one_or_many(metadata.get("actor")) {
            cast.add(item.get("name").and_then(Value::as_str), json_text(item, "url"));
        }
    }

    Credits {
        directors: directors.people,
        writers: writers.people,
        cast: cast.people,
    }
}

fn next_data(doc: &Html) -> Option<Value> {
    let selector = Selector::parse("script#__NEXT_DATA__").ok()?;
    let raw: String = doc.select(&selector).next()?.text().collect();
    serde_json::from_str(&raw)
        .map_err(|e| warn!("Failed to decode IMDb page state: {e}"))
        .ok()
}

fn credit_person(credit: &Value) -> (Option<&str>, Option<String>) {
    let name = credit.pointer("/name/nameText/text").and_then(Value::as_str);
    let url = credit
        .pointer("/name/id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(|id| format!("https://www.imdb.com/name/{id}/"));
    (name, url)
}

fn json_array(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn one_or_many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ld_json: &Value, next_data: Option<&Value>, body: &str) -> String {
        let next = next_data.map_or_else(String::new, |data| {
            format!(r#"<script id="__NEXT_DATA__" type="application/json">{data}</script>"#)
        });
        format!(
            "<html><head><title>The Matrix (1999) - IMDb</title>\
             <script type=\"application/ld+json\">{ld_json}</script>{next}</head>\
             <body>{body}</body></html>"
        )
    }

    const DETAILS: &str = r##"
        <ul>
          <li data-testid="title-techspec_runtime">
            <span>Runtime</span>
            <div class="ipc-metadata-list-item__content-container"> 2h 16m </div>
          </li>
          <li data-testid="title-details-releasedate">
            <a class="ipc-metadata-list-item__list-content-item ipc-metadata-list-item__list-content-item--link"
               href="/title/tt0133093/releaseinfo">March 31, 1999 (United States)</a>
          </li>
          <li data-testid="title-details-origin">
            <a class="ipc-metadata-list-item__list-content-item ipc-metadata-list-item__list-content-item--link" href="#">United States</a>
            <a class="ipc-metadata-list-item__list-content-item ipc-metadata-list-item__list-content-item--link" href="#">Australia</a>
          </li>
          <li data-testid="title-details-languages">
            <a class="ipc-metadata-list-item__list-content-item ipc-metadata-list-item__list-content-item--link" href="#">English</a>
          </li>
          <li data-testid="award_information">
            <span class="ipc-metadata-list-item__list-content-item">Won 4 Oscars</span>
          </li>
        </ul>"##;

    #[test]
    fn test_page_without_ld_json_has_no_metadata() {
        let html = "<html><head><title>x</title></head><body></body></html>";
        assert!(extract(html, "1").is_none());
        assert!(!has_metadata(html));
        assert!(!has_metadata(r#"<script type="application/ld+json">{not json</script>"#));
    }

    #[test]
    fn test_full_record() {
        let ld = json!({
            "@type": "Movie",
            "name": "The Matrix",
            "alternateName": "Matrix",
            "image": "https://m.media-amazon.com/images/M/poster.jpg",
            "contentRating": "R",
            "aggregateRating": {"ratingValue": 8.7, "ratingCount": 2_000_000},
            "genre": ["Action", "Sci-Fi"],
            "description": "Neo &amp; friends",
            "keywords": "hacker, ,virtual reality",
            "trailer": {"url": "https://www.imdb.com/video/vi1032782617/"}
        });
        let Some(record) = extract(&page(&ld, None, DETAILS), "0133093") else {
            panic!("metadata expected");
        };

        assert_eq!(record.imdb_code, "tt0133093");
        assert_eq!(record.imdb_url, "https://www.imdb.com/title/tt0133093/");
        assert_eq!(record.title, "The Matrix");
        assert_eq!(record.year, "1999");
        assert_eq!(record.kind.as_deref(), Some("Movie"));
        assert_eq!(record.runtime.as_deref(), Some("2h 16m"));
        assert_eq!(record.rating_value.as_deref(), Some("8.7"));
        assert_eq!(record.rating_count.as_deref(), Some("2000000"));
        assert_eq!(record.genres, vec!["Action", "Sci-Fi"]);
        assert_eq!(record.countries, vec!["United States", "Australia"]);
        assert_eq!(record.languages, vec!["English"]);
        assert_eq!(record.plot.as_deref(), Some("Neo & friends"));
        assert_eq!(record.keywords, vec!["hacker", "virtual reality"]);
        assert_eq!(record.awards.as_deref(), Some("Won 4 Oscars"));
        let Some(release) = record.release else {
            panic!("release expected");
        };
        assert_eq!(
            release.url,
            "https://www.imdb.com/title/tt0133093/releaseinfo"
        );
        assert_eq!(release.text, "March 31, 1999 (United States)");
    }

    #[test]
    fn test_missing_markup_is_omitted() {
        let ld = json!({"name": "Bare", "genre": "Drama"});
        let Some(record) = extract(&page(&ld, None, ""), "42") else {
            panic!("metadata expected");
        };
        assert_eq!(record.genres, vec!["Drama"]);
        assert!(record.runtime.is_none());
        assert!(record.release.is_none());
        assert!(record.countries.is_empty());
        assert!(record.awards.is_none());
        assert!(record.plot.is_none());
    }

    #[test]
    fn test_year_range_from_title() {
        let html = "<html><head><title>Breaking Bad (TV Series 2008\u{2013}2013) - IMDb</title>\
             <script type=\"application/ld+json\">{\"name\":\"Breaking Bad\"}</script></head></html>";
        let Some(record) = extract(html, "0903747") else {
            panic!("metadata expected");
        };
        assert_eq!(record.year, "2008\u{2013}2013");
    }

    #[test]
    fn test_directors_deduplicated_case_insensitive() {
        let ld = json!({
            "name": "Dup",
            "director": [
                {"@type": "Person", "name": "Jane Doe"},
                {"@type": "Person", "name": "JANE DOE"}
            ]
        });
        let Some(record) = extract(&page(&ld, None, ""), "1") else {
            panic!("metadata expected");
        };
        assert_eq!(record.credits.directors.len(), 1);
        assert_eq!(record.credits.directors[0].name, "Jane Doe");
    }

    #[test]
    fn test_page_state_people_win_per_role() {
        let ld = json!({
            "name": "Mixed",
            "director": {"@type": "Person", "name": "Ld Director"},
            "creator": [
                {"@type": "Organization", "name": "Studio"},
                {"@type": "Person", "name": "Ld Writer", "url": "https://www.imdb.com/name/nm2/"}
            ],
            "actor": [{"@type": "Person", "name": "Ld Actor"}]
        });
        let next = json!({"props": {"pageProps": {"mainColumnData": {
            "crewV2": [
                {"grouping": {"text": "Directors"}, "credits": [
                    {"name": {"id": "nm1", "nameText": {"text": "Lana"}}},
                    {"name": {"id": "nm1", "nameText": {"text": "Lana W."}}}
                ]},
                {"grouping": {"text": "Producers"}, "credits": [
                    {"name": {"id": "nm9", "nameText": {"text": "Joel"}}}
                ]}
            ],
            "castV2": [
                {"grouping": {"text": "Stars"}, "credits": [
                    {"name": {"id": "nm3", "nameText": {"text": "Keanu"}}}
                ]},
                {"grouping": {"text": "Cast"}, "credits": [
                    {"name": {"id": "nm4", "nameText": {"text": "Carrie-Anne"}}}
                ]}
            ]
        }}}});
        let Some(record) = extract(&page(&ld, Some(&next), ""), "1") else {
            panic!("metadata expected");
        };
        let credits = record.credits;

        assert_eq!(credits.directors.len(), 1);
        assert_eq!(credits.directors[0].name, "Lana");
        assert_eq!(
            credits.directors[0].url.as_deref(),
            Some("https://www.imdb.com/name/nm1/")
        );
        // No writer group in page state: ld+json persons only
        assert_eq!(credits.writers.len(), 1);
        assert_eq!(credits.writers[0].name, "Ld Writer");
        // First non-empty cast group only
        assert_eq!(credits.cast.len(), 1);
        assert_eq!(credits.cast[0].name, "Keanu");
    }
}
