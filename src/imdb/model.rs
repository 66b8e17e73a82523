//! Records produced by the lookup pipeline. None of them are persisted.

/// One search suggestion offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieCandidate {
    /// Numeric suffix of the `tt` identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Year or year range, if the suggestion carried one
    pub year: Option<String>,
    /// Title-cased content type (`Movie`, `Tv Series`, ...)
    pub kind: String,
}

impl MovieCandidate {
    /// Year for list rendering, `N/A` when unknown.
    #[must_use]
    pub fn year_display(&self) -> &str {
        self.year.as_deref().unwrap_or("N/A")
    }
}

/// A credited person, optionally linked to a profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Display name
    pub name: String,
    /// Profile url
    pub url: Option<String>,
}

impl Person {
    /// Key used to drop repeated credits within a role.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        self.url.as_deref().unwrap_or(&self.name).to_lowercase()
    }
}

/// Credited people grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credits {
    /// Directors
    pub directors: Vec<Person>,
    /// Writers
    pub writers: Vec<Person>,
    /// Cast, in billing order
    pub cast: Vec<Person>,
}

/// Release date with its IMDb link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Human readable date and region
    pub text: String,
    /// Absolute url of the release info page
    pub url: String,
}

/// Everything extracted from one title page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieRecord {
    /// `tt` identifier
    pub imdb_code: String,
    /// Canonical page url
    pub imdb_url: String,
    /// Primary title, `N/A` when the page has none
    pub title: String,
    /// Year or range taken from the page title, `N/A` when absent
    pub year: String,
    /// Alternate title
    pub aka: Option<String>,
    /// Schema type (`Movie`, `TVSeries`, ...)
    pub kind: Option<String>,
    /// Runtime as shown on the page
    pub runtime: Option<String>,
    /// Content rating (PG-13, ...)
    pub content_rating: Option<String>,
    /// Aggregate rating value
    pub rating_value: Option<String>,
    /// Number of ratings
    pub rating_count: Option<String>,
    /// Release date
    pub release: Option<Release>,
    /// Genres in page order
    pub genres: Vec<String>,
    /// Countries of origin
    pub countries: Vec<String>,
    /// Spoken languages
    pub languages: Vec<String>,
    /// Directors, writers and cast
    pub credits: Credits,
    /// Plot summary
    pub plot: Option<String>,
    /// Keywords
    pub keywords: Vec<String>,
    /// Awards summary
    pub awards: Option<String>,
    /// Trailer url
    pub trailer_url: Option<String>,
    /// Poster url
    pub poster_url: Option<String>,
}

impl MovieRecord {
    /// Title used for availability lookups: the alternate title wins.
    #[must_use]
    pub fn search_title(&self) -> &str {
        self.aka.as_deref().unwrap_or(&self.title)
    }
}
