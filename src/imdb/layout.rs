//! Per-user caption layout: which result sections are rendered.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A toggleable section of the default IMDb caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayoutField {
    /// Title, year, type and alternate title
    Title,
    /// Runtime
    Duration,
    /// Content rating (PG-13, ...)
    Category,
    /// Aggregate user rating
    Rating,
    /// Release date
    Release,
    /// Genre hashtags
    Genre,
    /// Countries of origin
    Country,
    /// Spoken languages
    Language,
    /// Directors, writers and cast
    CastInfo,
    /// Plot summary
    Plot,
    /// Keyword hashtags
    Keywords,
    /// Awards summary
    Awards,
    /// Streaming availability
    Availability,
    /// Credit line
    ImdbBy,
    /// "Open IMDb" button
    ButtonOpenImdb,
    /// "Trailer" button
    ButtonTrailer,
}

impl LayoutField {
    /// Every field in caption declaration order.
    pub const ALL: [Self; 16] = [
        Self::Title,
        Self::Duration,
        Self::Category,
        Self::Rating,
        Self::Release,
        Self::Genre,
        Self::Country,
        Self::Language,
        Self::CastInfo,
        Self::Plot,
        Self::Keywords,
        Self::Awards,
        Self::Availability,
        Self::ImdbBy,
        Self::ButtonOpenImdb,
        Self::ButtonTrailer,
    ];

    /// Key used in the stored document and in callback data.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Duration => "duration",
            Self::Category => "category",
            Self::Rating => "rating",
            Self::Release => "release",
            Self::Genre => "genre",
            Self::Country => "country",
            Self::Language => "language",
            Self::CastInfo => "cast_info",
            Self::Plot => "plot",
            Self::Keywords => "keywords",
            Self::Awards => "awards",
            Self::Availability => "availability",
            Self::ImdbBy => "imdb_by",
            Self::ButtonOpenImdb => "button_open_imdb",
            Self::ButtonTrailer => "button_trailer",
        }
    }

    /// Resolve a stored key. Unknown keys yield `None`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    /// Label shown on the layout editor keyboard.
    #[must_use]
    pub const fn menu_label(self) -> &'static str {
        match self {
            Self::Title => "Judul",
            Self::Duration => "Durasi",
            Self::Category => "Kategori",
            Self::Rating => "Peringkat",
            Self::Release => "Rilis",
            Self::Genre => "Genre",
            Self::Country => "Negara",
            Self::Language => "Bahasa",
            Self::CastInfo => "Info Cast",
            Self::Plot => "Plot",
            Self::Keywords => "Kata Kunci",
            Self::Awards => "Penghargaan",
            Self::Availability => "Tersedia di",
            Self::ImdbBy => "IMDb By",
            Self::ButtonOpenImdb => "Open IMDb",
            Self::ButtonTrailer => "Trailer",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LayoutField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Display language of IMDb results.
///
/// Older records stored `eng`/`ind`; both spellings are accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
    /// English
    #[default]
    #[serde(rename = "en", alias = "eng")]
    English,
    /// Bahasa Indonesia
    #[serde(rename = "id", alias = "ind")]
    Indonesian,
}

impl Language {
    /// Locale code exposed to templates (`en` / `id`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Indonesian => "id",
        }
    }

    /// Code used in callback data (`eng` / `ind`).
    #[must_use]
    pub const fn callback_code(self) -> &'static str {
        match self {
            Self::English => "eng",
            Self::Indonesian => "ind",
        }
    }

    /// Parse a callback code.
    #[must_use]
    pub fn from_callback_code(code: &str) -> Option<Self> {
        match code {
            "eng" | "en" => Some(Self::English),
            "ind" | "id" => Some(Self::Indonesian),
            _ => None,
        }
    }
}

/// The 16 visibility toggles of the default caption.
///
/// Always holds every known field. Deserializing from a map drops unknown
/// keys and defaults missing ones to visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, bool>", into = "BTreeMap<String, bool>")]
pub struct Layout {
    flags: [bool; 16],
}

impl Default for Layout {
    fn default() -> Self {
        Self { flags: [true; 16] }
    }
}

impl Layout {
    /// Merge a partial key map onto the all-visible default.
    #[must_use]
    pub fn merged<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut layout = Self::default();
        for (key, value) in overrides {
            if let Some(field) = LayoutField::from_key(key) {
                layout.set(field, value);
            }
        }
        layout
    }

    /// Whether `field` is visible.
    #[must_use]
    pub const fn is_enabled(&self, field: LayoutField) -> bool {
        self.flags[field.index()]
    }

    /// Set the visibility of `field`.
    pub fn set(&mut self, field: LayoutField, enabled: bool) {
        self.flags[field.index()] = enabled;
    }

    /// Flip `field` and return its new value.
    pub fn toggle(&mut self, field: LayoutField) -> bool {
        let value = !self.is_enabled(field);
        self.set(field, value);
        value
    }

    /// Iterate over every field with its state, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (LayoutField, bool)> + '_ {
        LayoutField::ALL
            .into_iter()
            .map(|field| (field, self.is_enabled(field)))
    }

    /// Key map in the persisted document shape.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, bool> {
        self.iter()
            .map(|(field, value)| (field.key().to_string(), value))
            .collect()
    }
}

impl From<HashMap<String, bool>> for Layout {
    fn from(map: HashMap<String, bool>) -> Self {
        Self::merged(map.iter().map(|(key, value)| (key.as_str(), *value)))
    }
}

impl From<Layout> for BTreeMap<String, bool> {
    fn from(layout: Layout) -> Self {
        layout.to_map()
    }
}
