//! Caption rendering for a fetched title.
//!
//! A user either gets the default layout, where every section can be
//! toggled, or their own template with `{placeholder}` fields and
//! `[label](url)` button markup.

#![allow(clippy::non_std_lazy_statics)]

use crate::config::IMDB_CAST_LIMIT;
use crate::imdb::enrich::Localized;
use crate::imdb::layout::{Language, Layout, LayoutField};
use crate::imdb::model::{MovieRecord, Person};
use crate::utils::{button_rows, hashtag, LinkButton};
use html_escape::{encode_single_quoted_attribute, encode_text};
use lazy_regex::lazy_regex;
use std::borrow::Cow;
use std::collections::HashMap;
use thiserror::Error;

/// Text of the "open on IMDb" button.
pub const BUTTON_OPEN_TEXT: &str = "🎬 Open IMDB";
/// Text of the trailer button.
pub const BUTTON_TRAILER_TEXT: &str = "▶️ Trailer";

/// Every placeholder a template may use. Each also exists with an
/// `_html` suffix holding the HTML-escaped value.
pub const PLACEHOLDERS: [&str; 36] = [
    "title",
    "title_with_year",
    "title_link",
    "aka",
    "type",
    "year",
    "duration",
    "duration_raw",
    "category",
    "rating_value",
    "rating_count",
    "rating_text",
    "release",
    "release_url",
    "release_link",
    "genres",
    "genres_list",
    "countries",
    "countries_list",
    "languages",
    "languages_list",
    "directors",
    "writers",
    "cast",
    "plot",
    "keywords",
    "keywords_list",
    "awards",
    "availability",
    "ott",
    "imdb_by",
    "imdb_url",
    "trailer_url",
    "poster_url",
    "imdb_code",
    "locale",
];

/// `[label](url)` inside a rendered template
static RE_TEMPLATE_BUTTON: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"\[([^\[\]]+)\]\(([^)]+)\)");

/// A custom template that cannot be rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// `{` without a matching `}`
    #[error("unclosed '{{' at position {0}")]
    UnclosedBrace(usize),
    /// `}` that does not close a field and is not doubled
    #[error("single '}}' at position {0}")]
    StrayBrace(usize),
    /// Field name that is not a plain identifier
    #[error("invalid placeholder '{{{0}}}'")]
    InvalidName(String),
    /// Unknown `!conversion` or a `:spec` that does not apply to text
    #[error("invalid format in '{{{0}}}'")]
    InvalidFormat(String),
}

/// Final caption text plus its URL buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caption {
    /// HTML caption body
    pub text: String,
    /// Button rows
    pub buttons: Vec<Vec<LinkButton>>,
}

/// Outcome of [`compose_caption`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    /// What to send
    pub caption: Caption,
    /// Set when the user's template failed and the default layout was used
    pub template_error: Option<TemplateError>,
}

/// Section labels of the default layout.
struct Labels {
    title: &'static str,
    aka: &'static str,
    duration: &'static str,
    category: &'static str,
    rating: &'static str,
    release: &'static str,
    genre: &'static str,
    country: &'static str,
    language: &'static str,
    cast_header: &'static str,
    directors: &'static str,
    writers: &'static str,
    cast: &'static str,
    plot: &'static str,
    keywords: &'static str,
    awards: &'static str,
    availability: &'static str,
    imdb_by: &'static str,
}

const EN_LABELS: Labels = Labels {
    title: "📹 Title",
    aka: "📢 AKA",
    duration: "Duration",
    category: "Category",
    rating: "Rating",
    release: "Release",
    genre: "Genre",
    country: "Country",
    language: "Language",
    cast_header: "🙎 Cast Info",
    directors: "Director",
    writers: "Writer",
    cast: "Stars",
    plot: "📜 Summary",
    keywords: "🔥 Keywords",
    awards: "🏆 Awards",
    availability: "Available On",
    imdb_by: "©️ IMDb by",
};

const ID_LABELS: Labels = Labels {
    title: "📹 Judul",
    aka: "📢 AKA",
    duration: "Durasi",
    category: "Kategori",
    rating: "Peringkat",
    release: "Rilis",
    genre: "Genre",
    country: "Negara",
    language: "Bahasa",
    cast_header: "🙎 Info Cast",
    directors: "Sutradara",
    writers: "Penulis",
    cast: "Pemeran",
    plot: "📜 Plot",
    keywords: "🔥 Kata Kunci",
    awards: "🏆 Penghargaan",
    availability: "Tersedia di",
    imdb_by: "©️ IMDb by",
};

const fn labels(lang: Language) -> &'static Labels {
    match lang {
        Language::English => &EN_LABELS,
        Language::Indonesian => &ID_LABELS,
    }
}

/// Shown instead of a caption when every section is switched off.
#[must_use]
pub const fn hidden_notice(lang: Language) -> &'static str {
    match lang {
        Language::English => {
            "⚠️ All IMDb detail sections are currently hidden. Use /imdbset to enable them again."
        }
        Language::Indonesian => {
            "⚠️ Semua bagian detail IMDb kamu sedang disembunyikan. \
             Gunakan /imdbset untuk mengaktifkannya lagi."
        }
    }
}

fn genre_emoji(genre: &str) -> Option<&'static str> {
    let emoji = match genre {
        "Action" => "👊",
        "Adventure" => "🌋",
        "Animation" => "🎠",
        "Biography" => "📃",
        "Comedy" => "🤣",
        "Crime" => "🕵",
        "Documentary" => "🎞",
        "Drama" => "🎭",
        "Family" => "👨‍👩‍👧‍👦",
        "Fantasy" => "🫧",
        "Film-Noir" => "🎯",
        "Game-Show" => "🎮",
        "History" => "🏛",
        "Horror" => "🧟",
        "Music" => "🎸",
        "Musical" => "🎻",
        "Mystery" => "🧳",
        "News" => "📰",
        "Reality-TV" => "🖥",
        "Romance" => "🥰",
        "Sci-Fi" => "🚀",
        "Short" => "📝",
        "Sport" => "⛳",
        "Talk-Show" => "👨‍🍳",
        "Thriller" => "🗡",
        "War" => "⚔",
        "Western" => "🪩",
        _ => return None,
    };
    Some(emoji)
}

fn link(url: &str, text: &str) -> String {
    format!(
        "<a href='{}'>{}</a>",
        encode_single_quoted_attribute(url),
        encode_text(text)
    )
}

fn people(list: &[Person], limit: Option<usize>) -> String {
    list.iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|person| match &person.url {
            Some(url) => link(url, &person.name),
            None => encode_text(&person.name).into_owned(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn hashtags<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(|name| hashtag(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Placeholder values of one result.
#[derive(Debug, Clone, Default)]
pub struct CaptionContext {
    values: HashMap<&'static str, String>,
}

impl CaptionContext {
    /// Collect every placeholder value for `record`.
    ///
    /// `imdb_by` is the credit line: the user's override or the bot handle.
    #[must_use]
    pub fn build(
        record: &MovieRecord,
        localized: &Localized,
        lang: Language,
        imdb_by: &str,
    ) -> Self {
        let mut ctx = Self::default();
        let title_with_year = format!("{} [{}]", record.title, record.year);

        ctx.set("title", &record.title);
        ctx.set("title_link", link(&record.imdb_url, &title_with_year));
        ctx.set("title_with_year", title_with_year);
        ctx.set_opt("aka", record.aka.as_deref());
        ctx.set_opt("type", record.kind.as_deref());
        ctx.set("year", &record.year);
        ctx.set_opt("duration", localized.duration.as_deref());
        ctx.set_opt("duration_raw", record.runtime.as_deref());
        ctx.set_opt("category", record.content_rating.as_deref());
        ctx.set_opt("rating_value", record.rating_value.as_deref());
        ctx.set_opt("rating_count", record.rating_count.as_deref());

        if let (Some(value), Some(count)) = (&record.rating_value, &record.rating_count) {
            let text = match lang {
                Language::English => format!("{value}/10 from {count} users"),
                Language::Indonesian => format!("{value}/10 dari {count} pengguna"),
            };
            ctx.set("rating_text", text);
        }

        if let Some(release) = &record.release {
            ctx.set("release", &release.text);
            ctx.set("release_url", &release.url);
            ctx.set("release_link", link(&release.url, &release.text));
        }

        let genres: Vec<String> = record
            .genres
            .iter()
            .map(|genre| match genre_emoji(genre) {
                Some(emoji) => format!("{emoji} {}", hashtag(genre)),
                None => hashtag(genre),
            })
            .collect();
        ctx.set("genres", genres.join(", "));
        ctx.set("genres_list", record.genres.join(", "));
        ctx.set("countries", hashtags(&record.countries));
        ctx.set("countries_list", record.countries.join(", "));
        ctx.set("languages", hashtags(&record.languages));
        ctx.set("languages_list", record.languages.join(", "));

        ctx.set("directors", people(&record.credits.directors, None));
        ctx.set("writers", people(&record.credits.writers, None));
        ctx.set("cast", people(&record.credits.cast, Some(IMDB_CAST_LIMIT)));

        ctx.set_opt("plot", localized.plot.as_deref());
        ctx.set("keywords", hashtags(&record.keywords));
        ctx.set("keywords_list", record.keywords.join(", "));
        ctx.set_opt("awards", localized.awards.as_deref());
        ctx.set("availability", &localized.availability);
        ctx.set("ott", &localized.availability);
        ctx.set("imdb_by", imdb_by);
        ctx.set("imdb_url", &record.imdb_url);
        ctx.set_opt("trailer_url", record.trailer_url.as_deref());
        ctx.set_opt("poster_url", record.poster_url.as_deref());
        ctx.set("imdb_code", &record.imdb_code);
        ctx.set("locale", lang.code());
        ctx
    }

    fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.values.insert(name, value.into());
    }

    fn set_opt(&mut self, name: &'static str, value: Option<&str>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    /// Value of a placeholder. Unknown names resolve to an empty string;
    /// `{name}_html` resolves to the escaped value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Cow<'_, str> {
        if let Some(value) = self.values.get(name) {
            return Cow::Borrowed(value);
        }
        name.strip_suffix("_html")
            .and_then(|base| self.values.get(base))
            .map_or(Cow::Borrowed(""), |value| {
                Cow::Owned(encode_text(value).into_owned())
            })
    }

    fn has(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_empty())
    }

    fn escaped(&self, name: &str) -> String {
        encode_text(&self.get(name)).into_owned()
    }
}

/// Render the default caption for `layout`.
///
/// A section appears only when it is enabled and has a value.
#[must_use]
pub fn compose_default(ctx: &CaptionContext, layout: &Layout, lang: Language) -> String {
    let labels = labels(lang);
    let mut res = String::new();
    push_headline(&mut res, ctx, layout, labels);
    push_details(&mut res, ctx, layout, labels);

    if res.is_empty() {
        hidden_notice(lang).to_string()
    } else {
        res
    }
}

/// Title through release date.
fn push_headline(res: &mut String, ctx: &CaptionContext, layout: &Layout, labels: &Labels) {
    let on = |field| layout.is_enabled(field);

    if on(LayoutField::Title) {
        let title = if ctx.has("title_link") {
            ctx.get("title_link").into_owned()
        } else {
            ctx.escaped("title_with_year")
        };
        let kind = if ctx.has("type") {
            ctx.escaped("type")
        } else {
            "N/A".to_string()
        };
        res.push_str(&format!("<b>{}:</b> {title} (<code>{kind}</code>)\n", labels.title));
        if ctx.has("aka") {
            res.push_str(&format!(
                "<b>{}:</b> <code>{}</code>\n\n",
                labels.aka,
                ctx.escaped("aka")
            ));
        } else {
            res.push('\n');
        }
    }
    if on(LayoutField::Duration) && ctx.has("duration") {
        res.push_str(&format!(
            "<b>{}:</b> <code>{}</code>\n",
            labels.duration,
            ctx.escaped("duration")
        ));
    }
    if on(LayoutField::Category) && ctx.has("category") {
        res.push_str(&format!(
            "<b>{}:</b> <code>{}</code> \n",
            labels.category,
            ctx.escaped("category")
        ));
    }
    if on(LayoutField::Rating) && (ctx.has("rating_text") || ctx.has("rating_value")) {
        let rating = if ctx.has("rating_text") {
            ctx.get("rating_text").into_owned()
        } else if ctx.has("rating_count") {
            format!(
                "{}/10 ({} votes)",
                ctx.get("rating_value"),
                ctx.get("rating_count")
            )
        } else {
            ctx.get("rating_value").into_owned()
        };
        res.push_str(&format!(
            "<b>{}:</b> <code>{}</code>\n",
            labels.rating,
            encode_text(&rating)
        ));
    }
    if on(LayoutField::Release) && ctx.has("release") {
        let release = if ctx.has("release_link") {
            ctx.get("release_link").into_owned()
        } else {
            ctx.escaped("release")
        };
        res.push_str(&format!("<b>{}:</b> {release}\n", labels.release));
    }
}

/// Lists, people, plot, keywords, awards, availability and credit line.
fn push_details(res: &mut String, ctx: &CaptionContext, layout: &Layout, labels: &Labels) {
    let on = |field| layout.is_enabled(field);

    for (field, label, key) in [
        (LayoutField::Genre, labels.genre, "genres"),
        (LayoutField::Country, labels.country, "countries"),
        (LayoutField::Language, labels.language, "languages"),
    ] {
        if on(field) && ctx.has(key) {
            res.push_str(&format!("<b>{label}:</b> {}\n", ctx.escaped(key)));
        }
    }
    if on(LayoutField::CastInfo)
        && (ctx.has("directors") || ctx.has("writers") || ctx.has("cast"))
    {
        res.push_str(&format!("\n<b>{}:</b>\n", labels.cast_header));
        if ctx.has("directors") {
            res.push_str(&format!("<b>{}:</b> {}\n", labels.directors, ctx.get("directors")));
        }
        if ctx.has("writers") {
            res.push_str(&format!("<b>{}:</b> {}\n", labels.writers, ctx.get("writers")));
        }
        if ctx.has("cast") {
            res.push_str(&format!("<b>{}:</b> {}\n\n", labels.cast, ctx.get("cast")));
        }
    }
    if on(LayoutField::Plot) && ctx.has("plot") {
        res.push_str(&format!(
            "<b>{}:</b>\n<blockquote><code>{}</code></blockquote>\n\n",
            labels.plot,
            ctx.escaped("plot")
        ));
    }
    if on(LayoutField::Keywords) && ctx.has("keywords") {
        res.push_str(&format!(
            "<b>{}:</b>\n<blockquote>{}</blockquote>\n",
            labels.keywords,
            ctx.escaped("keywords")
        ));
    }
    if on(LayoutField::Awards) && ctx.has("awards") {
        res.push_str(&format!(
            "<b>{}:</b>\n<blockquote><code>{}</code></blockquote>\n",
            labels.awards,
            ctx.escaped("awards")
        ));
    }
    if on(LayoutField::Availability) && ctx.has("availability") {
        res.push_str(&format!(
            "{}:\n{}\n",
            labels.availability,
            ctx.get("availability")
        ));
    }
    if on(LayoutField::ImdbBy) && ctx.has("imdb_by") {
        res.push_str(&format!("<b>{}</b> {}", labels.imdb_by, ctx.escaped("imdb_by")));
    }
}

/// Buttons under a default caption: open on IMDb and trailer, one row.
#[must_use]
pub fn action_buttons(ctx: &CaptionContext, layout: &Layout) -> Vec<Vec<LinkButton>> {
    let mut row = Vec::new();
    if layout.is_enabled(LayoutField::ButtonOpenImdb) && ctx.has("imdb_url") {
        row.push(LinkButton::new(BUTTON_OPEN_TEXT, ctx.get("imdb_url")));
    }
    if layout.is_enabled(LayoutField::ButtonTrailer) && ctx.has("trailer_url") {
        row.push(LinkButton::new(BUTTON_TRAILER_TEXT, ctx.get("trailer_url")));
    }
    if row.is_empty() {
        Vec::new()
    } else {
        vec![row]
    }
}

/// Render a user template.
///
/// Button markup is cut out of the body and returned as rows of two. The
/// body may come back empty when the template holds nothing but buttons.
///
/// # Errors
///
/// Returns a [`TemplateError`] for unbalanced braces, a field name that
/// is not an identifier, or a conversion or spec that cannot format text.
pub fn render_template(template: &str, ctx: &CaptionContext) -> Result<Caption, TemplateError> {
    let rendered = substitute(template, ctx)?;
    let mut buttons = Vec::new();
    let body = RE_TEMPLATE_BUTTON.replace_all(rendered.trim(), |caps: &regex::Captures| {
        let label = caps.get(1).map_or("", |m| m.as_str()).trim();
        let url = caps.get(2).map_or("", |m| m.as_str()).trim();
        if !label.is_empty() && !url.is_empty() {
            buttons.push(LinkButton::new(label, url));
        }
        String::new()
    });

    Ok(Caption {
        text: body.trim().to_string(),
        buttons: button_rows(buttons),
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Widest `:spec` padding accepted for one field
const MAX_FIELD_WIDTH: usize = 1024;

/// Split `name!conversion:spec` into its parts.
fn split_field(field: &str) -> (&str, Option<&str>, Option<&str>) {
    let (head, spec) = match field.split_once(':') {
        Some((head, spec)) => (head, Some(spec)),
        None => (field, None),
    };
    match head.split_once('!') {
        Some((name, conversion)) => (name, Some(conversion), spec),
        None => (head, None, spec),
    }
}

/// Quote a value the way `!r` shows it.
fn quoted(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Apply a text format spec: `[[fill]align][width][.precision][s]`.
fn apply_spec(value: &str, spec: &str) -> Option<String> {
    let spec = spec.strip_suffix('s').unwrap_or(spec);
    let is_align = |c: char| matches!(c, '<' | '>' | '^');
    let mut chars = spec.chars();
    let (fill, align, rest) = match (chars.next(), chars.next()) {
        (Some(fill), Some(align)) if is_align(align) => {
            (fill, align, &spec[fill.len_utf8() + 1..])
        }
        (Some(align), _) if is_align(align) => (' ', align, &spec[1..]),
        _ => (' ', '<', spec),
    };

    let digits = |raw: &str| -> Option<usize> {
        if raw.chars().all(|c| c.is_ascii_digit()) {
            raw.parse().ok()
        } else {
            None
        }
    };
    let (width, precision) = match rest.split_once('.') {
        Some((width, precision)) => (width, Some(digits(precision)?)),
        None => (rest, None),
    };
    let width = if width.is_empty() { 0 } else { digits(width)? };
    if width > MAX_FIELD_WIDTH {
        return None;
    }

    let text: String = match precision {
        Some(limit) => value.chars().take(limit).collect(),
        None => value.to_string(),
    };
    let gap = width.saturating_sub(text.chars().count());
    let (left, right) = match align {
        '>' => (gap, 0),
        '^' => (gap / 2, gap - gap / 2),
        _ => (0, gap),
    };
    let fill = fill.to_string();
    Some(format!("{}{text}{}", fill.repeat(left), fill.repeat(right)))
}

/// Look up one `{...}` field and apply its conversion and spec.
fn render_field(field: &str, ctx: &CaptionContext) -> Result<String, TemplateError> {
    let (name, conversion, spec) = split_field(field);
    if !is_identifier(name) {
        return Err(TemplateError::InvalidName(name.to_string()));
    }
    let invalid = || TemplateError::InvalidFormat(field.to_string());

    let value = ctx.get(name);
    let value = match conversion {
        None | Some("s") => value.into_owned(),
        Some("r") => quoted(&value),
        Some(_) => return Err(invalid()),
    };
    match spec {
        None | Some("") => Ok(value),
        Some(spec) => apply_spec(&value, spec).ok_or_else(invalid),
    }
}

fn substitute(template: &str, ctx: &CaptionContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if chars.next_if(|&(_, next)| next == '{').is_some() {
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, '{')) | None => return Err(TemplateError::UnclosedBrace(pos)),
                        Some((_, ch)) => name.push(ch),
                    }
                }
                out.push_str(&render_field(&name, ctx)?);
            }
            '}' => {
                if chars.next_if(|&(_, next)| next == '}').is_none() {
                    return Err(TemplateError::StrayBrace(pos));
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// Produce the caption a user sees.
///
/// A template that renders to an empty body falls back to the title link;
/// a broken template falls back to the default layout and reports the
/// error so the caller can alert the user.
#[must_use]
pub fn compose_caption(
    ctx: &CaptionContext,
    layout: &Layout,
    lang: Language,
    template: Option<&str>,
) -> Composed {
    let mut template_error = None;

    if let Some(template) = template {
        match render_template(template, ctx) {
            Ok(mut caption) => {
                if caption.text.is_empty() {
                    caption.text = if ctx.has("title_link") {
                        ctx.get("title_link").into_owned()
                    } else {
                        "IMDb Result".to_string()
                    };
                }
                return Composed {
                    caption,
                    template_error: None,
                };
            }
            Err(e) => template_error = Some(e),
        }
    }

    Composed {
        caption: Caption {
            text: compose_default(ctx, layout, lang),
            buttons: action_buttons(ctx, layout),
        },
        template_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imdb::model::{Credits, Release};

    fn record() -> MovieRecord {
        MovieRecord {
            imdb_code: "tt0113277".to_string(),
            imdb_url: "https://www.imdb.com/title/tt0113277/".to_string(),
            title: "Heat".to_string(),
            year: "1995".to_string(),
            kind: Some("Movie".to_string()),
            runtime: Some("2h 50m".to_string()),
            content_rating: Some("R".to_string()),
            rating_value: Some("8.3".to_string()),
            rating_count: Some("720000".to_string()),
            release: Some(Release {
                text: "December 15, 1995 (United States)".to_string(),
                url: "https://www.imdb.com/title/tt0113277/releaseinfo".to_string(),
            }),
            genres: vec!["Crime".to_string(), "Sci-Fi".to_string()],
            countries: vec!["United States".to_string()],
            languages: vec!["English".to_string(), "Spanish".to_string()],
            credits: Credits {
                directors: vec![Person {
                    name: "Michael Mann".to_string(),
                    url: Some("https://www.imdb.com/name/nm0000520/".to_string()),
                }],
                writers: Vec::new(),
                cast: vec![Person {
                    name: "Al Pacino".to_string(),
                    url: None,
                }],
            },
            keywords: vec!["heist".to_string(), "los angeles".to_string()],
            trailer_url: Some("https://www.imdb.com/video/vi1".to_string()),
            ..MovieRecord::default()
        }
    }

    fn context(record: &MovieRecord, lang: Language) -> CaptionContext {
        CaptionContext::build(record, &Localized::untranslated(record), lang, "@katybot")
    }

    #[test]
    fn test_context_values() {
        let ctx = context(&record(), Language::English);
        assert_eq!(ctx.get("title_with_year"), "Heat [1995]");
        assert_eq!(
            ctx.get("title_link"),
            "<a href='https://www.imdb.com/title/tt0113277/'>Heat [1995]</a>"
        );
        assert_eq!(ctx.get("genres"), "🕵 #Crime, 🚀 #Sci_Fi");
        assert_eq!(ctx.get("keywords"), "#heist, #los_angeles");
        assert_eq!(ctx.get("rating_text"), "8.3/10 from 720000 users");
        assert_eq!(
            ctx.get("directors"),
            "<a href='https://www.imdb.com/name/nm0000520/'>Michael Mann</a>"
        );
        assert_eq!(ctx.get("locale"), "en");
        assert_eq!(ctx.get("plot"), "");
        assert_eq!(ctx.get("no_such_field"), "");
    }

    #[test]
    fn test_html_variant_escapes() {
        let mut rec = record();
        rec.title = "Tom & Jerry".to_string();
        let ctx = context(&rec, Language::English);
        assert_eq!(ctx.get("title_html"), "Tom &amp; Jerry");
        assert_eq!(ctx.get("title"), "Tom & Jerry");
        assert_eq!(ctx.get("missing_html"), "");
    }

    #[test]
    fn test_cast_is_limited() {
        let mut rec = record();
        rec.credits.cast = (0..15)
            .map(|i| Person {
                name: format!("Actor {i}"),
                url: None,
            })
            .collect();
        let ctx = context(&rec, Language::English);
        assert_eq!(ctx.get("cast").split(", ").count(), IMDB_CAST_LIMIT);
    }

    #[test]
    fn test_default_caption_sections() {
        let ctx = context(&record(), Language::English);
        let text = compose_default(&ctx, &Layout::default(), Language::English);

        assert!(text.starts_with(
            "<b>📹 Title:</b> <a href='https://www.imdb.com/title/tt0113277/'>Heat [1995]</a> (<code>Movie</code>)\n\n"
        ));
        assert!(text.contains("<b>Duration:</b> <code>2h 50m</code>\n"));
        assert!(text.contains("<b>Rating:</b> <code>8.3/10 from 720000 users</code>\n"));
        assert!(text.contains("\n<b>🙎 Cast Info:</b>\n<b>Director:</b> "));
        assert!(!text.contains("Writer"));
        assert!(text.ends_with("<b>©️ IMDb by</b> @katybot"));
    }

    #[test]
    fn test_empty_plot_is_omitted() {
        let ctx = context(&record(), Language::English);
        let text = compose_default(&ctx, &Layout::default(), Language::English);
        assert!(!text.contains("Summary"));

        let mut rec = record();
        rec.plot = Some("A heist goes wrong.".to_string());
        let ctx = context(&rec, Language::English);
        let text = compose_default(&ctx, &Layout::default(), Language::English);
        assert!(text.contains(
            "<b>📜 Summary:</b>\n<blockquote><code>A heist goes wrong.</code></blockquote>"
        ));
    }

    #[test]
    fn test_disabled_sections_and_indonesian_labels() {
        let ctx = context(&record(), Language::Indonesian);
        let layout = Layout::merged([("cast_info", false), ("imdb_by", false)]);
        let text = compose_default(&ctx, &layout, Language::Indonesian);

        assert!(text.contains("<b>📹 Judul:</b>"));
        assert!(text.contains("<code>8.3/10 dari 720000 pengguna</code>"));
        assert!(!text.contains("Info Cast"));
        assert!(!text.contains("IMDb by"));
    }

    #[test]
    fn test_everything_hidden_shows_notice() {
        let ctx = context(&record(), Language::Indonesian);
        let layout = Layout::merged(LayoutField::ALL.iter().map(|f| (f.key(), false)));
        assert_eq!(
            compose_default(&ctx, &layout, Language::Indonesian),
            hidden_notice(Language::Indonesian)
        );
        assert!(action_buttons(&ctx, &layout).is_empty());
    }

    #[test]
    fn test_action_buttons() {
        let ctx = context(&record(), Language::English);
        let rows = action_buttons(&ctx, &Layout::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].label, BUTTON_OPEN_TEXT);
        assert_eq!(rows[0][1].url, "https://www.imdb.com/video/vi1");

        let mut rec = record();
        rec.trailer_url = None;
        let ctx = context(&rec, Language::English);
        assert_eq!(action_buttons(&ctx, &Layout::default())[0].len(), 1);
    }

    #[test]
    fn test_template_rendering() -> Result<(), TemplateError> {
        let ctx = context(&record(), Language::English);
        let caption = render_template(
            "{{{title}}} {year} {nothing}\n[Watch](https://example.com/w) [Info]({imdb_url})",
            &ctx,
        )?;
        assert_eq!(caption.text, "{Heat} 1995");
        assert_eq!(caption.buttons.len(), 1);
        assert_eq!(caption.buttons[0][1].url, "https://www.imdb.com/title/tt0113277/");
        Ok(())
    }

    #[test]
    fn test_conversions_and_specs() -> Result<(), TemplateError> {
        let ctx = context(&record(), Language::English);
        let caption = render_template(
            "{title!r} [{year:>6}] [{year:*^8}] {title:.2}|{title!s:<6}|",
            &ctx,
        )?;
        assert_eq!(caption.text, "'Heat' [  1995] [**1995**] He|Heat  |");
        assert_eq!(quoted("it's"), "\"it's\"");
        assert_eq!(quoted("a\\b"), "'a\\\\b'");

        assert_eq!(
            render_template("{title!x}", &ctx),
            Err(TemplateError::InvalidFormat("title!x".to_string()))
        );
        assert_eq!(
            render_template("{year:.1f}", &ctx),
            Err(TemplateError::InvalidFormat("year:.1f".to_string()))
        );
        assert_eq!(
            render_template("{title:>99999}", &ctx),
            Err(TemplateError::InvalidFormat("title:>99999".to_string()))
        );
        assert_eq!(
            render_template("{title.upper!r}", &ctx),
            Err(TemplateError::InvalidName("title.upper".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_buttons_only_template() -> Result<(), TemplateError> {
        let ctx = context(&record(), Language::English);
        let caption = render_template("[Watch](https://example.com/w)", &ctx)?;
        assert_eq!(caption.text, "");
        assert_eq!(caption.buttons, vec![vec![LinkButton::new("Watch", "https://example.com/w")]]);

        let composed = compose_caption(
            &ctx,
            &Layout::default(),
            Language::English,
            Some("[Watch](https://example.com/w)"),
        );
        assert_eq!(composed.caption.text, ctx.get("title_link"));
        assert!(composed.template_error.is_none());
        Ok(())
    }

    #[test]
    fn test_malformed_templates() {
        let ctx = context(&record(), Language::English);
        assert_eq!(
            render_template("Title {title", &ctx),
            Err(TemplateError::UnclosedBrace(6))
        );
        assert_eq!(render_template("a } b", &ctx), Err(TemplateError::StrayBrace(2)));
        assert_eq!(
            render_template("{title.upper}", &ctx),
            Err(TemplateError::InvalidName("title.upper".to_string()))
        );
        assert!(render_template("{}", &ctx).is_err());
    }

    #[test]
    fn test_broken_template_falls_back_to_default() {
        let ctx = context(&record(), Language::English);
        let composed = compose_caption(&ctx, &Layout::default(), Language::English, Some("{oops"));

        assert_eq!(composed.template_error, Some(TemplateError::UnclosedBrace(0)));
        assert!(composed.caption.text.starts_with("<b>📹 Title:</b>"));
        assert_eq!(composed.caption.buttons.len(), 1);
    }
}
