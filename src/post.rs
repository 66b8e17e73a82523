//! Republishing a replied-to message to a channel with URL buttons.
//!
//! `[label](https://...)` markup in the text becomes inline buttons, two per
//! row. Lines that carried markup are dropped from the posted text.

#![allow(clippy::non_std_lazy_statics)]

use crate::utils::{button_rows, LinkButton};
use lazy_regex::lazy_regex;
use teloxide::types::{ChatId, FileId, Message, Recipient};
use thiserror::Error;

/// `[label](http(s)://...)` button markup
static RE_POST_BUTTON: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"\[([^\]]+)\]\((https?://[^\)]+)\)");

/// Reasons a `/post` request is refused before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    /// No target given
    #[error("⚠️ Kamu harus menyertakan target channel.\nContoh: <code>/post @namachannel</code> atau <code>/post -10012345</code>")]
    MissingTarget,
    /// Target is neither `@name` nor a numeric id
    #[error("⚠️ Format channel tidak valid. Gunakan <code>@username</code> atau <code>-100...</code>")]
    InvalidTarget,
    /// Nothing to post but buttons
    #[error("⚠️ Tidak ada teks atau media dalam pesan yang di-reply.\nTelegram tidak mengizinkan pesan yang hanya berisi tombol tanpa teks atau media.")]
    Empty,
}

/// Channel addressed by `/post`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTarget {
    /// `@channel`
    Username(String),
    /// `-100...`
    Id(i64),
}

impl ChannelTarget {
    /// Parse the first command argument.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTarget` for anything but `@name` or a negative id.
    pub fn parse(raw: &str) -> Result<Self, PostError> {
        if raw.len() > 1 && raw.starts_with('@') {
            return Ok(Self::Username(raw.to_string()));
        }
        if raw.starts_with('-') {
            return raw
                .parse::<i64>()
                .map(Self::Id)
                .map_err(|_| PostError::InvalidTarget);
        }
        Err(PostError::InvalidTarget)
    }

    /// Bot API recipient of the target
    #[must_use]
    pub fn recipient(&self) -> Recipient {
        match self {
            Self::Username(name) => Recipient::ChannelUsername(name.clone()),
            Self::Id(id) => Recipient::Id(ChatId(*id)),
        }
    }
}

/// Parsed `/post` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCommand {
    /// Destination channel
    pub target: ChannelTarget,
    /// Text after the target, appended to the replied text
    pub extra: String,
}

/// Parse `<target> [extra text]`. Line breaks in the extra text are kept.
///
/// # Errors
///
/// Returns `MissingTarget` or `InvalidTarget`.
pub fn parse_command(args: &str) -> Result<PostCommand, PostError> {
    let args = args.trim_start();
    let (target, extra) = args
        .split_once(char::is_whitespace)
        .unwrap_or((args, ""));
    if target.is_empty() {
        return Err(PostError::MissingTarget);
    }
    Ok(PostCommand {
        target: ChannelTarget::parse(target)?,
        extra: extra.trim().to_string(),
    })
}

/// Split button markup out of `text`.
///
/// Returns the remaining text, without the lines that carried markup, and
/// the buttons two per row in match order.
///
/// # Examples
///
/// ```
/// use katy_bot::post::parse_buttons_layout;
/// let (text, rows) = parse_buttons_layout("Hello world\n[A](https://a.example) [B](https://b.example)");
/// assert_eq!(text, "Hello world");
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].len(), 2);
/// ```
#[must_use]
pub fn parse_buttons_layout(text: &str) -> (String, Vec<Vec<LinkButton>>) {
    let mut buttons = Vec::new();
    let mut kept = Vec::new();

    for line in text.lines() {
        let before = buttons.len();
        buttons.extend(RE_POST_BUTTON.captures_iter(line).filter_map(|caps| {
            Some(LinkButton::new(caps.get(1)?.as_str(), caps.get(2)?.as_str()))
        }));
        if buttons.len() == before && !line.is_empty() {
            kept.push(line);
        }
    }

    (kept.join("\n").trim().to_string(), button_rows(buttons))
}

/// Text of the post: replied text or caption, then the extra command text.
#[must_use]
pub fn compose_text(replied: &str, extra: &str) -> String {
    format!("{replied}\n{extra}")
}

/// Kind of media carried by the replied message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Photo, largest size
    Photo,
    /// Video
    Video,
    /// Document
    Document,
    /// Audio
    Audio,
}

/// Media to republish by file id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMedia {
    /// What to send
    pub kind: MediaKind,
    /// Telegram file id
    pub file_id: FileId,
}

/// Pick the media of a replied message, photo first.
#[must_use]
pub fn select_media(message: &Message) -> Option<PostMedia> {
    let (kind, file_id) = if let Some(photo) = message.photo().and_then(<[_]>::last) {
        (MediaKind::Photo, photo.file.id.clone())
    } else if let Some(video) = message.video() {
        (MediaKind::Video, video.file.id.clone())
    } else if let Some(document) = message.document() {
        (MediaKind::Document, document.file.id.clone())
    } else if let Some(audio) = message.audio() {
        (MediaKind::Audio, audio.file.id.clone())
    } else {
        return None;
    };
    Some(PostMedia { kind, file_id })
}

/// Refuse posts that would consist of buttons alone.
///
/// # Errors
///
/// Returns `PostError::Empty` when there is neither text nor media.
pub fn ensure_postable(text: &str, media: Option<&PostMedia>) -> Result<(), PostError> {
    if text.trim().is_empty() && media.is_none() {
        Err(PostError::Empty)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_world_with_button_row() {
        let (text, rows) = parse_buttons_layout(
            "Hello world\n[Site](https://example.com) [Docs](http://docs.example.com/a?b=1)",
        );
        assert_eq!(text, "Hello world");
        assert_eq!(
            rows,
            vec![vec![
                LinkButton::new("Site", "https://example.com"),
                LinkButton::new("Docs", "http://docs.example.com/a?b=1"),
            ]]
        );
    }

    #[test]
    fn test_buttons_across_lines_fill_rows_of_two() {
        let (text, rows) = parse_buttons_layout(
            "<b>Title</b>\n\n[A](https://a.io)\nbody\n[B](https://b.io) [C](https://c.io)",
        );
        assert_eq!(text, "<b>Title</b>\nbody");
        let labels: Vec<Vec<&str>> = rows
            .iter()
            .map(|row| row.iter().map(|b| b.label.as_str()).collect())
            .collect();
        assert_eq!(labels, vec![vec!["A", "B"], vec!["C"]]);
    }

    #[test]
    fn test_non_http_markup_is_text() {
        let (text, rows) = parse_buttons_layout("see [here](tg://user?id=1)");
        assert_eq!(text, "see [here](tg://user?id=1)");
        assert!(rows.is_empty());
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("@mychannel extra words\n[Go](https://go.dev)"),
            Ok(PostCommand {
                target: ChannelTarget::Username("@mychannel".to_string()),
                extra: "extra words\n[Go](https://go.dev)".to_string(),
            })
        );
        assert_eq!(
            parse_command("-1001234567890").map(|c| c.target),
            Ok(ChannelTarget::Id(-1_001_234_567_890))
        );
        assert_eq!(parse_command("   "), Err(PostError::MissingTarget));
        assert_eq!(parse_command("mychannel"), Err(PostError::InvalidTarget));
        assert_eq!(parse_command("-abc"), Err(PostError::InvalidTarget));
        assert_eq!(parse_command("@"), Err(PostError::InvalidTarget));
    }

    #[test]
    fn test_recipient() {
        assert_eq!(
            ChannelTarget::Id(-100).recipient(),
            Recipient::Id(ChatId(-100))
        );
        assert_eq!(
            ChannelTarget::Username("@c".to_string()).recipient(),
            Recipient::ChannelUsername("@c".to_string())
        );
    }

    #[test]
    fn test_buttons_only_refused_without_media() {
        let (text, rows) = parse_buttons_layout(&compose_text("", "[A](https://a.io)"));
        assert_eq!(rows.len(), 1);
        assert_eq!(ensure_postable(&text, None), Err(PostError::Empty));

        let media = PostMedia {
            kind: MediaKind::Photo,
            file_id: FileId("AgACAgIAAx0".to_string()),
        };
        assert_eq!(ensure_postable(&text, Some(&media)), Ok(()));
    }
}
