//! Resilient messaging utilities for Telegram API operations.
//!
//! Plain sends and caption edits retry on transient network failures using
//! exponential backoff with jitter. IMDb results are delivered by replacing
//! the search message's photo, with fallbacks for posters Telegram refuses.
//!
//! # Usage
//!
//! ```ignore
//! use katy_bot::bot::resilient::{send_message_resilient, edit_caption_safe_resilient};
//!
//! // Send with automatic retry
//! send_message_resilient(&bot, chat_id, "Hello!", Some(ParseMode::Html)).await?;
//!
//! // Edit a menu with graceful degradation
//! let success = edit_caption_safe_resilient(&bot, chat_id, msg.id, "Updated!", None).await;
//! ```

use crate::bot::views::imdb::DELIVERY_FAILED;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto, Message, MessageId,
    ParseMode, ReplyParameters,
};
use tracing::{debug, error, warn};

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_NOT_FOUND: &str = "message to edit not found";

/// Send a message with automatic retry on network failures.
///
/// Uses [`crate::utils::retry_telegram_operation`] with exponential backoff
/// to handle transient network errors.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit the caption (and keyboard) of a photo message with automatic retry.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn edit_caption_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    caption: impl Into<String>,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let caption = caption.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot
            .edit_message_caption(chat_id, msg_id)
            .caption(caption.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await
}

/// Edit a caption, treating "not modified" and "not found" as harmless.
///
/// # Returns
///
/// - `true` if the caption was edited
/// - `false` if the edit was skipped or failed after retries
pub async fn edit_caption_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    caption: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> bool {
    match edit_caption_resilient(bot, chat_id, msg_id, caption, markup).await {
        Ok(_) => true,
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Caption update skipped: {err_msg}");
            } else {
                warn!("Failed to edit caption after retries: {e}");
            }
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result delivery
// ─────────────────────────────────────────────────────────────────────────────

/// What to do after Telegram refused a result photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Same content already shown
    NotModified,
    /// Poster rejected; a smaller rendition may pass
    RetryResized,
    /// Media unusable or caption too long; reply with text instead
    PlainReply,
    /// Anything else
    Other,
}

/// Classify a Telegram error message from a photo edit.
///
/// # Examples
///
/// ```
/// use katy_bot::bot::resilient::{classify_delivery_error, DeliveryFailure};
/// assert_eq!(
///     classify_delivery_error("Bad Request: PHOTO_INVALID_DIMENSIONS"),
///     DeliveryFailure::RetryResized
/// );
/// ```
#[must_use]
pub fn classify_delivery_error(message: &str) -> DeliveryFailure {
    let message = message.to_lowercase();
    let has = |needle: &str| message.contains(needle);

    if has(ERROR_NOT_MODIFIED) {
        DeliveryFailure::NotModified
    } else if has("photo_invalid_dimensions")
        || has("wrong file identifier")
        || has("failed to get http url content")
        || has("webpage_media_empty")
    {
        DeliveryFailure::RetryResized
    } else if has("media_empty") || has("caption is too long") || has("webpage_curl_failed") {
        DeliveryFailure::PlainReply
    } else {
        DeliveryFailure::Other
    }
}

/// Smaller IMDb rendition of a poster url.
#[must_use]
pub fn resized_poster(url: &str) -> String {
    url.replace(".jpg", "._V1_UX360.jpg")
}

async fn edit_photo(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    poster: reqwest::Url,
    caption: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<(), teloxide::RequestError> {
    let media = InputMediaPhoto::new(InputFile::url(poster))
        .caption(caption)
        .parse_mode(ParseMode::Html);
    let mut req = bot.edit_message_media(chat_id, msg_id, InputMedia::Photo(media));
    if let Some(markup) = markup {
        req = req.reply_markup(markup);
    }
    req.await.map(|_| ())
}

/// Whether a refused caption edit still needs the result sent as text.
///
/// Only "not modified" means the user already sees the caption.
#[must_use]
pub fn needs_text_reply(message: &str) -> bool {
    classify_delivery_error(message) != DeliveryFailure::NotModified
}

/// Reply to the search message with the caption as text. When even that is
/// refused, a short failure notice is sent instead.
async fn reply_with_text(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    caption: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    let mut req = bot
        .send_message(chat_id, caption)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg_id));
    if let Some(markup) = markup {
        req = req.reply_markup(markup);
    }
    if let Err(e) = req.await {
        error!("Text reply for IMDb result in {chat_id} failed: {e}");
        send_message_resilient(bot, chat_id, DELIVERY_FAILED, None).await?;
    }
    Ok(())
}

async fn deliver_caption(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    caption: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    match edit_caption_resilient(bot, chat_id, msg_id, caption, markup.clone()).await {
        Ok(_) => Ok(()),
        Err(e) if !needs_text_reply(&e.to_string()) => {
            debug!("Caption update skipped: {e}");
            Ok(())
        }
        Err(e) => {
            warn!("Caption edit refused ({e}), replying with text");
            reply_with_text(bot, chat_id, msg_id, caption, markup).await
        }
    }
}

/// Show a rendered title in place of the search message.
///
/// With a poster the photo is replaced; rejected posters are retried once
/// at a smaller size, and unusable media falls back to a text reply.
/// Without a poster only the caption is edited. A refused caption edit
/// also falls back to a text reply, and a refused reply to a failure notice.
///
/// # Errors
///
/// Returns an error only if the failure notice cannot be sent.
pub async fn deliver_title(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    caption: &str,
    markup: Option<InlineKeyboardMarkup>,
    poster: Option<&str>,
) -> Result<()> {
    let Some(url) = poster.and_then(|p| reqwest::Url::parse(p).ok()) else {
        return deliver_caption(bot, chat_id, msg_id, caption, markup).await;
    };

    let first = match edit_photo(bot, chat_id, msg_id, url.clone(), caption, markup.clone()).await
    {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    let mut failure = classify_delivery_error(&first.to_string());
    if failure == DeliveryFailure::RetryResized {
        debug!("Poster rejected ({first}), retrying resized");
        let resized = reqwest::Url::parse(&resized_poster(url.as_str())).unwrap_or(url);
        match edit_photo(bot, chat_id, msg_id, resized, caption, markup.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                failure = match classify_delivery_error(&e.to_string()) {
                    DeliveryFailure::RetryResized => DeliveryFailure::PlainReply,
                    other => other,
                };
            }
        }
    }

    match failure {
        DeliveryFailure::NotModified => Ok(()),
        DeliveryFailure::PlainReply | DeliveryFailure::RetryResized => {
            reply_with_text(bot, chat_id, msg_id, caption, markup).await
        }
        DeliveryFailure::Other => {
            error!("Error while displaying IMDb data: {first}");
            deliver_caption(bot, chat_id, msg_id, caption, markup).await
        }
    }
}
