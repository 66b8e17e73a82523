use crate::autokick::{self, ScheduleError};
use crate::bot::resilient::send_message_resilient;
use crate::bot::views::imdb::link_keyboard;
use crate::config::get_auto_kick_default_minutes;
use crate::post::{self, MediaKind, PostMedia};
use crate::storage::StorageProvider;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardMarkup, InputFile, ParseMode, Recipient, UserId},
    utils::{command::BotCommands, render::RenderMessageTextHelper},
};
use tracing::{debug, error, info, warn};

/// `/post` sent without replying to anything
const POST_NEEDS_REPLY: &str = "⚠️ Balas pesan yang ingin dikirim dengan <code>/post @namachannel</code>.";
/// `/post` issuer is not an admin of the target channel
const POST_UNAUTHORIZED: &str = "⚠️ Kamu tidak memiliki izin untuk mengirim pesan ke channel ini.";
/// Target channel unknown to the bot
const POST_CHANNEL_NOT_FOUND: &str = "⚠️ Channel tidak ditemukan atau tidak valid, pastikan bot sudah dijadikan admin di channel tersebut";
/// Post delivered
const POST_SENT: &str = "✅ Berhasil kirim pesan ke channel.";
/// `/auto_kick` issuer is not a group admin
const KICK_NOT_ADMIN: &str = "You must be a group admin to use this command!";

/// Display name of the sender: username, else first name.
pub fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Whether `user_id` is an owner or administrator of `chat`.
///
/// Lookup failures count as "no".
pub async fn is_admin(bot: &Bot, chat: impl Into<Recipient>, user_id: UserId) -> bool {
    match bot.get_chat_member(chat, user_id).await {
        Ok(member) => member.kind.is_privileged(),
        Err(e) => {
            debug!("Chat member lookup for {user_id} failed: {e}");
            false
        }
    }
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Search IMDb
    #[command(description = "Search a movie or series on IMDb.")]
    Imdb(String),
    /// IMDb settings menu
    #[command(description = "IMDb search settings.")]
    Imdbset,
    /// Custom caption template
    #[command(description = "Manage your custom IMDb caption template.")]
    Imdbtemplate(String),
    /// Credit line of IMDb results
    #[command(description = "Set the credit line of IMDb results.")]
    Imdbby(String),
    /// Schedule removal of a member
    #[command(rename = "auto_kick", description = "Kick a member after a delay in minutes.")]
    AutoKick(String),
    /// Republish the replied message to a channel
    #[command(description = "Post the replied message to a channel.")]
    Post(String),
}

async fn reply_html(bot: &Bot, msg: &Message, text: impl Into<String>) -> Result<()> {
    send_message_resilient(bot, msg.chat.id, text, Some(ParseMode::Html)).await?;
    Ok(())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let user_name = get_user_name(&msg);

    info!("User {user_id} ({user_name}) initiated /start command.");

    let text = format!(
        "👋 <b>Hi {}!</b>\n\n\
         I can look up movies and series on IMDb, remove members from your \
         groups after a delay and post messages with link buttons to your channels.\n\n\
         {}",
        html_escape::encode_text(&user_name),
        html_escape::encode_text(&Command::descriptions().to_string())
    );

    reply_html(&bot, &msg, text).await
}

/// `/auto_kick <user_id> [minutes]` handler
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn auto_kick(
    bot: Bot,
    msg: Message,
    args: String,
    storage: Arc<dyn StorageProvider>,
) -> Result<()> {
    if !(msg.chat.is_group() || msg.chat.is_supergroup()) {
        send_message_resilient(&bot, msg.chat.id, "This command only works in groups.", None)
            .await?;
        return Ok(());
    }
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    if !is_admin(&bot, msg.chat.id, user.id).await {
        send_message_resilient(&bot, msg.chat.id, KICK_NOT_ADMIN, None).await?;
        return Ok(());
    }

    let request = match autokick::parse_args(&args, get_auto_kick_default_minutes()) {
        Ok(request) => request,
        Err(e) => {
            send_message_resilient(&bot, msg.chat.id, e.to_string(), None).await?;
            return Ok(());
        }
    };

    let text = match autokick::schedule(storage.as_ref(), msg.chat.id.0, request, Utc::now()).await
    {
        Ok(_) => autokick::confirmation(&request),
        Err(ScheduleError::Args(e)) => e.to_string(),
        Err(ScheduleError::Storage(e)) => {
            error!("Failed to schedule kick in {}: {e}", msg.chat.id);
            "Failed to schedule the kick, please try again later.".to_string()
        }
    };
    send_message_resilient(&bot, msg.chat.id, text, None).await?;
    Ok(())
}

/// `/post <@channel|-100id> [extra text]` handler
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn post(bot: Bot, msg: Message, args: String) -> Result<()> {
    let Some(replied) = msg.reply_to_message() else {
        return reply_html(&bot, &msg, POST_NEEDS_REPLY).await;
    };
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let command = match post::parse_command(&args) {
        Ok(command) => command,
        Err(e) => return reply_html(&bot, &msg, e.to_string()).await,
    };
    let target = command.target.recipient();

    if !is_admin(&bot, target.clone(), user.id).await {
        return reply_html(&bot, &msg, POST_UNAUTHORIZED).await;
    }
    if let Err(e) = bot.get_chat(target.clone()).await {
        let text = if e.to_string().to_lowercase().contains("chat not found") {
            POST_CHANNEL_NOT_FOUND.to_string()
        } else {
            format!(
                "⚠️ Terjadi kesalahan saat mengakses channel: {}",
                html_escape::encode_text(&e.to_string())
            )
        };
        return reply_html(&bot, &msg, text).await;
    }

    let replied_text = replied
        .html_caption()
        .or_else(|| replied.html_text())
        .unwrap_or_default();
    let (text, rows) = post::parse_buttons_layout(&post::compose_text(&replied_text, &command.extra));
    let media = post::select_media(replied);
    if let Err(e) = post::ensure_postable(&text, media.as_ref()) {
        return reply_html(&bot, &msg, e.to_string()).await;
    }

    match send_post(&bot, target, &text, media, link_keyboard(&rows)).await {
        Ok(()) => {
            info!("User {} posted to {:?}", user.id, command.target);
            reply_html(&bot, &msg, POST_SENT).await
        }
        Err(e) => {
            warn!("Post to {:?} failed: {e}", command.target);
            reply_html(
                &bot,
                &msg,
                format!(
                    "⚠️ Gagal mengirim pesan ke channel: {}",
                    html_escape::encode_text(&e.to_string())
                ),
            )
            .await
        }
    }
}

async fn send_post(
    bot: &Bot,
    target: Recipient,
    text: &str,
    media: Option<PostMedia>,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<(), teloxide::RequestError> {
    let Some(media) = media else {
        let mut req = bot.send_message(target, text).parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            req = req.reply_markup(markup);
        }
        req.await?;
        return Ok(());
    };

    let file = InputFile::file_id(media.file_id);
    match media.kind {
        MediaKind::Photo => {
            let mut req = bot.send_photo(target, file).caption(text).parse_mode(ParseMode::Html);
            if let Some(markup) = markup {
                req = req.reply_markup(markup);
            }
            req.await?;
        }
        MediaKind::Video => {
            let mut req = bot.send_video(target, file).caption(text).parse_mode(ParseMode::Html);
            if let Some(markup) = markup {
                req = req.reply_markup(markup);
            }
            req.await?;
        }
        MediaKind::Document => {
            let mut req = bot
                .send_document(target, file)
                .caption(text)
                .parse_mode(ParseMode::Html);
            if let Some(markup) = markup {
                req = req.reply_markup(markup);
            }
            req.await?;
        }
        MediaKind::Audio => {
            let mut req = bot.send_audio(target, file).caption(text).parse_mode(ParseMode::Html);
            if let Some(markup) = markup {
                req = req.reply_markup(markup);
            }
            req.await?;
        }
    }
    Ok(())
}
