//! IMDb commands and inline keyboard callbacks.

use crate::bot::callbacks::{ImdbCallback, LanguageChoice};
use crate::bot::handlers::get_user_id_safe;
use crate::bot::resilient::{deliver_title, edit_caption_safe_resilient, send_message_resilient};
use crate::bot::views::imdb::{self as view, imdb_view};
use crate::config::Settings;
use crate::imdb::preferences::PreferenceError;
use crate::imdb::resolver::SearchOutcome;
use crate::imdb::{ImdbService, Language, Layout};
use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{
        CallbackQuery, InlineKeyboardMarkup, InputFile, Me, MessageId, ParseMode, ReplyParameters,
    },
};
use tracing::{debug, error, info, warn};

async fn reply_html(bot: &Bot, msg: &Message, text: impl Into<String>) -> Result<()> {
    send_message_resilient(bot, msg.chat.id, text, Some(ParseMode::Html)).await?;
    Ok(())
}

/// Reply with the splash picture and a caption.
async fn reply_splash(
    bot: &Bot,
    msg: &Message,
    settings: &Settings,
    caption: String,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let splash = reqwest::Url::parse(&settings.imdb_splash_image)
        .context("invalid IMDb splash image url")?;
    let mut req = bot
        .send_photo(msg.chat.id, InputFile::url(splash))
        .caption(caption)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id));
    if let Some(markup) = markup {
        req = req.reply_markup(markup);
    }
    Ok(req.await?)
}

fn credit_handle(me: &Me) -> String {
    me.user
        .username
        .as_deref()
        .map(|name| format!("@{name}"))
        .unwrap_or_default()
}

/// Run a search and show the result list in place of `msg_id`.
async fn show_results(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    service: &ImdbService,
    lang: Language,
    owner: i64,
    query: &str,
) {
    let texts = imdb_view(lang);
    let (caption, markup) = match service.search(query).await {
        Ok(SearchOutcome::Found(candidates)) => {
            debug!("IMDb search {query:?} found {} titles", candidates.len());
            (
                texts.result_list(query, &candidates),
                Some(view::results_keyboard(lang, owner, &candidates)),
            )
        }
        Ok(SearchOutcome::NoResults) => (texts.no_results(query), None),
        Err(e) => {
            warn!("IMDb search {query:?} failed: {e}");
            (texts.search_failed(&e.to_string()), None)
        }
    };
    edit_caption_safe_resilient(bot, chat_id, msg_id, &caption, markup).await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// `/imdb <query>` handler
///
/// Users with a default language go straight to the result list; others
/// are asked for a language first.
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn imdb(
    bot: Bot,
    msg: Message,
    query: String,
    service: Arc<ImdbService>,
    settings: Arc<Settings>,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return reply_html(&bot, &msg, view::MISSING_QUERY).await;
    }
    if msg.sender_chat.is_some() {
        return reply_html(&bot, &msg, view::ANONYMOUS_SENDER).await;
    }
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} searched IMDb for {query:?}");

    let default_lang = service
        .preferences()
        .get_language(user_id)
        .await
        .unwrap_or_else(|e| {
            warn!("Language preference unavailable for user {user_id}: {e}");
            None
        });

    if let Some(lang) = default_lang {
        let sent = reply_splash(&bot, &msg, &settings, imdb_view(lang).searching(query), None)
            .await?;
        show_results(&bot, msg.chat.id, sent.id, &service, lang, user_id, query).await;
        return Ok(());
    }

    let key = service.candidates().insert(query).await;
    let caption = view::language_prompt(&view::mention(user_id, &user.first_name));
    reply_splash(
        &bot,
        &msg,
        &settings,
        caption,
        Some(view::language_prompt_keyboard(&key, user_id)),
    )
    .await?;
    Ok(())
}

/// `/imdbset` handler: the settings main menu
///
/// # Errors
///
/// Returns an error if the menu cannot be sent.
pub async fn imdbset(bot: Bot, msg: Message, settings: Arc<Settings>) -> Result<()> {
    if msg.sender_chat.is_some() {
        return reply_html(&bot, &msg, view::ANONYMOUS_SENDER).await;
    }
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = get_user_id_safe(&msg);
    reply_splash(
        &bot,
        &msg,
        &settings,
        view::settings_caption(&view::mention(user_id, &user.first_name)),
        Some(view::settings_keyboard(user_id)),
    )
    .await?;
    Ok(())
}

/// Parsed `/imdbtemplate` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateAction {
    /// No arguments: show the guide
    Guide,
    /// Store the template given inline, if any
    Set(Option<String>),
    /// Drop the template
    Remove,
    /// Display the stored template
    Show,
    /// Anything else
    Unknown,
}

impl TemplateAction {
    /// Parse `[action] [template]`.
    #[must_use]
    pub fn parse(args: &str) -> Self {
        let args = args.trim_start();
        if args.trim().is_empty() {
            return Self::Guide;
        }
        let (action, body) = args
            .split_once(char::is_whitespace)
            .unwrap_or((args, ""));
        match action.to_lowercase().as_str() {
            "set" | "save" => {
                let body = body.trim();
                Self::Set((!body.is_empty()).then(|| body.to_string()))
            }
            "remove" | "reset" | "clear" | "delete" => Self::Remove,
            "show" | "view" => Self::Show,
            _ => Self::Unknown,
        }
    }
}

fn replied_plain_text(msg: &Message) -> Option<String> {
    let replied = msg.reply_to_message()?;
    replied
        .text()
        .or_else(|| replied.caption())
        .map(str::to_string)
}

/// `/imdbtemplate [set|remove|show]` handler
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn imdbtemplate(
    bot: Bot,
    msg: Message,
    args: String,
    service: Arc<ImdbService>,
) -> Result<()> {
    if msg.sender_chat.is_some() {
        return reply_html(&bot, &msg, view::ANONYMOUS_SENDER).await;
    }
    if msg.from.is_none() {
        return Ok(());
    }
    let user_id = get_user_id_safe(&msg);
    let preferences = service.preferences();

    let text = match TemplateAction::parse(&args) {
        TemplateAction::Guide => {
            let active = preferences
                .get_custom_template(user_id)
                .await
                .ok()
                .flatten()
                .is_some();
            view::template_instructions(active)
        }
        TemplateAction::Set(inline) => {
            let body = inline.or_else(|| replied_plain_text(&msg)).unwrap_or_default();
            match preferences.set_custom_template(user_id, &body).await {
                Ok(()) => view::TEMPLATE_SAVED.to_string(),
                Err(PreferenceError::Empty) => view::TEMPLATE_MISSING.to_string(),
                Err(PreferenceError::TooLong { .. }) => view::TEMPLATE_TOO_LONG.to_string(),
                Err(e) => {
                    error!("Saving IMDb template for user {user_id} failed: {e}");
                    view::STORAGE_FAILED.to_string()
                }
            }
        }
        TemplateAction::Remove => match preferences.clear_custom_template(user_id).await {
            Ok(()) => view::TEMPLATE_CLEARED.to_string(),
            Err(e) => {
                error!("Clearing IMDb template for user {user_id} failed: {e}");
                view::STORAGE_FAILED.to_string()
            }
        },
        TemplateAction::Show => match preferences.get_custom_template(user_id).await {
            Ok(Some(template)) => view::template_show(&template),
            Ok(None) => view::TEMPLATE_NONE.to_string(),
            Err(e) => {
                error!("Reading IMDb template for user {user_id} failed: {e}");
                view::STORAGE_FAILED.to_string()
            }
        },
        TemplateAction::Unknown => view::TEMPLATE_UNKNOWN_ACTION.to_string(),
    };

    reply_html(&bot, &msg, text).await
}

/// Parsed `/imdbby` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditAction {
    /// No value: show the current setting
    Show,
    /// Back to the bot handle
    Reset,
    /// New credit line
    Set(String),
}

impl CreditAction {
    /// Parse the command value, already merged with any replied text.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::Show;
        }
        match value.to_lowercase().as_str() {
            "reset" | "default" | "clear" => Self::Reset,
            _ => Self::Set(value.to_string()),
        }
    }
}

/// `/imdbby [text|reset]` handler
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn imdbby(bot: Bot, msg: Message, args: String, service: Arc<ImdbService>) -> Result<()> {
    if msg.sender_chat.is_some() {
        return reply_html(&bot, &msg, view::ANONYMOUS_SENDER).await;
    }
    if msg.from.is_none() {
        return Ok(());
    }
    let user_id = get_user_id_safe(&msg);
    let preferences = service.preferences();

    let value = if args.trim().is_empty() {
        replied_plain_text(&msg).unwrap_or_default()
    } else {
        args
    };

    let text = match CreditAction::parse(&value) {
        CreditAction::Show => {
            let current = preferences
                .get_credit_override(user_id)
                .await
                .ok()
                .flatten();
            view::credit_usage(current.as_deref())
        }
        CreditAction::Reset => match preferences.clear_credit_override(user_id).await {
            Ok(()) => view::CREDIT_CLEARED.to_string(),
            Err(e) => {
                error!("Clearing IMDb credit for user {user_id} failed: {e}");
                view::STORAGE_FAILED.to_string()
            }
        },
        CreditAction::Set(value) => match preferences.set_credit_override(user_id, &value).await {
            Ok(()) => view::credit_saved(&value),
            Err(PreferenceError::TooLong { .. }) => view::CREDIT_TOO_LONG.to_string(),
            Err(e) => {
                error!("Saving IMDb credit for user {user_id} failed: {e}");
                view::STORAGE_FAILED.to_string()
            }
        },
    };

    reply_html(&bot, &msg, text).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Callbacks
// ─────────────────────────────────────────────────────────────────────────────

/// A pressed button together with the message it belongs to.
struct Press<'a> {
    bot: &'a Bot,
    query: &'a CallbackQuery,
    service: &'a ImdbService,
    chat_id: ChatId,
    msg_id: MessageId,
    user_id: i64,
}

impl Press<'_> {
    async fn answer(&self, text: Option<&str>, alert: bool) {
        let mut req = self.bot.answer_callback_query(self.query.id.clone());
        if let Some(text) = text {
            req = req.text(text).show_alert(alert);
        }
        if let Err(e) = req.await {
            debug!("Callback answer failed: {e}");
        }
    }

    async fn edit(&self, caption: &str, markup: Option<InlineKeyboardMarkup>) {
        edit_caption_safe_resilient(self.bot, self.chat_id, self.msg_id, caption, markup).await;
    }

    async fn show_layout(&self, layout: &Layout) {
        let custom_active = self.custom_template().await.is_some();
        self.edit(
            &view::layout_caption(custom_active),
            Some(view::layout_keyboard(self.user_id, layout)),
        )
        .await;
    }

    async fn custom_template(&self) -> Option<String> {
        self.service
            .preferences()
            .get_custom_template(self.user_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Template unavailable for user {}: {e}", self.user_id);
                None
            })
    }

    async fn show_custom_menu(&self) {
        let active = self.custom_template().await.is_some();
        self.edit(
            &view::custom_menu_caption(active),
            Some(view::custom_menu_keyboard(self.user_id, active)),
        )
        .await;
    }

    async fn show_credit_menu(&self) {
        let current = self
            .service
            .preferences()
            .get_credit_override(self.user_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Credit override unavailable for user {}: {e}", self.user_id);
                None
            });
        self.edit(
            &view::credit_menu_caption(current.as_deref()),
            Some(view::credit_menu_keyboard(self.user_id, current.is_some())),
        )
        .await;
    }
}

/// Handle every IMDb inline keyboard press.
///
/// Presses by anyone but the user the keyboard was built for are refused
/// with an alert.
///
/// # Errors
///
/// Returns an error if a Telegram call outside the graceful paths fails.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    service: Arc<ImdbService>,
    me: Me,
) -> Result<()> {
    let Some(callback) = q.data.as_deref().and_then(ImdbCallback::parse) else {
        debug!("Ignoring unknown callback data {:?}", q.data);
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let press = Press {
        bot: &bot,
        query: &q,
        service: &service,
        chat_id: message.chat().id,
        msg_id: message.id(),
        user_id: q.from.id.0.cast_signed(),
    };

    if callback.owner() != press.user_id {
        let denied = match &callback {
            ImdbCallback::Search { lang, .. } | ImdbCallback::Result { lang, .. } => {
                imdb_view(*lang).access_denied()
            }
            _ => view::ACCESS_DENIED,
        };
        press.answer(Some(format!("⚠️ {denied}").as_str()), true).await;
        return Ok(());
    }

    match callback {
        ImdbCallback::Search { lang, key, .. } => on_search(&press, lang, &key).await,
        ImdbCallback::Result { lang, title_id, .. } => {
            on_result(&press, lang, &title_id, &credit_handle(&me)).await?;
        }
        ImdbCallback::LanguageMenu { .. } => {
            let has_record = matches!(
                service.preferences().get_language(press.user_id).await,
                Ok(Some(_))
            );
            press
                .edit(
                    view::LANGUAGE_MENU,
                    Some(view::language_menu_keyboard(press.user_id, has_record)),
                )
                .await;
            press.answer(None, false).await;
        }
        ImdbCallback::SetLanguage { choice, .. } => on_set_language(&press, choice).await,
        ImdbCallback::Settings { .. } => {
            press
                .edit(
                    &view::settings_caption(&view::mention(press.user_id, &q.from.first_name)),
                    Some(view::settings_keyboard(press.user_id)),
                )
                .await;
            press.answer(None, false).await;
        }
        other => on_preference_menu(&press, other).await,
    }
    Ok(())
}

async fn on_search(press: &Press<'_>, lang: Language, key: &str) {
    press.answer(None, false).await;
    let texts = imdb_view(lang);
    let Some(query) = press.service.candidates().take(key).await else {
        press.edit(texts.expired(), None).await;
        return;
    };
    press.edit(texts.looking_up(), None).await;
    show_results(
        press.bot,
        press.chat_id,
        press.msg_id,
        press.service,
        lang,
        press.user_id,
        &query,
    )
    .await;
}

async fn on_result(press: &Press<'_>, lang: Language, title_id: &str, handle: &str) -> Result<()> {
    let texts = imdb_view(lang);
    press.edit(texts.fetching_title(), None).await;

    match press
        .service
        .lookup(press.user_id, title_id, lang, handle)
        .await
    {
        Ok(title) => {
            if title.composed.template_error.is_some() {
                press.answer(Some(view::TEMPLATE_BROKEN), true).await;
            } else {
                press.answer(None, false).await;
            }
            let caption = &title.composed.caption;
            deliver_title(
                press.bot,
                press.chat_id,
                press.msg_id,
                &caption.text,
                view::link_keyboard(&caption.buttons),
                title.poster_url.as_deref(),
            )
            .await?;
        }
        Err(e) => {
            warn!("IMDb title {title_id} failed for user {}: {e}", press.user_id);
            press.answer(None, false).await;
            press.edit(&texts.title_failed(&e.to_string()), None).await;
        }
    }
    Ok(())
}

async fn on_set_language(press: &Press<'_>, choice: LanguageChoice) {
    let preferences = press.service.preferences();
    let current = preferences
        .get_language(press.user_id)
        .await
        .ok()
        .flatten();

    let result = match choice {
        LanguageChoice::Set(lang) if current == Some(lang) => {
            press
                .answer(Some(view::language_already_set(lang).as_str()), true)
                .await;
            return;
        }
        LanguageChoice::Set(lang) => preferences.set_language(press.user_id, lang).await,
        LanguageChoice::Remove => preferences.remove_preferences(press.user_id).await,
    };

    match result {
        Ok(()) => {
            press.edit(view::language_changed(choice), None).await;
            press.answer(None, false).await;
        }
        Err(e) => {
            error!("Language update for user {} failed: {e}", press.user_id);
            press.answer(Some(view::STORAGE_FAILED), true).await;
        }
    }
}

async fn on_preference_menu(press: &Press<'_>, callback: ImdbCallback) {
    let preferences = press.service.preferences();
    let user_id = press.user_id;

    match callback {
        ImdbCallback::LayoutMenu { .. } => {
            let layout = preferences.get_layout(user_id).await.unwrap_or_else(|e| {
                warn!("Layout unavailable for user {user_id}: {e}");
                Layout::default()
            });
            press.show_layout(&layout).await;
            press.answer(None, false).await;
        }
        ImdbCallback::LayoutToggle { field, .. } => {
            match preferences.toggle_layout(user_id, &field).await {
                Ok((field, layout)) => {
                    press.show_layout(&layout).await;
                    let status = view::layout_toggled(field.menu_label(), layout.is_enabled(field));
                    press.answer(Some(status.as_str()), false).await;
                }
                Err(PreferenceError::UnknownField(_)) => {
                    press.answer(Some(view::INVALID_FIELD), true).await;
                }
                Err(e) => {
                    error!("Layout toggle for user {user_id} failed: {e}");
                    press.answer(Some(view::STORAGE_FAILED), true).await;
                }
            }
        }
        ImdbCallback::LayoutReset { .. } => match preferences.reset_layout(user_id).await {
            Ok(layout) => {
                press.show_layout(&layout).await;
                press.answer(Some(view::LAYOUT_RESET), true).await;
            }
            Err(e) => {
                error!("Layout reset for user {user_id} failed: {e}");
                press.answer(Some(view::STORAGE_FAILED), true).await;
            }
        },
        ImdbCallback::CustomMenu { .. } => {
            press.show_custom_menu().await;
            press.answer(None, false).await;
        }
        ImdbCallback::CustomRemove { .. } => {
            let alert = match preferences.clear_custom_template(user_id).await {
                Ok(()) => view::TEMPLATE_REMOVED_ALERT,
                Err(e) => {
                    error!("Template removal for user {user_id} failed: {e}");
                    view::STORAGE_FAILED
                }
            };
            press.answer(Some(alert), true).await;
            press.show_custom_menu().await;
        }
        ImdbCallback::CreditMenu { .. } => {
            press.show_credit_menu().await;
            press.answer(None, false).await;
        }
        ImdbCallback::CreditReset { .. } => {
            let alert = match preferences.clear_credit_override(user_id).await {
                Ok(()) => view::CREDIT_RESET_ALERT,
                Err(e) => {
                    error!("Credit reset for user {user_id} failed: {e}");
                    view::STORAGE_FAILED
                }
            };
            press.answer(Some(alert), true).await;
            press.show_credit_menu().await;
        }
        ImdbCallback::Close { .. } => {
            press.answer(None, false).await;
            if let Err(e) = press.bot.delete_message(press.chat_id, press.msg_id).await {
                debug!("Closing IMDb menu failed: {e}");
            }
        }
        ImdbCallback::Search { .. }
        | ImdbCallback::Result { .. }
        | ImdbCallback::LanguageMenu { .. }
        | ImdbCallback::SetLanguage { .. }
        | ImdbCallback::Settings { .. } => press.answer(None, false).await,
    }
}
