//! Keyboards built by the views decode back into callbacks, and `/post`
//! arguments turn into postable text plus buttons.

use katy_bot::autokick::{parse_args, KickArgsError};
use katy_bot::bot::callbacks::{ImdbCallback, CALLBACK_DATA_LIMIT};
use katy_bot::bot::views::imdb::{imdb_view, layout_keyboard, link_keyboard, results_keyboard};
use katy_bot::imdb::{Language, Layout, LayoutField, MovieCandidate};
use katy_bot::post::{
    compose_text, ensure_postable, parse_buttons_layout, parse_command, ChannelTarget, PostError,
};
use katy_bot::utils::LinkButton;
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};

const OWNER: i64 = 5_123_456_789;

fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
    markup
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|button| match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

fn candidate(id: &str, title: &str) -> MovieCandidate {
    MovieCandidate {
        id: id.to_string(),
        title: title.to_string(),
        year: Some("1999".to_string()),
        kind: "Movie".to_string(),
    }
}

#[test]
fn test_results_keyboard_round_trips_every_button() {
    let candidates: Vec<_> = (0..10)
        .map(|i| candidate(&format!("01330{i:02}"), "The Matrix"))
        .collect();
    let markup = results_keyboard(Language::Indonesian, OWNER, &candidates);

    // Ten numbers plus language and close, four per row.
    assert_eq!(markup.inline_keyboard.len(), 3);
    assert!(markup.inline_keyboard.iter().all(|row| row.len() <= 4));

    let decoded: Vec<ImdbCallback> = callbacks(&markup)
        .iter()
        .inspect(|data| assert!(data.len() <= CALLBACK_DATA_LIMIT, "{data} too long"))
        .filter_map(|data| ImdbCallback::parse(data))
        .collect();
    assert_eq!(decoded.len(), 12);
    assert!(decoded.iter().all(|cb| cb.owner() == OWNER));
    assert_eq!(
        decoded[0],
        ImdbCallback::Result {
            lang: Language::Indonesian,
            owner: OWNER,
            title_id: "0133000".to_string(),
        }
    );
    assert_eq!(decoded[11], ImdbCallback::Close { owner: OWNER });
}

#[test]
fn test_layout_keyboard_toggles_known_fields() {
    let mut layout = Layout::default();
    layout.set(LayoutField::Plot, false);
    let markup = layout_keyboard(OWNER, &layout);

    let toggled: Vec<String> = callbacks(&markup)
        .iter()
        .filter_map(|data| match ImdbCallback::parse(data) {
            Some(ImdbCallback::LayoutToggle { field, owner }) if owner == OWNER => Some(field),
            _ => None,
        })
        .collect();
    assert_eq!(toggled.len(), LayoutField::ALL.len());
    assert!(toggled
        .iter()
        .all(|key| LayoutField::from_key(key).is_some()));
}

#[test]
fn test_views_escape_queries() {
    let text = imdb_view(Language::English).no_results("<b>nope</b>");
    assert_eq!(
        text,
        "⛔️ Result not found for keywords: <code>&lt;b&gt;nope&lt;/b&gt;</code>"
    );
    let listed = imdb_view(Language::Indonesian).result_list("matrix", &[candidate("1", "A & B")]);
    assert!(listed.contains("1. A &amp; B (1999) - Movie"));
}

#[test]
fn test_link_keyboard_skips_unusable_urls() {
    let rows = vec![vec![
        LinkButton::new("Good", "https://example.com"),
        LinkButton::new("Bad", "not a url"),
    ]];
    let Some(markup) = link_keyboard(&rows) else {
        panic!("one valid button should remain");
    };
    assert_eq!(markup.inline_keyboard.len(), 1);
    assert_eq!(markup.inline_keyboard[0].len(), 1);
    assert!(link_keyboard(&[vec![LinkButton::new("Bad", "nope")]]).is_none());
}

#[test]
fn test_post_text_and_buttons() -> Result<(), PostError> {
    let command = parse_command("@mychannel [A](https://a.example) [B](https://b.example)")?;
    assert_eq!(
        command.target,
        ChannelTarget::Username("@mychannel".to_string())
    );

    let (text, rows) = parse_buttons_layout(&compose_text("Hello world", &command.extra));
    assert_eq!(text, "Hello world");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], LinkButton::new("A", "https://a.example"));
    assert_eq!(rows[0][1], LinkButton::new("B", "https://b.example"));
    ensure_postable(&text, None)
}

#[test]
fn test_post_buttons_alone_are_refused() -> Result<(), PostError> {
    let command = parse_command("-1001234567890 [Only](https://x.example)")?;
    assert_eq!(command.target, ChannelTarget::Id(-1_001_234_567_890));

    let (text, rows) = parse_buttons_layout(&compose_text("", &command.extra));
    assert!(text.is_empty());
    assert_eq!(rows.len(), 1);
    assert_eq!(ensure_postable(&text, None), Err(PostError::Empty));
    assert_eq!(parse_command("mychannel"), Err(PostError::InvalidTarget));
    assert_eq!(parse_command("   "), Err(PostError::MissingTarget));
    Ok(())
}

#[test]
fn test_auto_kick_arguments() {
    assert!(matches!(parse_args("12345", 5), Ok(r) if r.user_id == 12345 && r.minutes == 5));
    assert!(matches!(parse_args("12345 30", 5), Ok(r) if r.minutes == 30));
    assert_eq!(parse_args("12345 0", 5), Err(KickArgsError::InvalidMinutes));
    assert_eq!(parse_args("", 5), Err(KickArgsError::Usage));
    assert_eq!(parse_args("abc", 5), Err(KickArgsError::Usage));
}
