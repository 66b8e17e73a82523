//! IMDb UI components
//!
//! Search prompts and result lists come in English and Indonesian; the
//! settings menus are Indonesian only.

use crate::bot::callbacks::{ImdbCallback, LanguageChoice};
use crate::imdb::{Language, Layout, MovieCandidate};
use crate::utils::{truncate_str, LinkButton};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

// ─────────────────────────────────────────────────────────────────────────────
// Fixed texts
// ─────────────────────────────────────────────────────────────────────────────

/// Longest error excerpt shown in a caption
const ERROR_PREVIEW_CHARS: usize = 300;

/// `/imdb` without a query
pub const MISSING_QUERY: &str =
    "ℹ️ Please add query after CMD!\nEx: <code>/imdb Jurassic World</code>";
/// Command sent on behalf of a channel or an anonymous admin
pub const ANONYMOUS_SENDER: &str = "Cannot identify user, please use in private chat.";
/// Callback pressed by someone else, settings menus
pub const ACCESS_DENIED: &str = "Access Denied!";
/// Toggle of a key outside the layout
pub const INVALID_FIELD: &str = "Invalid field!";
/// Alert after a layout reset
pub const LAYOUT_RESET: &str = "Layout dikembalikan ke default.";
/// Alert after removing the template from its menu
pub const TEMPLATE_REMOVED_ALERT: &str = "Template custom dihapus.";
/// Alert after resetting the credit line from its menu
pub const CREDIT_RESET_ALERT: &str = "IMDb by disetel ke default.";
/// Alert when a custom template could not be rendered
pub const TEMPLATE_BROKEN: &str = "Template IMDb kamu error. Cek /imdbtemplate untuk memperbaiki.";
/// Generic failure reply of the settings commands
pub const STORAGE_FAILED: &str = "⚠️ Gagal menyimpan pengaturan, coba lagi nanti.";
/// Sent when a title could be shown neither as photo nor as text
pub const DELIVERY_FAILED: &str = "⚠️ Gagal menampilkan hasil IMDb, coba lagi nanti.";

/// `/imdbtemplate set` without a body
pub const TEMPLATE_MISSING: &str =
    "Silakan tulis template setelah perintah atau balas pesan yang berisi template.";
/// Template over the length limit
pub const TEMPLATE_TOO_LONG: &str = "Template terlalu panjang. Maksimal 3500 karakter.";
/// Template stored
pub const TEMPLATE_SAVED: &str = "Custom layout IMDb tersimpan. Gunakan /imdb untuk mencoba.";
/// Template removed by command
pub const TEMPLATE_CLEARED: &str = "Template custom telah dihapus.";
/// `/imdbtemplate show` without a stored template
pub const TEMPLATE_NONE: &str = "Belum ada template custom yang tersimpan.";
/// Unknown `/imdbtemplate` action
pub const TEMPLATE_UNKNOWN_ACTION: &str =
    "Perintah tidak dikenal. Kirim <code>/imdbtemplate</code> untuk panduan.";

/// Credit line reset by command
pub const CREDIT_CLEARED: &str = "IMDb by dikembalikan ke default bot.";
/// Credit line over the length limit
pub const CREDIT_TOO_LONG: &str = "Teks terlalu panjang. Maksimal 64 karakter.";

/// Placeholder descriptions listed by `/imdbtemplate`.
pub const PLACEHOLDER_HELP: [(&str, &str); 36] = [
    ("title", "Judul utama"),
    ("title_with_year", "Judul + tahun"),
    ("title_link", "Judul + tahun versi tautan"),
    ("aka", "Judul alternatif (AKA)"),
    ("type", "Jenis konten (Movie, Series, dll)"),
    ("year", "Rentang/tahun perilisan"),
    ("duration", "Durasi (diterjemahkan untuk ID)"),
    ("duration_raw", "Durasi asli dari IMDb"),
    ("category", "Rating konten (PG-13, dll)"),
    ("rating_value", "Nilai rating IMDb"),
    ("rating_count", "Total penilai"),
    ("rating_text", "Ringkasan rating sesuai bahasa"),
    ("release", "Tanggal rilis"),
    ("release_url", "Tautan tanggal rilis"),
    ("release_link", "Tanggal rilis versi tautan"),
    ("genres", "Genre dalam bentuk hashtag"),
    ("genres_list", "Genre dipisah koma"),
    ("countries", "Daftar negara + hashtag"),
    ("countries_list", "Daftar negara biasa"),
    ("languages", "Daftar bahasa + hashtag"),
    ("languages_list", "Daftar bahasa biasa"),
    ("directors", "Daftar sutradara"),
    ("writers", "Daftar penulis"),
    ("cast", "Daftar pemeran"),
    ("plot", "Plot / summary"),
    ("keywords", "Daftar kata kunci versi hashtag"),
    ("keywords_list", "Daftar kata kunci dipisah koma"),
    ("awards", "Informasi penghargaan"),
    ("availability", "Info layanan streaming"),
    ("ott", "Data mentah dari pencarian OTT"),
    ("imdb_by", "Tagline @username bot"),
    ("imdb_url", "URL halaman IMDb"),
    ("trailer_url", "URL trailer"),
    ("poster_url", "URL poster"),
    ("imdb_code", "ID IMDb (misal tt1234567)"),
    ("locale", "Kode bahasa (id/en)"),
];

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Language-specific texts of the search and result flow.
pub trait ImdbView: Sync {
    /// First caption while the suggestion endpoint is queried
    fn searching(&self, query: &str) -> String;

    /// Caption after a language button was pressed
    fn looking_up(&self) -> &'static str;

    /// The pending query is gone
    fn expired(&self) -> &'static str;

    /// Numbered result list
    fn result_list(&self, query: &str, candidates: &[MovieCandidate]) -> String;

    /// The endpoint knew no title for the query
    fn no_results(&self, query: &str) -> String;

    /// The suggestion endpoint failed
    fn search_failed(&self, error: &str) -> String;

    /// Caption while a detail page is fetched
    fn fetching_title(&self) -> &'static str;

    /// The detail page could not be turned into a caption
    fn title_failed(&self, error: &str) -> String;

    /// Result button pressed by someone else
    fn access_denied(&self) -> &'static str;
}

fn numbered_rows(candidates: &[MovieCandidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. {} ({}) - {}\n",
                i + 1,
                html_escape::encode_text(&c.title),
                html_escape::encode_text(c.year_display()),
                c.kind
            )
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Implementations
// ─────────────────────────────────────────────────────────────────────────────

/// English texts
pub struct EnglishImdbView;

impl ImdbView for EnglishImdbView {
    fn searching(&self, query: &str) -> String {
        format!(
            "🔎 Searching <code>{}</code> in IMDb Database...",
            html_escape::encode_text(query)
        )
    }

    fn looking_up(&self) -> &'static str {
        "<i>🔎 Looking in the IMDB Database..</i>"
    }

    fn expired(&self) -> &'static str {
        "⚠️ Callback Query Expired!"
    }

    fn result_list(&self, query: &str, candidates: &[MovieCandidate]) -> String {
        format!(
            "🎬 Found ({}) result for keywords: <code>{}</code>\n\n{}",
            candidates.len(),
            html_escape::encode_text(query),
            numbered_rows(candidates)
        )
    }

    fn no_results(&self, query: &str) -> String {
        format!(
            "⛔️ Result not found for keywords: <code>{}</code>",
            html_escape::encode_text(query)
        )
    }

    fn search_failed(&self, error: &str) -> String {
        format!(
            "Failed when requesting movies title. Maybe got rate limit or down.\n\n<b>ERROR:</b> <code>{}</code>",
            html_escape::encode_text(&truncate_str(error, ERROR_PREVIEW_CHARS))
        )
    }

    fn fetching_title(&self) -> &'static str {
        "<i>⏳ Getting IMDb source..</i>"
    }

    fn title_failed(&self, error: &str) -> String {
        format!(
            "Sorry, failed getting data from IMDB. {}",
            html_escape::encode_text(&truncate_str(error, ERROR_PREVIEW_CHARS))
        )
    }

    fn access_denied(&self) -> &'static str {
        "Access Denied!"
    }
}

/// Indonesian texts
pub struct IndonesianImdbView;

impl ImdbView for IndonesianImdbView {
    fn searching(&self, query: &str) -> String {
        format!(
            "🔎 Menelusuri <code>{}</code> di database IMDb ...",
            html_escape::encode_text(query)
        )
    }

    fn looking_up(&self) -> &'static str {
        "<i>🔎 Sedang mencari di Database IMDB..</i>"
    }

    fn expired(&self) -> &'static str {
        "⚠️ Callback Query Sudah Expired!"
    }

    fn result_list(&self, query: &str, candidates: &[MovieCandidate]) -> String {
        format!(
            "🎬 Ditemukan ({}) hasil untuk kueri: <code>{}</code>\n\n{}",
            candidates.len(),
            html_escape::encode_text(query),
            numbered_rows(candidates)
        )
    }

    fn no_results(&self, query: &str) -> String {
        format!(
            "⛔️ Tidak ditemukan hasil untuk kueri: <code>{}</code>",
            html_escape::encode_text(query)
        )
    }

    fn search_failed(&self, error: &str) -> String {
        format!(
            "Ooppss, gagal mendapatkan daftar judul di IMDb. Mungkin terkena rate limit atau down.\n\n<b>ERROR:</b> <code>{}</code>",
            html_escape::encode_text(&truncate_str(error, ERROR_PREVIEW_CHARS))
        )
    }

    fn fetching_title(&self) -> &'static str {
        "<i>⏳ Permintaan kamu sedang diproses.. </i>"
    }

    fn title_failed(&self, error: &str) -> String {
        format!(
            "Maaf, gagal mendapatkan info data dari IMDB. {}",
            html_escape::encode_text(&truncate_str(error, ERROR_PREVIEW_CHARS))
        )
    }

    fn access_denied(&self) -> &'static str {
        "Akses Ditolak!"
    }
}

/// Texts for `lang`.
#[must_use]
pub fn imdb_view(lang: Language) -> &'static dyn ImdbView {
    match lang {
        Language::English => &EnglishImdbView,
        Language::Indonesian => &IndonesianImdbView,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Search flow
// ─────────────────────────────────────────────────────────────────────────────

/// HTML mention of a user.
#[must_use]
pub fn mention(user_id: i64, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={user_id}\">{}</a>",
        html_escape::encode_text(name)
    )
}

/// Caption asking which language to search in.
#[must_use]
pub fn language_prompt(mention: &str) -> String {
    format!(
        "Hi {mention}, Please select the language you want to use on IMDB Search. \
         If you want use default lang for every user, click third button. \
         So no need click select lang if use CMD.\n\nTimeout: 10s"
    )
}

fn close_button(owner: i64) -> InlineKeyboardButton {
    callback_button("❌ Close", &ImdbCallback::Close { owner })
}

fn callback_button(label: &str, callback: &ImdbCallback) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, callback.to_string())
}

/// Language choice for a pending query stored under `key`.
#[must_use]
pub fn language_prompt_keyboard(key: &str, owner: i64) -> InlineKeyboardMarkup {
    let search = |lang| ImdbCallback::Search {
        lang,
        key: key.to_string(),
        owner,
    };
    InlineKeyboardMarkup::new(vec![
        vec![
            callback_button("🇺🇸 English", &search(Language::English)),
            callback_button("🇮🇩 Indonesia", &search(Language::Indonesian)),
        ],
        vec![callback_button(
            "🚩 Set Default Language",
            &ImdbCallback::LanguageMenu { owner },
        )],
        vec![close_button(owner)],
    ])
}

/// Number buttons for every candidate, then language and close, four per row.
#[must_use]
pub fn results_keyboard(
    lang: Language,
    owner: i64,
    candidates: &[MovieCandidate],
) -> InlineKeyboardMarkup {
    let mut buttons: Vec<InlineKeyboardButton> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            callback_button(
                &(i + 1).to_string(),
                &ImdbCallback::Result {
                    lang,
                    owner,
                    title_id: c.id.clone(),
                },
            )
        })
        .collect();
    buttons.push(callback_button(
        "🚩 Language",
        &ImdbCallback::LanguageMenu { owner },
    ));
    buttons.push(close_button(owner));

    InlineKeyboardMarkup::new(buttons.chunks(4).map(<[_]>::to_vec))
}

/// URL keyboard from composed button rows.
///
/// Buttons whose url Telegram would reject are dropped; `None` when nothing
/// is left.
#[must_use]
pub fn link_keyboard(rows: &[Vec<LinkButton>]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|button| match reqwest::Url::parse(&button.url) {
                    Ok(url) => Some(InlineKeyboardButton::url(button.label.clone(), url)),
                    Err(e) => {
                        warn!("Dropping button {:?} with bad url: {e}", button.label);
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings menus
// ─────────────────────────────────────────────────────────────────────────────

/// Caption of the settings main menu.
#[must_use]
pub fn settings_caption(mention: &str) -> String {
    format!(
        "Halo {mention}!\n\
         Kelola preferensi IMDb Search kamu di sini.\n\n\
         • 🎛 Edit Layout → pilih informasi apa saja yang tampil di hasil detail.\n\
         • 🧩 Custom Layout → pakai template HTML sendiri.\n\
         • 📝 IMDb By → atur nama/username yang muncul di kredit.\n\
         • 🚩 Language → set bahasa default saat memakai /imdb.\n\n\
         Sentuh salah satu tombol di bawah untuk memulai."
    )
}

/// One button per row into each submenu.
#[must_use]
pub fn settings_keyboard(owner: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback_button("🎛 Edit Layout", &ImdbCallback::LayoutMenu { owner })],
        vec![callback_button("🧩 Custom Layout", &ImdbCallback::CustomMenu { owner })],
        vec![callback_button("📝 IMDb By", &ImdbCallback::CreditMenu { owner })],
        vec![callback_button("🚩 Language", &ImdbCallback::LanguageMenu { owner })],
        vec![close_button(owner)],
    ])
}

/// Caption of the layout editor.
#[must_use]
pub fn layout_caption(custom_active: bool) -> String {
    let mut text =
        String::from("Silahkan edit layout IMDb anda, tekan reset untuk kembali ke default.");
    if custom_active {
        text.push_str(
            "\n\n⚠️ Custom template sedang aktif jadi pengaturan ini akan \
             diabaikan sampai template manual dihapus.",
        );
    }
    text
}

/// Toggle buttons two per row, then reset, back and close.
#[must_use]
pub fn layout_keyboard(owner: i64, layout: &Layout) -> InlineKeyboardMarkup {
    let toggles: Vec<InlineKeyboardButton> = layout
        .iter()
        .map(|(field, enabled)| {
            let status = if enabled { "✅" } else { "🚫" };
            callback_button(
                &format!("{status} {}", field.menu_label()),
                &ImdbCallback::LayoutToggle {
                    field: field.key().to_string(),
                    owner,
                },
            )
        })
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = toggles.chunks(2).map(<[_]>::to_vec).collect();
    rows.push(vec![
        callback_button("🔁 Reset", &ImdbCallback::LayoutReset { owner }),
        callback_button("⬅️ Back", &ImdbCallback::Settings { owner }),
    ]);
    rows.push(vec![close_button(owner)]);
    InlineKeyboardMarkup::new(rows)
}

/// Short answer after a toggle.
#[must_use]
pub fn layout_toggled(label: &str, enabled: bool) -> String {
    format!("{label} → {}", if enabled { "Aktif" } else { "Nonaktif" })
}

fn back_and_close(owner: i64) -> Vec<InlineKeyboardButton> {
    vec![
        callback_button("⬅️ Back", &ImdbCallback::Settings { owner }),
        close_button(owner),
    ]
}

/// Caption of the custom template menu.
#[must_use]
pub fn custom_menu_caption(active: bool) -> String {
    let status = if active { "Aktif ✅" } else { "Belum diatur ❌" };
    format!(
        "<b>Custom Layout IMDb</b>\n\
         Status: <b>{status}</b>\n\n\
         • Pakai <code>/imdbtemplate set</code> lalu balas pesan yang berisi \
         template HTML kamu atau tulis templatenya setelah perintah.\n\
         • Hapus dengan <code>/imdbtemplate remove</code>.\n\
         • Format tombol: <code>[Label](https://contoh.com)</code>.\n\n\
         Catatan: ketika template aktif, pengaturan layout bawaan diabaikan."
    )
}

/// Remove button only when a template is stored.
#[must_use]
pub fn custom_menu_keyboard(owner: i64, active: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if active {
        rows.push(vec![callback_button(
            "🗑 Hapus Template",
            &ImdbCallback::CustomRemove { owner },
        )]);
    }
    rows.push(back_and_close(owner));
    InlineKeyboardMarkup::new(rows)
}

/// Caption of the credit line menu.
#[must_use]
pub fn credit_menu_caption(current: Option<&str>) -> String {
    let status = current.map_or_else(
        || "Belum diatur ❌".to_string(),
        |value| format!("Aktif ✅ (<code>{}</code>)", html_escape::encode_text(value)),
    );
    format!(
        "<b>Pengaturan IMDb By</b>\n\
         Status: {status}\n\n\
         <b>Cara pakai:</b>\n\
         • Kirim <code>/imdbby @usernamekamu</code> atau teks lain.\n\
         • Atau balas pesan berisi teks lalu kirim <code>/imdbby</code>.\n\
         • Gunakan <code>/imdbby reset</code> untuk kembali ke default bot.\n\n\
         Teks ini akan menggantikan label \"IMDb by\" di hasil pencarian."
    )
}

/// Reset button only when an override is stored.
#[must_use]
pub fn credit_menu_keyboard(owner: i64, active: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if active {
        rows.push(vec![callback_button(
            "🔁 Reset ke Default",
            &ImdbCallback::CreditReset { owner },
        )]);
    }
    rows.push(back_and_close(owner));
    InlineKeyboardMarkup::new(rows)
}

/// Caption of the language menu
pub const LANGUAGE_MENU: &str = "<i>Please select available language below..</i>";

/// Language buttons, plus removal when a record exists.
#[must_use]
pub fn language_menu_keyboard(owner: i64, has_record: bool) -> InlineKeyboardMarkup {
    let set = |lang| ImdbCallback::SetLanguage {
        choice: LanguageChoice::Set(lang),
        owner,
    };
    let mut rows = vec![vec![
        callback_button("🇺🇸 English", &set(Language::English)),
        callback_button("🇮🇩 Indonesia", &set(Language::Indonesian)),
    ]];
    if has_record {
        rows.push(vec![callback_button(
            "🗑 Remove UserSetting",
            &ImdbCallback::SetLanguage {
                choice: LanguageChoice::Remove,
                owner,
            },
        )]);
    }
    rows.push(vec![close_button(owner)]);
    InlineKeyboardMarkup::new(rows)
}

/// Alert when the chosen language is already the default.
#[must_use]
pub fn language_already_set(lang: Language) -> String {
    format!("⚠️ Your Setting Already in ({})!", lang.callback_code())
}

/// Caption after a language menu action.
#[must_use]
pub const fn language_changed(choice: LanguageChoice) -> &'static str {
    match choice {
        LanguageChoice::Set(Language::English) => {
            "Language interface for IMDB has been changed to English."
        }
        LanguageChoice::Set(Language::Indonesian) => {
            "Bahasa tampilan IMDB sudah diubah ke Indonesia."
        }
        LanguageChoice::Remove => "UserSetting for IMDB has been deleted from database.",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command replies
// ─────────────────────────────────────────────────────────────────────────────

/// `/imdbtemplate` guide with the placeholder list.
#[must_use]
pub fn template_instructions(active: bool) -> String {
    let status = if active { "Aktif ✅" } else { "Belum diatur ❌" };
    let placeholders: Vec<String> = PLACEHOLDER_HELP
        .iter()
        .map(|(key, desc)| format!("• <code>{{{key}}}</code> - {desc}"))
        .collect();
    format!(
        "<b>Custom Layout IMDb</b>\n\
         Status: <b>{status}</b>\n\n\
         <b>Perintah:</b>\n\
         • <code>/imdbtemplate set</code> + template di pesan yang sama.\n\
         • Atau balas pesan berisi template dengan <code>/imdbtemplate set</code>.\n\
         • <code>/imdbtemplate remove</code> untuk menghapus.\n\
         • <code>/imdbtemplate show</code> untuk melihat template.\n\
         • Tombol dapat dibuat dengan format <code>[Label](https://contoh.com)</code>.\n\n\
         <b>Placeholder:</b>\n\
         {}\n\
         • <code>{{nama_placeholder_html}}</code> - versi aman HTML \
         (otomatis tersedia untuk setiap placeholder teks).\n\
         Contoh penggunaan: <code>&lt;blockquote&gt;{{plot_html}}&lt;/blockquote&gt;</code>\n\
         • Format teks didukung: <code>{{title!r}}</code> (dengan tanda kutip), \
         <code>{{rating_value:&gt;4}}</code> (lebar dan rata), <code>{{plot:.200}}</code> (potong).",
        placeholders.join("\n")
    )
}

/// Stored template, escaped for display.
#[must_use]
pub fn template_show(template: &str) -> String {
    format!(
        "<b>Template Saat Ini:</b>\n<code>{}</code>",
        html_escape::encode_text(template)
    )
}

/// `/imdbby` without a value.
#[must_use]
pub fn credit_usage(current: Option<&str>) -> String {
    let current = current.map_or_else(
        || "Default bot username".to_string(),
        |value| format!("<code>{}</code>", html_escape::encode_text(value)),
    );
    format!(
        "<b>Pengaturan IMDb By</b>\n\
         Saat ini: {current}\n\n\
         Kirim <code>/imdbby @usernamekamu</code> atau balas pesan berisi teks \
         untuk mengganti label. Gunakan <code>/imdbby reset</code> untuk \
         kembali ke default."
    )
}

/// Credit line stored.
#[must_use]
pub fn credit_saved(value: &str) -> String {
    format!(
        "IMDb by diganti menjadi: <code>{}</code>",
        html_escape::encode_text(value)
    )
}
