//! Callback data of the IMDb keyboards.
//!
//! Every payload is `#`-separated and ends with (or carries) the id of the
//! user who may press the button.

use crate::imdb::Language;
use std::fmt;

/// Telegram's limit on callback data
pub const CALLBACK_DATA_LIMIT: usize = 64;

/// Target of the language menu buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageChoice {
    /// Store a default language
    Set(Language),
    /// Drop the whole preference record
    Remove,
}

/// A decoded IMDb button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImdbCallback {
    /// Language picked for a pending query
    Search {
        /// Result language
        lang: Language,
        /// Key of the pending query
        key: String,
        /// Allowed user
        owner: i64,
    },
    /// Title picked from a result list
    Result {
        /// Result language
        lang: Language,
        /// Allowed user
        owner: i64,
        /// Numeric title id
        title_id: String,
    },
    /// Open the language menu
    LanguageMenu {
        /// Allowed user
        owner: i64,
    },
    /// Set or remove the default language
    SetLanguage {
        /// Selected action
        choice: LanguageChoice,
        /// Allowed user
        owner: i64,
    },
    /// Settings main menu
    Settings {
        /// Allowed user
        owner: i64,
    },
    /// Layout editor
    LayoutMenu {
        /// Allowed user
        owner: i64,
    },
    /// Flip one layout field
    LayoutToggle {
        /// Field key as sent, validated by the preference store
        field: String,
        /// Allowed user
        owner: i64,
    },
    /// Restore the default layout
    LayoutReset {
        /// Allowed user
        owner: i64,
    },
    /// Custom template menu
    CustomMenu {
        /// Allowed user
        owner: i64,
    },
    /// Delete the custom template
    CustomRemove {
        /// Allowed user
        owner: i64,
    },
    /// Credit line menu
    CreditMenu {
        /// Allowed user
        owner: i64,
    },
    /// Reset the credit line to the bot handle
    CreditReset {
        /// Allowed user
        owner: i64,
    },
    /// Delete the menu message
    Close {
        /// Allowed user
        owner: i64,
    },
}

impl ImdbCallback {
    /// Decode callback data. Unknown or malformed payloads yield `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split('#').collect();
        let owner = |raw: &str| raw.parse::<i64>().ok();

        let callback = match parts.as_slice() {
            ["imdbcari", lang, key, uid] => Self::Search {
                lang: Language::from_callback_code(lang)?,
                key: (*key).to_string(),
                owner: owner(uid)?,
            },
            ["imdbres_en", uid, id] => Self::Result {
                lang: Language::English,
                owner: owner(uid)?,
                title_id: (*id).to_string(),
            },
            ["imdbres_id", uid, id] => Self::Result {
                lang: Language::Indonesian,
                owner: owner(uid)?,
                title_id: (*id).to_string(),
            },
            ["imdbset", uid] => Self::LanguageMenu { owner: owner(uid)? },
            ["setimdb", "rm", uid] => Self::SetLanguage {
                choice: LanguageChoice::Remove,
                owner: owner(uid)?,
            },
            ["setimdb", lang, uid] => Self::SetLanguage {
                choice: LanguageChoice::Set(Language::from_callback_code(lang)?),
                owner: owner(uid)?,
            },
            ["imdbsettings", uid] => Self::Settings { owner: owner(uid)? },
            ["imdbslayout", uid] => Self::LayoutMenu { owner: owner(uid)? },
            ["imdblayouttoggle", field, uid] => Self::LayoutToggle {
                field: (*field).to_string(),
                owner: owner(uid)?,
            },
            ["imdblayoutreset", uid] => Self::LayoutReset { owner: owner(uid)? },
            ["imdbcustom", uid] => Self::CustomMenu { owner: owner(uid)? },
            ["imdbcustomrm", uid] => Self::CustomRemove { owner: owner(uid)? },
            ["imdbbycfg", uid] => Self::CreditMenu { owner: owner(uid)? },
            ["imdbbyreset", uid] => Self::CreditReset { owner: owner(uid)? },
            ["close", uid] => Self::Close { owner: owner(uid)? },
            _ => return None,
        };
        Some(callback)
    }

    /// User allowed to press the button.
    #[must_use]
    pub const fn owner(&self) -> i64 {
        match self {
            Self::Search { owner, .. }
            | Self::Result { owner, .. }
            | Self::LanguageMenu { owner }
            | Self::SetLanguage { owner, .. }
            | Self::Settings { owner }
            | Self::LayoutMenu { owner }
            | Self::LayoutToggle { owner, .. }
            | Self::LayoutReset { owner }
            | Self::CustomMenu { owner }
            | Self::CustomRemove { owner }
            | Self::CreditMenu { owner }
            | Self::CreditReset { owner }
            | Self::Close { owner } => *owner,
        }
    }
}

impl fmt::Display for ImdbCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search { lang, key, owner } => {
                write!(f, "imdbcari#{}#{key}#{owner}", lang.callback_code())
            }
            Self::Result {
                lang,
                owner,
                title_id,
            } => {
                let prefix = match lang {
                    Language::English => "imdbres_en",
                    Language::Indonesian => "imdbres_id",
                };
                write!(f, "{prefix}#{owner}#{title_id}")
            }
            Self::LanguageMenu { owner } => write!(f, "imdbset#{owner}"),
            Self::SetLanguage { choice, owner } => {
                let code = match choice {
                    LanguageChoice::Set(lang) => lang.callback_code(),
                    LanguageChoice::Remove => "rm",
                };
                write!(f, "setimdb#{code}#{owner}")
            }
            Self::Settings { owner } => write!(f, "imdbsettings#{owner}"),
            Self::LayoutMenu { owner } => write!(f, "imdbslayout#{owner}"),
            Self::LayoutToggle { field, owner } => write!(f, "imdblayouttoggle#{field}#{owner}"),
            Self::LayoutReset { owner } => write!(f, "imdblayoutreset#{owner}"),
            Self::CustomMenu { owner } => write!(f, "imdbcustom#{owner}"),
            Self::CustomRemove { owner } => write!(f, "imdbcustomrm#{owner}"),
            Self::CreditMenu { owner } => write!(f, "imdbbycfg#{owner}"),
            Self::CreditReset { owner } => write!(f, "imdbbyreset#{owner}"),
            Self::Close { owner } => write!(f, "close#{owner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imdb::LayoutField;

    #[test]
    fn test_parse_known_payloads() {
        assert_eq!(
            ImdbCallback::parse("imdbcari#ind#a1b2c3d4#42"),
            Some(ImdbCallback::Search {
                lang: Language::Indonesian,
                key: "a1b2c3d4".to_string(),
                owner: 42,
            })
        );
        assert_eq!(
            ImdbCallback::parse("imdbres_en#42#0111161"),
            Some(ImdbCallback::Result {
                lang: Language::English,
                owner: 42,
                title_id: "0111161".to_string(),
            })
        );
        assert_eq!(
            ImdbCallback::parse("setimdb#rm#42"),
            Some(ImdbCallback::SetLanguage {
                choice: LanguageChoice::Remove,
                owner: 42,
            })
        );
        assert_eq!(
            ImdbCallback::parse("imdblayouttoggle#cast_info#42"),
            Some(ImdbCallback::LayoutToggle {
                field: "cast_info".to_string(),
                owner: 42,
            })
        );
    }

    #[test]
    fn test_reject_malformed_payloads() {
        for data in [
            "",
            "close",
            "close#abc",
            "imdbcari#fr#key#42",
            "imdbres_en#42",
            "setimdb#xx#42",
            "retry_no_loop",
        ] {
            assert_eq!(ImdbCallback::parse(data), None, "{data}");
        }
    }

    #[test]
    fn test_encoded_payloads_decode_and_fit() {
        let owner = 7_123_456_789;
        let callbacks = [
            ImdbCallback::Search {
                lang: Language::English,
                key: "deadbeef".to_string(),
                owner,
            },
            ImdbCallback::Result {
                lang: Language::Indonesian,
                owner,
                title_id: "15398776".to_string(),
            },
            ImdbCallback::SetLanguage {
                choice: LanguageChoice::Set(Language::Indonesian),
                owner,
            },
            ImdbCallback::LayoutToggle {
                field: LayoutField::ButtonOpenImdb.key().to_string(),
                owner,
            },
            ImdbCallback::CreditReset { owner },
            ImdbCallback::Close { owner },
        ];

        for callback in callbacks {
            let data = callback.to_string();
            assert!(data.len() <= CALLBACK_DATA_LIMIT, "{data}");
            assert_eq!(ImdbCallback::parse(&data).as_ref(), Some(&callback));
            assert_eq!(callback.owner(), owner);
        }
    }
}
