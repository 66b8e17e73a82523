//! Texts and keyboards shown by the bot.

/// IMDb search, result and settings menus
pub mod imdb;
