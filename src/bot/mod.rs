/// IMDb callback data
pub mod callbacks;
/// General command handlers
pub mod handlers;
/// IMDb command and callback handlers
pub mod imdb_handlers;
/// Retrying sends and result delivery
pub mod resilient;
/// Texts and keyboards
pub mod views;
