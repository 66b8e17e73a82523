//! Shared helpers for caption text, URL buttons and Telegram retries.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// A URL button rendered under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    /// Button text
    pub label: String,
    /// Target url, not yet validated
    pub url: String,
}

impl LinkButton {
    /// Build a button from anything string-like.
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Arrange buttons two per row, keeping their order.
///
/// # Examples
///
/// ```
/// use katy_bot::utils::{button_rows, LinkButton};
/// let rows = button_rows(vec![
///     LinkButton::new("A", "https://a.example"),
///     LinkButton::new("B", "https://b.example"),
///     LinkButton::new("C", "https://c.example"),
/// ]);
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1][0].label, "C");
/// ```
#[must_use]
pub fn button_rows(buttons: Vec<LinkButton>) -> Vec<Vec<LinkButton>> {
    let mut rows = Vec::with_capacity(buttons.len().div_ceil(2));
    let mut iter = buttons.into_iter();
    while let Some(first) = iter.next() {
        let mut row = vec![first];
        row.extend(iter.next());
        rows.push(row);
    }
    rows
}

/// Turn a display name into a Telegram hashtag (`Sci-Fi` -> `#Sci_Fi`).
#[must_use]
pub fn hashtag(name: &str) -> String {
    format!("#{}", name.trim().replace([' ', '-'], "_"))
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use katy_bot::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a Telegram API call with exponential backoff and jitter.
///
/// Used for plain sends and edits that may fail on transient network
/// errors. Delays and the attempt count come from `config.rs`.
///
/// # Errors
///
/// Returns the last error once every attempt has failed.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_button_rows_pairs_in_order() {
        let buttons: Vec<LinkButton> = (1..=5)
            .map(|i| LinkButton::new(i.to_string(), format!("https://x.example/{i}")))
            .collect();
        let rows = button_rows(buttons);

        let labels: Vec<Vec<&str>> = rows
            .iter()
            .map(|row| row.iter().map(|b| b.label.as_str()).collect())
            .collect();
        assert_eq!(labels, vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]);
        assert!(button_rows(Vec::new()).is_empty());
    }

    #[test]
    fn test_hashtag() {
        assert_eq!(hashtag("Sci-Fi"), "#Sci_Fi");
        assert_eq!(hashtag("United States"), "#United_States");
        assert_eq!(hashtag(" Drama "), "#Drama");
    }

    #[tokio::test]
    async fn test_retry_gives_up_with_last_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry_telegram_operation(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(anyhow::anyhow!("attempt {n}")) }
        })
        .await;

        assert!(result.is_err());
        assert!(calls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_retry_recovers() -> Result<()> {
        let calls = AtomicUsize::new(0);
        let value = retry_telegram_operation(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("transient"))
                } else {
                    Ok(n)
                }
            }
        })
        .await?;
        assert_eq!(value, 1);
        Ok(())
    }
}
