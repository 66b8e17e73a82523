//! Per-user IMDb display preferences.
//!
//! Every write is a read-modify-write of the whole user document. A write
//! that touches layout, template or credit creates the document with the
//! English default language when it does not exist yet.

use crate::config::{IMDB_CREDIT_MAX_CHARS, IMDB_TEMPLATE_MAX_CHARS};
use crate::imdb::layout::{Language, Layout, LayoutField};
use crate::storage::{ImdbPreference, StorageError, StorageProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors of preference mutations
#[derive(Error, Debug)]
pub enum PreferenceError {
    /// Toggle of a key outside the 16 known layout fields
    #[error("unknown layout field: {0}")]
    UnknownField(String),
    /// Value exceeds its character limit
    #[error("value too long (max {limit} characters)")]
    TooLong {
        /// Character limit
        limit: usize,
    },
    /// Blank value where text is required
    #[error("value is empty")]
    Empty,
    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Preference operations backed by a [`StorageProvider`].
#[derive(Clone)]
pub struct PreferenceStore {
    storage: Arc<dyn StorageProvider>,
}

impl PreferenceStore {
    /// Wrap a storage provider.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    async fn load(&self, user_id: i64) -> Result<Option<ImdbPreference>, StorageError> {
        self.storage.get_imdb_preference(user_id).await
    }

    async fn upsert<F>(&self, user_id: i64, apply: F) -> Result<ImdbPreference, StorageError>
    where
        F: FnOnce(&mut ImdbPreference) + Send,
    {
        let mut preference = self
            .load(user_id)
            .await?
            .unwrap_or_else(|| ImdbPreference::new(user_id));
        apply(&mut preference);
        self.storage.save_imdb_preference(&preference).await?;
        Ok(preference)
    }

    /// Stored layout merged onto the all-visible default.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn get_layout(&self, user_id: i64) -> Result<Layout, StorageError> {
        Ok(self
            .load(user_id)
            .await?
            .map(|p| p.layout)
            .unwrap_or_default())
    }

    /// Custom caption template, if one is saved.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn get_custom_template(&self, user_id: i64) -> Result<Option<String>, StorageError> {
        Ok(self.load(user_id).await?.and_then(|p| p.custom_layout))
    }

    /// Credit line override, if one is saved.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn get_credit_override(&self, user_id: i64) -> Result<Option<String>, StorageError> {
        Ok(self.load(user_id).await?.and_then(|p| p.imdb_by))
    }

    /// Default result language, if the user picked one.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn get_language(&self, user_id: i64) -> Result<Option<Language>, StorageError> {
        Ok(self.load(user_id).await?.and_then(|p| p.lang))
    }

    /// Replace the layout. Unknown keys are dropped, missing keys become visible.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn set_layout<'a, I>(&self, user_id: i64, overrides: I) -> Result<Layout, StorageError>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let layout = Layout::merged(overrides);
        self.upsert(user_id, |p| p.layout = layout).await?;
        debug!("Layout replaced for user {user_id}");
        Ok(layout)
    }

    /// Flip one layout field and return the new layout.
    ///
    /// # Errors
    ///
    /// Returns `PreferenceError::UnknownField` for keys outside the layout,
    /// or a storage error.
    pub async fn toggle_layout(
        &self,
        user_id: i64,
        key: &str,
    ) -> Result<(LayoutField, Layout), PreferenceError> {
        let field =
            LayoutField::from_key(key).ok_or_else(|| PreferenceError::UnknownField(key.into()))?;
        let preference = self
            .upsert(user_id, |p| {
                p.layout.toggle(field);
            })
            .await?;
        debug!(
            "Layout field {field} set to {} for user {user_id}",
            preference.layout.is_enabled(field)
        );
        Ok((field, preference.layout))
    }

    /// Make every section visible again.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn reset_layout(&self, user_id: i64) -> Result<Layout, StorageError> {
        self.upsert(user_id, |p| p.layout = Layout::default())
            .await
            .map(|p| p.layout)
    }

    /// Save a custom caption template.
    ///
    /// # Errors
    ///
    /// Returns an error for blank or oversized templates, or a storage error.
    pub async fn set_custom_template(
        &self,
        user_id: i64,
        template: &str,
    ) -> Result<(), PreferenceError> {
        let template = checked_text(template, IMDB_TEMPLATE_MAX_CHARS)?;
        self.upsert(user_id, |p| p.custom_layout = Some(template))
            .await?;
        info!("Custom IMDb template saved for user {user_id}");
        Ok(())
    }

    /// Drop the custom template. A user without a document stays without one.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn clear_custom_template(&self, user_id: i64) -> Result<(), StorageError> {
        self.clear_with(user_id, |p| p.custom_layout.take().is_some())
            .await
    }

    /// Save the credit line override.
    ///
    /// # Errors
    ///
    /// Returns an error for blank or oversized text, or a storage error.
    pub async fn set_credit_override(&self, user_id: i64, text: &str) -> Result<(), PreferenceError> {
        let text = checked_text(text, IMDB_CREDIT_MAX_CHARS)?;
        self.upsert(user_id, |p| p.imdb_by = Some(text)).await?;
        Ok(())
    }

    /// Drop the credit line override.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn clear_credit_override(&self, user_id: i64) -> Result<(), StorageError> {
        self.clear_with(user_id, |p| p.imdb_by.take().is_some()).await
    }

    /// Set the default result language.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn set_language(&self, user_id: i64, lang: Language) -> Result<(), StorageError> {
        self.upsert(user_id, |p| p.lang = Some(lang)).await?;
        info!("IMDb language of user {user_id} set to {}", lang.code());
        Ok(())
    }

    /// Delete the whole preference document.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn remove_preferences(&self, user_id: i64) -> Result<(), StorageError> {
        self.storage.delete_imdb_preference(user_id).await?;
        info!("IMDb preferences removed for user {user_id}");
        Ok(())
    }

    async fn clear_with<F>(&self, user_id: i64, clear: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut ImdbPreference) -> bool + Send,
    {
        let Some(mut preference) = self.load(user_id).await? else {
            return Ok(());
        };
        if clear(&mut preference) {
            self.storage.save_imdb_preference(&preference).await?;
        }
        Ok(())
    }
}

fn checked_text(value: &str, limit: usize) -> Result<String, PreferenceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PreferenceError::Empty);
    }
    if value.chars().count() > limit {
        return Err(PreferenceError::TooLong { limit });
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStorageProvider;
    use crate::testing::{mock_storage_noop, InMemoryStorage};

    fn store() -> (Arc<InMemoryStorage>, PreferenceStore) {
        let storage = Arc::new(InMemoryStorage::default());
        (storage.clone(), PreferenceStore::new(storage))
    }

    #[tokio::test]
    async fn test_set_layout_keeps_sixteen_keys() -> Result<(), Box<dyn std::error::Error>> {
        let (storage, prefs) = store();
        let layout = prefs.set_layout(5, [("title", false)]).await?;

        let map = layout.to_map();
        assert_eq!(map.len(), 16);
        assert_eq!(map.get("title"), Some(&false));
        assert_eq!(map.values().filter(|v| **v).count(), 15);

        let saved = storage.preference(5).await;
        assert_eq!(saved.map(|p| p.layout), Some(layout));
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_value() -> Result<(), Box<dyn std::error::Error>> {
        let (_, prefs) = store();
        let before = prefs.get_layout(9).await?;

        let (field, once) = prefs.toggle_layout(9, "plot").await?;
        assert_eq!(field, LayoutField::Plot);
        assert!(!once.is_enabled(LayoutField::Plot));

        let (_, twice) = prefs.toggle_layout(9, "plot").await?;
        assert_eq!(twice, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_user_reads_defaults() -> Result<(), StorageError> {
        let prefs = PreferenceStore::new(Arc::new(mock_storage_noop()));
        assert_eq!(prefs.get_layout(77).await?, Layout::default());
        assert_eq!(prefs.get_language(77).await?, None);
        assert_eq!(prefs.get_custom_template(77).await?, None);
        assert_eq!(prefs.get_credit_override(77).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_unknown_field() {
        let (storage, prefs) = store();
        let result = prefs.toggle_layout(1, "poster").await;
        assert!(matches!(result, Err(PreferenceError::UnknownField(ref k)) if k == "poster"));
        assert!(storage.preference(1).await.is_none());
    }

    #[tokio::test]
    async fn test_reset_layout_is_all_visible() -> Result<(), Box<dyn std::error::Error>> {
        let (_, prefs) = store();
        prefs
            .set_layout(2, [("title", false), ("plot", false), ("awards", false)])
            .await?;
        let layout = prefs.reset_layout(2).await?;
        assert_eq!(layout, Layout::default());
        assert_eq!(prefs.get_layout(2).await?, Layout::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_layout_write_creates_english_record() -> Result<(), Box<dyn std::error::Error>> {
        let (_, prefs) = store();
        prefs.reset_layout(3).await?;
        assert_eq!(prefs.get_language(3).await?, Some(Language::English));
        Ok(())
    }

    #[tokio::test]
    async fn test_template_limits() -> Result<(), Box<dyn std::error::Error>> {
        let (_, prefs) = store();
        let long = "x".repeat(IMDB_TEMPLATE_MAX_CHARS + 1);
        assert!(matches!(
            prefs.set_custom_template(4, &long).await,
            Err(PreferenceError::TooLong { .. })
        ));
        assert!(matches!(
            prefs.set_custom_template(4, "   ").await,
            Err(PreferenceError::Empty)
        ));

        prefs.set_custom_template(4, "  {title_link}  ").await?;
        assert_eq!(
            prefs.get_custom_template(4).await?,
            Some("{title_link}".to_string())
        );

        prefs.clear_custom_template(4).await?;
        assert_eq!(prefs.get_custom_template(4).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_without_record_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let mut mock = MockStorageProvider::new();
        mock.expect_get_imdb_preference().returning(|_| Ok(None));
        mock.expect_save_imdb_preference().never();

        let prefs = PreferenceStore::new(Arc::new(mock));
        prefs.clear_credit_override(8).await?;
        prefs.clear_custom_template(8).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_preferences_drops_document() -> Result<(), Box<dyn std::error::Error>> {
        let (storage, prefs) = store();
        prefs.set_language(6, Language::Indonesian).await?;
        prefs.set_credit_override(6, "@katy").await?;
        assert_eq!(prefs.get_credit_override(6).await?, Some("@katy".to_string()));

        prefs.remove_preferences(6).await?;
        assert!(storage.preference(6).await.is_none());
        assert_eq!(prefs.get_language(6).await?, None);
        Ok(())
    }
}
