//! Storage layer for user preferences and scheduled kicks
//!
//! Provides a persistent storage implementation using Cloudflare R2 / AWS S3,
//! one JSON document per key.

use crate::config::Settings;
use crate::imdb::layout::{Language, Layout};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error retrieving object from S3
    #[error("S3 Get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// Error putting or deleting an object in S3
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// Error listing objects in S3
    #[error("S3 list error: {0}")]
    S3List(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration error (missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// IMDb display preferences of one user, in the persisted document shape.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImdbPreference {
    /// Telegram user id
    pub user_id: i64,
    /// Default result language, if the user picked one
    #[serde(default)]
    pub lang: Option<Language>,
    /// Section visibility
    #[serde(default)]
    pub layout: Layout,
    /// Custom HTML caption template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_layout: Option<String>,
    /// Credit line override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_by: Option<String>,
}

impl ImdbPreference {
    /// Record created implicitly by a layout, template or credit write.
    #[must_use]
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            lang: Some(Language::English),
            layout: Layout::default(),
            custom_layout: None,
            imdb_by: None,
        }
    }
}

/// A member scheduled for removal from a group.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct KickRecord {
    /// Group chat id
    pub chat_id: i64,
    /// Member to remove
    pub user_id: i64,
    /// Moment the member becomes due for removal
    pub kick_time: DateTime<Utc>,
}

/// Interface for storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Load the IMDb preference document of a user
    async fn get_imdb_preference(
        &self,
        user_id: i64,
    ) -> Result<Option<ImdbPreference>, StorageError>;
    /// Replace the IMDb preference document of a user
    async fn save_imdb_preference(&self, preference: &ImdbPreference) -> Result<(), StorageError>;
    /// Remove the IMDb preference document of a user
    async fn delete_imdb_preference(&self, user_id: i64) -> Result<(), StorageError>;
    /// Schedule a kick
    async fn add_kick(&self, record: &KickRecord) -> Result<(), StorageError>;
    /// Remove and return every kick due at `now`
    async fn take_due_kicks(&self, now: DateTime<Utc>) -> Result<Vec<KickRecord>, StorageError>;
    /// Check connection to storage
    async fn check_connection(&self) -> Result<(), String>;
}

/// R2-backed storage implementation
pub struct R2Storage {
    client: Client,
    bucket: String,
    cache: Cache<String, Arc<Vec<u8>>>,
}

impl R2Storage {
    /// Create a new R2 storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &Settings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(60 * 60)) // 1 hour
            .time_to_idle(Duration::from_secs(30 * 60)) // 30 minutes
            .build();

        Ok(Self {
            client,
            bucket: bucket.clone(),
            cache,
        })
    }

    /// Save data as JSON to R2
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization or S3 upload fails.
    pub async fn save_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let body_bytes = serde_json::to_vec_pretty(data)?;

        // Write-Through: Update cache immediately
        self.cache
            .insert(key.to_string(), Arc::new(body_bytes.clone()))
            .await;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body_bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        Ok(())
    }

    /// Load data from JSON in R2
    ///
    /// # Errors
    ///
    /// Returns an error if S3 download or JSON deserialization fails.
    pub async fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        // Read-Through: Check cache first
        if let Some(cached_data) = self.cache.get(key).await {
            match serde_json::from_slice(&cached_data) {
                Ok(data) => return Ok(Some(data)),
                Err(e) => {
                    warn!("Cache deserialization failed for {}: {}", key, e);
                    self.cache.invalidate(key).await;
                }
            }
        }

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
                    .into_bytes();

                // Read-Through: Populate cache on miss
                self.cache
                    .insert(key.to_string(), Arc::new(data.to_vec()))
                    .await;

                let json_data = serde_json::from_slice(&data)?;
                Ok(Some(json_data))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }

    /// Delete object from R2
    ///
    /// # Errors
    ///
    /// Returns an error if S3 deletion fails.
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.cache.invalidate(key).await;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        Ok(())
    }

    /// List every key under `prefix`, following continuation tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if an S3 list request fails.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::S3List(e.to_string()))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl StorageProvider for R2Storage {
    async fn get_imdb_preference(
        &self,
        user_id: i64,
    ) -> Result<Option<ImdbPreference>, StorageError> {
        self.load_json(&imdb_preference_key(user_id)).await
    }

    async fn save_imdb_preference(&self, preference: &ImdbPreference) -> Result<(), StorageError> {
        self.save_json(&imdb_preference_key(preference.user_id), preference)
            .await
    }

    async fn delete_imdb_preference(&self, user_id: i64) -> Result<(), StorageError> {
        self.delete_object(&imdb_preference_key(user_id)).await
    }

    async fn add_kick(&self, record: &KickRecord) -> Result<(), StorageError> {
        self.save_json(&kick_record_key(record), record).await
    }

    async fn take_due_kicks(&self, now: DateTime<Utc>) -> Result<Vec<KickRecord>, StorageError> {
        let keys = self.list_keys(KICK_PREFIX).await?;
        let due = collect_due_kicks(self, keys, now).await;
        if !due.is_empty() {
            debug!("Collected {} due kick records", due.len());
        }
        Ok(due)
    }

    async fn check_connection(&self) -> Result<(), String> {
        match self.client.list_buckets().send().await {
            Ok(_) => {
                info!("Successfully connected to R2 storage.");
                Ok(())
            }
            Err(e) => {
                let err_msg = format!("R2 connectivity test failed: {e:#?}");
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }
}

const KICK_PREFIX: &str = "auto_kick/";

/// Per-key access to stored kick records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
trait KickObjects: Send + Sync {
    async fn load_kick(&self, key: &str) -> Result<Option<KickRecord>, StorageError>;
    async fn delete_kick(&self, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl KickObjects for R2Storage {
    async fn load_kick(&self, key: &str) -> Result<Option<KickRecord>, StorageError> {
        self.load_json(key).await
    }

    async fn delete_kick(&self, key: &str) -> Result<(), StorageError> {
        self.delete_object(key).await
    }
}

/// Take every record under `keys` that is due at `now`.
///
/// A failing key is logged and skipped so it cannot hide the others.
/// Undecodable records are deleted; a record is only returned once its
/// object is gone, so a kick never runs twice.
async fn collect_due_kicks(
    objects: &dyn KickObjects,
    keys: Vec<String>,
    now: DateTime<Utc>,
) -> Vec<KickRecord> {
    let mut due = Vec::new();

    for key in keys {
        // Keys carry their due time, so future kicks are skipped unread
        if kick_due_secs(&key).is_some_and(|secs| secs > now.timestamp()) {
            continue;
        }

        let record = match objects.load_kick(&key).await {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(StorageError::Json(e)) => {
                warn!("Dropping corrupt kick record {key}: {e}");
                if let Err(e) = objects.delete_kick(&key).await {
                    warn!("Failed to delete corrupt kick record {key}: {e}");
                }
                continue;
            }
            Err(e) => {
                warn!("Failed to load kick record {key}: {e}");
                continue;
            }
        };
        if record.kick_time > now {
            continue;
        }

        // Delete-after-read: a failed kick is never retried
        match objects.delete_kick(&key).await {
            Ok(()) => due.push(record),
            Err(e) => warn!("Failed to take kick record {key}, leaving it for later: {e}"),
        }
    }
    due
}

/// Returns the R2 key for a user's IMDb preference document
#[must_use]
pub fn imdb_preference_key(user_id: i64) -> String {
    format!("imdb/users/{user_id}.json")
}

/// Returns the R2 key for a scheduled kick.
///
/// The due time leads the key (zero padded seconds) so a listing is ordered
/// by due time and can be filtered without downloading each record.
#[must_use]
pub fn kick_record_key(record: &KickRecord) -> String {
    format!(
        "{KICK_PREFIX}{:020}_{}_{}.json",
        record.kick_time.timestamp().max(0),
        record.chat_id,
        record.user_id
    )
}

fn kick_due_secs(key: &str) -> Option<i64> {
    key.strip_prefix(KICK_PREFIX)?
        .split('_')
        .next()?
        .parse()
        .ok()
}
