//! Scheduled removal of group members.
//!
//! `/auto_kick` stores a [`KickRecord`]; a background poller removes every
//! member whose time has come. Records are deleted when they are taken,
//! whether or not the removal succeeds.

use crate::config::AUTO_KICK_MAX_MINUTES;
use crate::storage::{KickRecord, StorageError, StorageProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::UserId;
use thiserror::Error;
use tracing::{debug, error, info};

/// Usage line shown for malformed arguments
pub const USAGE: &str = "Usage: /auto_kick <user_id> [minutes]";

/// Invalid `/auto_kick` arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KickArgsError {
    /// Wrong number of arguments or a non-numeric user id
    #[error("Usage: /auto_kick <user_id> [minutes]")]
    Usage,
    /// Delay outside `1..=AUTO_KICK_MAX_MINUTES`
    #[error("Minutes must be a whole number between 1 and {}.", AUTO_KICK_MAX_MINUTES)]
    InvalidMinutes,
}

/// Failure to schedule a kick.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// The due time cannot be represented
    #[error(transparent)]
    Args(#[from] KickArgsError),
    /// The record could not be written
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parsed `/auto_kick` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KickRequest {
    /// Member to remove
    pub user_id: i64,
    /// Delay in minutes
    pub minutes: i64,
}

/// Parse `<user_id> [minutes]`.
///
/// # Errors
///
/// Returns [`KickArgsError`] for anything but one or two numeric arguments.
pub fn parse_args(args: &str, default_minutes: i64) -> Result<KickRequest, KickArgsError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (user, minutes) = match parts.as_slice() {
        [user] => (*user, None),
        [user, minutes] => (*user, Some(*minutes)),
        _ => return Err(KickArgsError::Usage),
    };

    let user_id = user.parse::<i64>().map_err(|_| KickArgsError::Usage)?;
    let minutes = match minutes {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|m| (1..=AUTO_KICK_MAX_MINUTES).contains(m))
            .ok_or(KickArgsError::InvalidMinutes)?,
        None => default_minutes.clamp(1, AUTO_KICK_MAX_MINUTES),
    };
    Ok(KickRequest { user_id, minutes })
}

/// Confirmation sent after scheduling.
#[must_use]
pub fn confirmation(request: &KickRequest) -> String {
    format!(
        "User {} will be kicked in {} minutes.",
        request.user_id, request.minutes
    )
}

/// Store a kick for `chat_id` due `request.minutes` after `now`.
///
/// # Errors
///
/// Returns [`ScheduleError::Args`] when the due time overflows and
/// [`ScheduleError::Storage`] if the record cannot be written.
pub async fn schedule(
    storage: &dyn StorageProvider,
    chat_id: i64,
    request: KickRequest,
    now: DateTime<Utc>,
) -> Result<KickRecord, ScheduleError> {
    let kick_time = ChronoDuration::try_minutes(request.minutes)
        .and_then(|delay| now.checked_add_signed(delay))
        .ok_or(KickArgsError::InvalidMinutes)?;
    let record = KickRecord {
        chat_id,
        user_id: request.user_id,
        kick_time,
    };
    storage.add_kick(&record).await?;
    info!(
        "Scheduled kick of {} from {} at {}",
        record.user_id, record.chat_id, record.kick_time
    );
    Ok(record)
}

/// Removes a member from a chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModerator: Send + Sync {
    /// Remove `user_id` from `chat_id`, leaving them free to rejoin.
    async fn remove_member(&self, chat_id: i64, user_id: i64) -> anyhow::Result<()>;
}

#[async_trait]
impl ChatModerator for Bot {
    async fn remove_member(&self, chat_id: i64, user_id: i64) -> anyhow::Result<()> {
        let user = UserId(u64::try_from(user_id)?);
        self.ban_chat_member(ChatId(chat_id), user).await?;
        self.unban_chat_member(ChatId(chat_id), user).await?;
        Ok(())
    }
}

/// Execute every kick due at `now`. Returns how many succeeded.
pub async fn process_due(
    storage: &dyn StorageProvider,
    moderator: &dyn ChatModerator,
    now: DateTime<Utc>,
) -> usize {
    let due = match storage.take_due_kicks(now).await {
        Ok(due) => due,
        Err(e) => {
            error!("Failed to load due kicks: {e}");
            return 0;
        }
    };

    let mut kicked = 0;
    for record in due {
        match moderator.remove_member(record.chat_id, record.user_id).await {
            Ok(()) => {
                info!("Kicked {} from {}", record.user_id, record.chat_id);
                kicked += 1;
            }
            Err(e) => error!(
                "Failed to kick {} from {}: {e}",
                record.user_id, record.chat_id
            ),
        }
    }
    kicked
}

/// Poll for due kicks every `poll_secs` until the task is dropped.
pub async fn run_poller(
    storage: Arc<dyn StorageProvider>,
    moderator: Arc<dyn ChatModerator>,
    poll_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
    info!("Auto-kick poller started ({poll_secs}s)");
    loop {
        interval.tick().await;
        let kicked = process_due(storage.as_ref(), moderator.as_ref(), Utc::now()).await;
        if kicked > 0 {
            debug!("Auto-kick round removed {kicked} members");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStorageProvider;
    use crate::testing::InMemoryStorage;
    use chrono::TimeZone;

    fn may_first(hour: u32, minute: u32) -> DateTime<Utc> {
        let Some(time) = Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).single() else {
            panic!("invalid test time");
        };
        time
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            parse_args("42", 720),
            Ok(KickRequest {
                user_id: 42,
                minutes: 720
            })
        );
        assert_eq!(
            parse_args(" 42   15 ", 720),
            Ok(KickRequest {
                user_id: 42,
                minutes: 15
            })
        );
        assert_eq!(parse_args("", 720), Err(KickArgsError::Usage));
        assert_eq!(parse_args("1 2 3", 720), Err(KickArgsError::Usage));
        assert_eq!(parse_args("bob", 720), Err(KickArgsError::Usage));
        assert_eq!(parse_args("42 0", 720), Err(KickArgsError::InvalidMinutes));
        assert_eq!(parse_args("42 soon", 720), Err(KickArgsError::InvalidMinutes));
        assert_eq!(
            parse_args("42 9999999999999", 720),
            Err(KickArgsError::InvalidMinutes)
        );
        assert_eq!(
            parse_args("42 525601", 720),
            Err(KickArgsError::InvalidMinutes)
        );
        assert!(matches!(parse_args("42 525600", 720), Ok(r) if r.minutes == 525_600));
        assert!(matches!(parse_args("42", i64::MAX), Ok(r) if r.minutes == 525_600));
    }

    #[test]
    fn test_messages() {
        assert_eq!(KickArgsError::Usage.to_string(), USAGE);
        let request = KickRequest {
            user_id: 42,
            minutes: 15,
        };
        assert_eq!(confirmation(&request), "User 42 will be kicked in 15 minutes.");
    }

    #[tokio::test]
    async fn test_schedule_uses_minutes() -> Result<(), ScheduleError> {
        let storage = InMemoryStorage::default();
        let now = may_first(12, 0);
        let record = schedule(
            &storage,
            -100,
            KickRequest {
                user_id: 42,
                minutes: 90,
            },
            now,
        )
        .await?;

        assert_eq!(record.kick_time, may_first(13, 30));
        assert_eq!(storage.pending_kicks().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_schedule_rejects_unrepresentable_delay() {
        let storage = InMemoryStorage::default();
        for minutes in [9_999_999_999_999, i64::MAX] {
            let result = schedule(
                &storage,
                -100,
                KickRequest {
                    user_id: 42,
                    minutes,
                },
                may_first(12, 0),
            )
            .await;
            assert!(matches!(
                result,
                Err(ScheduleError::Args(KickArgsError::InvalidMinutes))
            ));
        }
        assert_eq!(storage.pending_kicks().await, 0);
    }

    #[tokio::test]
    async fn test_due_kicks_are_removed_even_on_failure() -> Result<(), ScheduleError> {
        let storage = InMemoryStorage::default();
        let now = Utc::now();
        for (user_id, minutes) in [(1, 1), (2, 1), (3, 600)] {
            schedule(
                &storage,
                -100,
                KickRequest { user_id, minutes },
                now,
            )
            .await?;
        }

        let mut moderator = MockChatModerator::new();
        moderator
            .expect_remove_member()
            .withf(|_, user| *user == 1)
            .returning(|_, _| Ok(()));
        moderator
            .expect_remove_member()
            .withf(|_, user| *user == 2)
            .returning(|_, _| Err(anyhow::anyhow!("not enough rights")));

        let later = now + ChronoDuration::minutes(5);
        assert_eq!(process_due(&storage, &moderator, later).await, 1);
        assert_eq!(storage.pending_kicks().await, 1);
        assert_eq!(process_due(&storage, &moderator, later).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_storage_failure_kicks_nobody() {
        let mut storage = MockStorageProvider::new();
        storage
            .expect_take_due_kicks()
            .returning(|_| Err(StorageError::Config("offline".to_string())));
        let mut moderator = MockChatModerator::new();
        moderator.expect_remove_member().never();

        assert_eq!(process_due(&storage, &moderator, Utc::now()).await, 0);
    }
}
