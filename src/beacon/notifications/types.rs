use serde::{Deserialize, Serialize};

/// Remote-side lifecycle of a notification. `Deleted` is terminal: the record is
/// purged from local caches when a sync batch reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Active,
    Deleted,
}

/// Whether and how the user has acted on a notification, on any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserActionState {
    NoInteraction,
    Activated,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadState {
    Unread,
    Read,
}

/// One notification as mirrored from the remote feed.
///
/// Created remotely; locally mutated only through
/// [`NotificationManager`](super::NotificationManager) operations, which persist
/// the change back to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub content: String,
    pub status: NotificationStatus,
    pub user_action: UserActionState,
    pub read_state: ReadState,
}

impl NotificationRecord {
    /// A freshly delivered, unseen notification.
    pub fn new_active(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            status: NotificationStatus::Active,
            user_action: UserActionState::NoInteraction,
            read_state: ReadState::Unread,
        }
    }

    /// A deletion marker for the given id.
    pub fn deleted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            status: NotificationStatus::Deleted,
            user_action: UserActionState::NoInteraction,
            read_state: ReadState::Unread,
        }
    }
}
