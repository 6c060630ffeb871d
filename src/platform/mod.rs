//! Boundary traits for the vendor notification platform.
//!
//! The remote account registry, push-channel machinery, per-account notification
//! feed, and the OS toast surface are all external collaborators. They are modeled
//! as object-safe async traits so the sync/reconciliation logic can be exercised
//! against in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::beacon::accounts::AccountIdentity;
use crate::beacon::notifications::types::NotificationRecord;
use crate::beacon::toast::ToastContent;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform call failed: {0}")]
    Transport(String),

    #[error("No notification feed available for account {0}")]
    FeedUnavailable(String),

    #[error("Push channel creation failed: {0}")]
    PushChannel(String),
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// The kind of push transport a registration token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushChannelKind {
    /// The OS-native push channel for this application.
    Native,
    /// A polling-only registration with no wake signal.
    Polling,
}

/// A push channel handle acquired from the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushChannel {
    pub uri: String,
}

/// Descriptor submitted to the remote registry to associate this device's push
/// channel with an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRegistration {
    pub kind: PushChannelKind,
    pub token: String,
}

/// Outcome of a remote notification-registration call.
///
/// Non-success statuses are reported but not retried by this crate; retry policy
/// belongs to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Success,
    TokenFailure,
    WebFailure,
    Unknown,
}

/// Registration lifetime states reported by the remote registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationRegistrationState {
    Registered,
    Expiring,
    Expired,
    Unregistered,
}

/// The vendor platform: remote account registry, push registration, and feed
/// construction.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Enumerates the accounts currently registered on the platform side.
    async fn registered_accounts(&self) -> PlatformResult<Vec<AccountIdentity>>;

    /// Adds an account to the platform's registry.
    async fn add_account(&self, identity: &AccountIdentity) -> PlatformResult<()>;

    /// Removes an account from the platform's registry.
    async fn remove_account(&self, identity: &AccountIdentity) -> PlatformResult<()>;

    /// Acquires a push channel handle from the OS.
    async fn create_push_channel(&self) -> PlatformResult<PushChannel>;

    /// Submits a push registration for an account.
    async fn register_notifications(
        &self,
        identity: &AccountIdentity,
        registration: &NotificationRegistration,
    ) -> PlatformResult<RegistrationStatus>;

    /// Opens the notification feed for an account.
    fn feed_for_account(&self, identity: &AccountIdentity)
        -> PlatformResult<Arc<dyn NotificationFeed>>;
}

/// One account's remote notification stream: subscription, reader, and write
/// channel combined.
#[async_trait]
pub trait NotificationFeed: Send + Sync {
    /// Subscribes the feed to the notification sync scope. Returns `false` when
    /// the platform declined the subscription.
    async fn subscribe_sync_scopes(&self) -> PlatformResult<bool>;

    /// Asks the feed to start another sync pass. Completion is signalled later via
    /// a `NotificationsChanged` event.
    async fn start_sync(&self) -> PlatformResult<()>;

    /// Reads up to `max` outstanding notifications from the reader.
    async fn read_batch(&self, max: u32) -> PlatformResult<Vec<NotificationRecord>>;

    /// Persists locally mutated notification state back to the feed.
    async fn save(&self, record: &NotificationRecord) -> PlatformResult<()>;

    /// Requests deletion of a notification through the write channel.
    async fn delete(&self, id: &str) -> PlatformResult<()>;
}

/// The OS toast surface. Implementations are expected to be cheap and
/// non-blocking; failures are the presenter's problem, not the sync engine's.
pub trait ToastPresenter: Send + Sync {
    /// Shows a toast, replacing any prior toast with the same tag.
    fn show(&self, toast: &ToastContent);

    /// Withdraws the toast with the given tag, if any is on screen.
    fn withdraw(&self, tag: &str);
}
