pub mod types;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::beacon::accounts::AccountIdentity;
use crate::beacon::error::{BeaconError, Result};
use crate::beacon::streams::{CacheUpdate, StreamManager};
use crate::beacon::toast::ToastContent;
use crate::platform::{NotificationFeed, ToastPresenter};
use types::{NotificationRecord, NotificationStatus, ReadState, UserActionState};

#[derive(Default)]
struct Caches {
    new_notifications: Vec<NotificationRecord>,
    historical: Vec<NotificationRecord>,
}

enum ToastOp {
    Show(ToastContent),
    Withdraw(String),
}

/// Mirrors one account's remote notification feed into two local caches and
/// projects new, unread, non-empty notifications as OS toasts.
///
/// Exists only while its account is synced with the platform; dropping the
/// manager releases the feed handle.
pub struct NotificationManager {
    identity: AccountIdentity,
    feed: Arc<dyn NotificationFeed>,
    toasts: Arc<dyn ToastPresenter>,
    caches: Mutex<Caches>,
    cache_stream: StreamManager<CacheUpdate>,
}

impl std::fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationManager")
            .field("identity", &self.identity)
            .field("feed", &"<REDACTED>")
            .field("toasts", &"<REDACTED>")
            .finish()
    }
}

impl NotificationManager {
    pub(crate) fn new(
        identity: AccountIdentity,
        feed: Arc<dyn NotificationFeed>,
        toasts: Arc<dyn ToastPresenter>,
    ) -> Self {
        tracing::debug!(
            target: "beacon::notifications",
            "Setup feed for {} {}",
            identity.id,
            identity.account_type
        );
        Self {
            identity,
            feed,
            toasts,
            caches: Mutex::new(Caches::default()),
            cache_stream: StreamManager::new(),
        }
    }

    fn caches(&self) -> MutexGuard<'_, Caches> {
        // Recover rather than propagate on poisoning; the caches are plain data
        self.caches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribes the feed to its notification sync scope. Called once the
    /// account's push registration succeeded.
    pub(crate) async fn subscribe_sync_scopes(&self) -> Result<()> {
        let registered = self.feed.subscribe_sync_scopes().await?;
        if !registered {
            return Err(BeaconError::SubscribeDeclined);
        }
        Ok(())
    }

    /// Pulls the full outstanding batch from the reader and folds it into the
    /// caches.
    ///
    /// Batches resolve last-write-wins in arrival order: re-delivering a record
    /// with unchanged fields leaves cache and toast state unchanged, and an
    /// `Active` record arriving after a `Deleted` one re-inserts it.
    pub async fn sync(&self) -> Result<()> {
        let batch = self.feed.read_batch(u32::MAX).await?;
        tracing::debug!(
            target: "beacon::notifications",
            "Read {} notifications for {}",
            batch.len(),
            self.identity.id
        );

        let mut toast_ops = Vec::new();
        {
            let mut caches = self.caches();
            for notification in batch {
                let id = notification.id.clone();
                caches.new_notifications.retain(|n| n.id != id);
                caches.historical.retain(|n| n.id != id);

                match notification.status {
                    NotificationStatus::Active => {
                        if notification.user_action == UserActionState::NoInteraction {
                            tracing::debug!(
                                target: "beacon::notifications",
                                "Notification not interacted: {}",
                                id
                            );
                            caches.new_notifications.push(notification.clone());
                            if !notification.content.is_empty()
                                && notification.read_state != ReadState::Read
                            {
                                // Replace any stale toast for this id with a fresh one
                                toast_ops.push(ToastOp::Withdraw(id.clone()));
                                toast_ops.push(ToastOp::Show(ToastContent::for_notification(
                                    &self.identity,
                                    &id,
                                    &notification.content,
                                )));
                            }
                        } else {
                            toast_ops.push(ToastOp::Withdraw(id.clone()));
                        }

                        caches.historical.insert(0, notification);
                    }
                    NotificationStatus::Deleted => {
                        toast_ops.push(ToastOp::Withdraw(id));
                    }
                }
            }
        }

        for op in toast_ops {
            match op {
                ToastOp::Show(toast) => self.toasts.show(&toast),
                ToastOp::Withdraw(tag) => self.toasts.withdraw(&tag),
            }
        }

        self.cache_stream.emit(CacheUpdate {
            account: self.identity.clone(),
        });
        Ok(())
    }

    /// Drains the reader, then asks the feed for another sync pass.
    pub async fn refresh(&self) -> Result<()> {
        self.sync().await?;
        tracing::debug!(target: "beacon::notifications", "Requesting another sync");
        self.feed.start_sync().await?;
        Ok(())
    }

    /// Marks a notification activated or dismissed, persists the change to the
    /// feed, and withdraws its toast. Unknown ids are a no-op.
    pub async fn activate(&self, id: &str, dismiss: bool) -> Result<()> {
        let updated = {
            let mut caches = self.caches();
            match caches.historical.iter_mut().find(|n| n.id == id) {
                Some(notification) => {
                    notification.user_action = if dismiss {
                        UserActionState::Dismissed
                    } else {
                        UserActionState::Activated
                    };
                    Some(notification.clone())
                }
                None => None,
            }
        };

        if let Some(notification) = updated {
            self.feed.save(&notification).await?;
            self.toasts.withdraw(&notification.id);
            tracing::debug!(
                target: "beacon::notifications",
                "{} is now {:?}",
                notification.id,
                notification.user_action
            );
        }
        Ok(())
    }

    /// Marks a notification read and persists the change. Unknown ids are a
    /// no-op.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        let updated = {
            let mut caches = self.caches();
            match caches.historical.iter_mut().find(|n| n.id == id) {
                Some(notification) => {
                    notification.read_state = ReadState::Read;
                    Some(notification.clone())
                }
                None => None,
            }
        };

        if let Some(notification) = updated {
            self.feed.save(&notification).await?;
            tracing::debug!(
                target: "beacon::notifications",
                "{} is now READ",
                notification.id
            );
        }
        Ok(())
    }

    /// Requests deletion through the feed's write channel. Local caches are left
    /// untouched; the next sync batch reports the record as `Deleted` and purges
    /// it. Unknown ids are a no-op.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let known = self.caches().historical.iter().any(|n| n.id == id);
        if known {
            self.feed.delete(id).await?;
            tracing::debug!(target: "beacon::notifications", "{} is now DELETED", id);
        }
        Ok(())
    }

    /// Clears both caches and notifies observers. The feed handle itself is
    /// released when the manager is dropped.
    pub fn reset(&self) {
        tracing::debug!(
            target: "beacon::notifications",
            "Resetting the feed for {}",
            self.identity.id
        );
        {
            let mut caches = self.caches();
            caches.new_notifications.clear();
            caches.historical.clear();
        }
        self.cache_stream.emit(CacheUpdate {
            account: self.identity.clone(),
        });
    }

    /// Snapshot of the new (undisplayed) notifications, in delivery order.
    pub fn new_notifications(&self) -> Vec<NotificationRecord> {
        self.caches().new_notifications.clone()
    }

    /// Snapshot of the historical cache, most recent first.
    pub fn historical(&self) -> Vec<NotificationRecord> {
        self.caches().historical.clone()
    }

    /// Observer stream for cache rewrites.
    pub fn subscribe_cache_updates(&self) -> broadcast::Receiver<CacheUpdate> {
        self.cache_stream.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::accounts::AccountType;
    use crate::beacon::test_utils::{MockFeed, RecordingToasts, ToastAction};

    fn identity() -> AccountIdentity {
        AccountIdentity {
            id: "acct1".to_string(),
            account_type: AccountType::Consumer,
        }
    }

    fn make_manager() -> (NotificationManager, Arc<MockFeed>, Arc<RecordingToasts>) {
        let feed = Arc::new(MockFeed::new());
        let toasts = Arc::new(RecordingToasts::new());
        let manager = NotificationManager::new(identity(), feed.clone(), toasts.clone());
        (manager, feed, toasts)
    }

    #[tokio::test]
    async fn sync_inserts_new_notification_and_shows_toast() {
        let (manager, feed, toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::new_active("n1", "hi")]);

        manager.sync().await.unwrap();

        assert_eq!(manager.new_notifications().len(), 1);
        assert_eq!(manager.new_notifications()[0].id, "n1");
        assert_eq!(manager.historical().len(), 1);

        let actions = toasts.actions();
        assert_eq!(
            actions,
            vec![
                ToastAction::Withdrawn("n1".to_string()),
                ToastAction::Shown("n1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn sync_is_idempotent_for_identical_records() {
        let (manager, feed, _toasts) = make_manager();
        let record = NotificationRecord::new_active("n1", "hi");

        feed.push_batch(vec![record.clone()]);
        manager.sync().await.unwrap();

        feed.push_batch(vec![record]);
        manager.sync().await.unwrap();

        assert_eq!(manager.new_notifications().len(), 1);
        assert_eq!(manager.historical().len(), 1);
    }

    #[tokio::test]
    async fn deleted_record_purges_both_caches_and_withdraws_toast() {
        let (manager, feed, toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::new_active("n1", "hi")]);
        manager.sync().await.unwrap();

        feed.push_batch(vec![NotificationRecord::deleted("n1")]);
        manager.sync().await.unwrap();

        assert!(manager.new_notifications().is_empty());
        assert!(manager.historical().is_empty());
        assert_eq!(
            toasts.actions().last(),
            Some(&ToastAction::Withdrawn("n1".to_string()))
        );
    }

    #[tokio::test]
    async fn empty_content_is_cached_but_never_toasted() {
        let (manager, feed, toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::new_active("n1", "")]);

        manager.sync().await.unwrap();

        assert_eq!(manager.new_notifications().len(), 1);
        assert_eq!(manager.historical().len(), 1);
        assert!(toasts.shown().is_empty());
    }

    #[tokio::test]
    async fn already_read_notification_is_not_toasted() {
        let (manager, feed, toasts) = make_manager();
        let mut record = NotificationRecord::new_active("n1", "hi");
        record.read_state = ReadState::Read;
        feed.push_batch(vec![record]);

        manager.sync().await.unwrap();

        assert!(toasts.shown().is_empty());
        assert_eq!(manager.new_notifications().len(), 1);
    }

    #[tokio::test]
    async fn acted_upon_notification_withdraws_toast_and_skips_new_cache() {
        let (manager, feed, toasts) = make_manager();
        let mut record = NotificationRecord::new_active("n1", "hi");
        record.user_action = UserActionState::Dismissed;
        feed.push_batch(vec![record]);

        manager.sync().await.unwrap();

        assert!(manager.new_notifications().is_empty());
        assert_eq!(manager.historical().len(), 1);
        assert_eq!(
            toasts.actions(),
            vec![ToastAction::Withdrawn("n1".to_string())]
        );
    }

    #[tokio::test]
    async fn historical_is_most_recent_first() {
        let (manager, feed, _toasts) = make_manager();
        feed.push_batch(vec![
            NotificationRecord::new_active("n1", "first"),
            NotificationRecord::new_active("n2", "second"),
        ]);

        manager.sync().await.unwrap();

        let historical = manager.historical();
        assert_eq!(historical[0].id, "n2");
        assert_eq!(historical[1].id, "n1");
    }

    #[tokio::test]
    async fn active_after_deleted_reinserts() {
        let (manager, feed, _toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::deleted("n1")]);
        manager.sync().await.unwrap();
        assert!(manager.historical().is_empty());

        // Last write wins: a later Active record brings the id back
        feed.push_batch(vec![NotificationRecord::new_active("n1", "back")]);
        manager.sync().await.unwrap();
        assert_eq!(manager.historical().len(), 1);
    }

    #[tokio::test]
    async fn activate_persists_and_withdraws() {
        let (manager, feed, toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::new_active("n1", "hi")]);
        manager.sync().await.unwrap();

        manager.activate("n1", true).await.unwrap();

        let saved = feed.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].user_action, UserActionState::Dismissed);
        assert_eq!(
            toasts.actions().last(),
            Some(&ToastAction::Withdrawn("n1".to_string()))
        );
        // The cache reflects the mutation
        assert_eq!(
            manager.historical()[0].user_action,
            UserActionState::Dismissed
        );
    }

    #[tokio::test]
    async fn activate_unknown_id_is_noop() {
        let (manager, feed, _toasts) = make_manager();

        manager.activate("missing", false).await.unwrap();

        assert!(feed.saved().is_empty());
    }

    #[tokio::test]
    async fn mark_read_persists_read_state() {
        let (manager, feed, _toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::new_active("n1", "hi")]);
        manager.sync().await.unwrap();

        manager.mark_read("n1").await.unwrap();

        let saved = feed.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].read_state, ReadState::Read);
    }

    #[tokio::test]
    async fn delete_requests_removal_but_keeps_caches() {
        let (manager, feed, _toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::new_active("n1", "hi")]);
        manager.sync().await.unwrap();

        manager.delete("n1").await.unwrap();

        assert_eq!(feed.deleted(), vec!["n1".to_string()]);
        // Caches untouched until the feed reports the deletion
        assert_eq!(manager.historical().len(), 1);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_noop() {
        let (manager, feed, _toasts) = make_manager();

        manager.delete("missing").await.unwrap();

        assert!(feed.deleted().is_empty());
    }

    #[tokio::test]
    async fn reset_clears_caches_and_notifies() {
        let (manager, feed, _toasts) = make_manager();
        feed.push_batch(vec![NotificationRecord::new_active("n1", "hi")]);
        manager.sync().await.unwrap();

        let mut rx = manager.subscribe_cache_updates();
        manager.reset();

        assert!(manager.new_notifications().is_empty());
        assert!(manager.historical().is_empty());
        let update = rx.try_recv().unwrap();
        assert_eq!(update.account.id, "acct1");
    }

    #[tokio::test]
    async fn sync_emits_cache_update() {
        let (manager, feed, _toasts) = make_manager();
        let mut rx = manager.subscribe_cache_updates();

        feed.push_batch(vec![NotificationRecord::new_active("n1", "hi")]);
        manager.sync().await.unwrap();

        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn subscribe_declined_surfaces_error() {
        let (manager, feed, _toasts) = make_manager();
        feed.decline_subscribe();

        let err = manager.subscribe_sync_scopes().await.unwrap_err();
        assert!(matches!(err, BeaconError::SubscribeDeclined));
    }
}
