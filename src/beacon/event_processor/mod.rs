use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use crate::beacon::Beacon;
use crate::beacon::accounts::AccountIdentity;
use crate::platform::NotificationRegistrationState;
use crate::types::{PlatformEvent, TokenResponder};

impl Beacon {
    /// Start the event processing loop in a background task.
    ///
    /// Consumes the receivers parked at construction; calling this a second
    /// time is a no-op.
    pub fn start_event_processing(beacon: &Arc<Beacon>) {
        let event_receiver = beacon
            .event_receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let shutdown_receiver = beacon
            .shutdown_receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let (Some(receiver), Some(shutdown)) = (event_receiver, shutdown_receiver) else {
            tracing::warn!(
                target: "beacon::event_processor",
                "Event processing already started"
            );
            return;
        };

        let beacon = beacon.clone();
        tokio::spawn(async move {
            Self::process_events(beacon, receiver, shutdown).await;
        });
    }

    /// Shutdown event processing gracefully
    pub async fn shutdown(&self) {
        // A send error means the processor is already gone, which is fine
        let _ = self.shutdown_sender.send(()).await;
    }

    /// Main event processing loop. Every inbound platform event is dispatched
    /// here, one at a time, so account state never sees concurrent handlers.
    async fn process_events(
        beacon: Arc<Beacon>,
        mut receiver: Receiver<PlatformEvent>,
        mut shutdown: Receiver<()>,
    ) {
        tracing::debug!(
            target: "beacon::event_processor::process_events",
            "Starting event processing loop"
        );

        let mut shutting_down = false;

        loop {
            tokio::select! {
                Some(event) = receiver.recv() => {
                    tracing::debug!(
                        target: "beacon::event_processor::process_events",
                        "Received event for processing: {:?}",
                        event
                    );

                    match event {
                        PlatformEvent::AccessTokenRequested { identity, scopes, responder } => {
                            beacon.handle_access_token_requested(identity, scopes, responder).await;
                        }
                        PlatformEvent::AccessTokenInvalidated { identity, scopes } => {
                            beacon.handle_access_token_invalidated(identity, scopes);
                        }
                        PlatformEvent::RegistrationStateChanged { identity, state } => {
                            beacon.handle_registration_state_changed(identity, state).await;
                        }
                        PlatformEvent::NotificationsChanged { identity } => {
                            beacon.handle_notifications_changed(identity).await;
                        }
                        PlatformEvent::ToastActivated { identity, notification_id } => {
                            beacon.handle_toast_activated(identity, notification_id).await;
                        }
                    }
                }
                Some(_) = shutdown.recv(), if !shutting_down => {
                    tracing::info!(
                        target: "beacon::event_processor::process_events",
                        "Received shutdown signal, finishing current queue..."
                    );
                    shutting_down = true;
                    // Keep draining queued events, but stop waiting for new shutdown signals
                }
                else => {
                    if shutting_down {
                        tracing::debug!(
                            target: "beacon::event_processor::process_events",
                            "Queue flushed, shutting down event processor"
                        );
                    } else {
                        tracing::debug!(
                            target: "beacon::event_processor::process_events",
                            "All channels closed, exiting event processing loop"
                        );
                    }
                    break;
                }
            }
        }
    }

    /// Resolves a platform token request against the owning account.
    ///
    /// An unknown account drops the responder without answering, which the
    /// platform side observes as an unfulfilled request. A known account always
    /// gets an answer, success or failure.
    async fn handle_access_token_requested(
        &self,
        identity: AccountIdentity,
        scopes: Vec<String>,
        responder: TokenResponder,
    ) {
        tracing::debug!(
            target: "beacon::event_processor::handle_access_token_requested",
            "Token requested for {} with scopes [{}]",
            identity,
            scopes.join(", ")
        );

        let guard = self.accounts.lock().await;
        let Some(account) = guard.iter().find(|a| a.identity == identity) else {
            tracing::warn!(
                target: "beacon::event_processor::handle_access_token_requested",
                "Token requested for unknown account {}",
                identity
            );
            return;
        };

        match account.access_token(&scopes, &self.tokens).await {
            Ok(token) => {
                let _ = responder.send(Ok(token));
            }
            Err(e) => {
                tracing::warn!(
                    target: "beacon::event_processor::handle_access_token_requested",
                    "Token acquisition failed for {}: {}",
                    identity,
                    e
                );
                let _ = responder.send(Err(e.to_string()));
            }
        }
    }

    /// The platform invalidated a cached token. Tokens are acquired fresh on
    /// every request, so this is informational only.
    fn handle_access_token_invalidated(&self, identity: AccountIdentity, scopes: Vec<String>) {
        tracing::info!(
            target: "beacon::event_processor::handle_access_token_invalidated",
            "Token invalidated for {} with scopes [{}]",
            identity,
            scopes.join(", ")
        );
    }

    /// Re-registers the push channel when the platform reports it expiring or
    /// expired. Other states need no action.
    async fn handle_registration_state_changed(
        &self,
        identity: AccountIdentity,
        state: NotificationRegistrationState,
    ) {
        tracing::debug!(
            target: "beacon::event_processor::handle_registration_state_changed",
            "Registration state for {} changed to {:?}",
            identity,
            state
        );

        if !matches!(
            state,
            NotificationRegistrationState::Expired | NotificationRegistrationState::Expiring
        ) {
            return;
        }

        let mut guard = self.accounts.lock().await;
        let Some(account) = guard.iter_mut().find(|a| a.identity == identity) else {
            tracing::warn!(
                target: "beacon::event_processor::handle_registration_state_changed",
                "Registration change for unknown account {}",
                identity
            );
            return;
        };

        if let Err(e) = account.register_push(&self.platform).await {
            tracing::warn!(
                target: "beacon::event_processor::handle_registration_state_changed",
                "Failed to renew registration for {}: {}",
                identity,
                e
            );
        }
    }

    /// The platform signalled new feed state; run a cache sync pass.
    async fn handle_notifications_changed(&self, identity: AccountIdentity) {
        let guard = self.accounts.lock().await;
        let Some(account) = guard.iter().find(|a| a.identity == identity) else {
            tracing::debug!(
                target: "beacon::event_processor::handle_notifications_changed",
                "Notification change for unknown account {}, ignoring",
                identity
            );
            return;
        };

        let Some(notifications) = account.notifications() else {
            return;
        };
        if let Err(e) = notifications.sync().await {
            tracing::warn!(
                target: "beacon::event_processor::handle_notifications_changed",
                "Cache sync failed for {}: {}",
                identity,
                e
            );
        }
    }

    /// The user tapped a toast; mark the notification activated.
    async fn handle_toast_activated(&self, identity: AccountIdentity, notification_id: String) {
        if let Err(e) = self
            .activate_notification(&identity, &notification_id, false)
            .await
        {
            tracing::warn!(
                target: "beacon::event_processor::handle_toast_activated",
                "Toast activation for {} failed: {}",
                identity,
                e
            );
        }
    }
}
