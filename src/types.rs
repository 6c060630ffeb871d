use tokio::sync::oneshot;

use crate::beacon::accounts::AccountIdentity;
use crate::platform::NotificationRegistrationState;

/// Resolves a pending access-token request raised by the platform.
///
/// Sending `Ok` completes the request with a bearer token; sending `Err` completes
/// it with an error message. Dropping the sender without sending leaves the request
/// uncompleted, which the platform adapter should treat as "unknown account".
pub type TokenResponder = oneshot::Sender<std::result::Result<String, String>>;

/// Typed inbound events from the platform SDK adapters.
///
/// Adapters translate whatever callback mechanism the vendor SDK uses into these
/// values and push them onto the [`Beacon`](crate::Beacon) event channel. A single
/// dispatch loop processes them one at a time.
pub enum PlatformEvent {
    /// The platform needs an access token for an account and scope set.
    AccessTokenRequested {
        identity: AccountIdentity,
        scopes: Vec<String>,
        responder: TokenResponder,
    },
    /// A previously issued token was rejected by a platform service.
    AccessTokenInvalidated {
        identity: AccountIdentity,
        scopes: Vec<String>,
    },
    /// The push notification registration for an account changed state.
    RegistrationStateChanged {
        identity: AccountIdentity,
        state: NotificationRegistrationState,
    },
    /// The notification feed for an account has new data to read.
    NotificationsChanged { identity: AccountIdentity },
    /// The user activated a toast belonging to the given notification.
    ToastActivated {
        identity: AccountIdentity,
        notification_id: String,
    },
}

impl std::fmt::Debug for PlatformEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformEvent::AccessTokenRequested {
                identity, scopes, ..
            } => f
                .debug_struct("AccessTokenRequested")
                .field("identity", identity)
                .field("scopes", scopes)
                .finish(),
            PlatformEvent::AccessTokenInvalidated { identity, scopes } => f
                .debug_struct("AccessTokenInvalidated")
                .field("identity", identity)
                .field("scopes", scopes)
                .finish(),
            PlatformEvent::RegistrationStateChanged { identity, state } => f
                .debug_struct("RegistrationStateChanged")
                .field("identity", identity)
                .field("state", state)
                .finish(),
            PlatformEvent::NotificationsChanged { identity } => f
                .debug_struct("NotificationsChanged")
                .field("identity", identity)
                .finish(),
            PlatformEvent::ToastActivated {
                identity,
                notification_id,
            } => f
                .debug_struct("ToastActivated")
                .field("identity", identity)
                .field("notification_id", notification_id)
                .finish(),
        }
    }
}
