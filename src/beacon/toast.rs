use serde_json::json;

use crate::beacon::accounts::AccountIdentity;

/// A two-line toast keyed by notification id.
///
/// `tag` doubles as the replacement/withdrawal key on the OS surface. The launch
/// payload is what the OS hands back when the user activates the toast; adapters
/// decode it and push a `ToastActivated` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastContent {
    pub tag: String,
    pub title: String,
    pub body: String,
    pub launch: String,
}

impl ToastContent {
    /// Builds the toast for a notification: first line is the notification id,
    /// second line its content, matching the feed's display convention.
    pub fn for_notification(identity: &AccountIdentity, id: &str, content: &str) -> Self {
        let launch = json!({
            "type": "toast",
            "accountId": identity.id,
            "accountType": identity.account_type.to_string(),
            "notificationId": id,
        })
        .to_string();

        Self {
            tag: id.to_string(),
            title: id.to_string(),
            body: content.to_string(),
            launch,
        }
    }
}
