use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::beacon::error::{BeaconError, Result};
use crate::beacon::notifications::NotificationManager;
use crate::beacon::token_provider::TokenProvider;
use crate::platform::{
    NotificationPlatform, NotificationRegistration, PushChannelKind, RegistrationStatus,
    ToastPresenter,
};

/// How an account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Consumer account: tokens come from a stored refresh-token exchange.
    Consumer,
    /// Workplace account: silent acquisition first, interactive fallback.
    Workplace,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Consumer => write!(f, "consumer"),
            AccountType::Workplace => write!(f, "workplace"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consumer" => Ok(AccountType::Consumer),
            "workplace" => Ok(AccountType::Workplace),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

/// Identity of an account; the equality key everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub id: String,
    pub account_type: AccountType,
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.account_type)
    }
}

/// Where an account stands relative to the two caches: the locally persisted
/// list and the platform's registry.
///
/// The [`NotificationManager`] lives inside `Synced`, so subcomponents can only
/// exist for an account both sides agree on; the other states cannot represent
/// one.
#[derive(Debug)]
pub enum Registration {
    /// Persisted locally but unknown to the platform; will be added and promoted
    /// to `Synced` during convergence.
    LocalOnly,
    /// Known to the platform but not persisted locally; will be removed from the
    /// platform and dropped.
    RemoteOnly,
    /// Both sides agree. The account is in good standing and owns its feed.
    Synced { notifications: NotificationManager },
}

impl Registration {
    fn label(&self) -> &'static str {
        match self {
            Registration::LocalOnly => "local-only",
            Registration::RemoteOnly => "remote-only",
            Registration::Synced { .. } => "synced",
        }
    }
}

/// The locally persisted shape of an account: identity and credential only,
/// never transient runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAccount {
    pub id: String,
    pub account_type: AccountType,
    pub credential: String,
}

impl PersistedAccount {
    pub(crate) fn identity(&self) -> AccountIdentity {
        AccountIdentity {
            id: self.id.clone(),
            account_type: self.account_type,
        }
    }

    /// Decodes the persisted account list from its JSON-array settings value.
    pub(crate) fn decode_list(json: &str) -> Result<Vec<PersistedAccount>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes the persistable view of `accounts` as a JSON array.
    pub(crate) fn encode_list(accounts: &[Account]) -> Result<String> {
        let persisted: Vec<PersistedAccount> = accounts.iter().map(Account::persisted).collect();
        Ok(serde_json::to_string(&persisted)?)
    }
}

/// One account being driven toward convergence between the local cache and the
/// platform registry.
#[derive(Debug)]
pub struct Account {
    pub identity: AccountIdentity,
    pub credential: String,
    pub registration: Registration,
}

impl Account {
    pub(crate) fn new_local(identity: AccountIdentity, credential: String) -> Self {
        Self {
            identity,
            credential,
            registration: Registration::LocalOnly,
        }
    }

    pub(crate) fn new_remote_only(identity: AccountIdentity) -> Self {
        Self {
            identity,
            credential: String::new(),
            registration: Registration::RemoteOnly,
        }
    }

    pub(crate) fn new_synced(
        identity: AccountIdentity,
        credential: String,
        notifications: NotificationManager,
    ) -> Self {
        Self {
            identity,
            credential,
            registration: Registration::Synced { notifications },
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self.registration, Registration::Synced { .. })
    }

    /// The notification manager, present iff the account is synced.
    pub fn notifications(&self) -> Option<&NotificationManager> {
        match &self.registration {
            Registration::Synced { notifications } => Some(notifications),
            _ => None,
        }
    }

    fn persisted(&self) -> PersistedAccount {
        PersistedAccount {
            id: self.identity.id.clone(),
            account_type: self.identity.account_type,
            credential: self.credential.clone(),
        }
    }

    /// Drives this account's lifecycle transition.
    ///
    /// `LocalOnly` accounts are added to the platform registry, gain a
    /// notification manager, and run push registration. `RemoteOnly` accounts
    /// are removed from the registry and stay terminal for the caller to prune.
    /// `Synced` accounts are already converged.
    pub(crate) async fn converge(
        &mut self,
        platform: &Arc<dyn NotificationPlatform>,
        toasts: &Arc<dyn ToastPresenter>,
    ) -> Result<()> {
        match self.registration {
            Registration::LocalOnly => {
                platform.add_account(&self.identity).await?;
                let feed = platform.feed_for_account(&self.identity)?;
                let notifications =
                    NotificationManager::new(self.identity.clone(), feed, toasts.clone());
                self.registration = Registration::Synced { notifications };
                tracing::debug!(
                    target: "beacon::accounts",
                    "Added {} to the platform registry",
                    self.identity
                );
                // The account is in good standing from here on; a registration
                // failure below leaves it Synced and is retried on expiry events.
                self.register_push(platform).await
            }
            Registration::RemoteOnly => {
                platform.remove_account(&self.identity).await?;
                tracing::debug!(
                    target: "beacon::accounts",
                    "Removed stale platform account {}",
                    self.identity
                );
                Ok(())
            }
            Registration::Synced { .. } => Ok(()),
        }
    }

    /// Acquires a push channel and registers it with the platform; on success the
    /// notification manager subscribes to its sync scopes.
    ///
    /// Non-success registration statuses are logged and not retried here; the
    /// platform re-raises expiry events when it wants another attempt.
    pub(crate) async fn register_push(
        &self,
        platform: &Arc<dyn NotificationPlatform>,
    ) -> Result<()> {
        let notifications = match &self.registration {
            Registration::Synced { notifications } => notifications,
            other => {
                tracing::error!(
                    target: "beacon::accounts",
                    "Push registration requested for {} in state {}",
                    self.identity,
                    other.label()
                );
                return Err(BeaconError::AccountNotSynced);
            }
        };

        let channel = platform.create_push_channel().await?;
        let registration = NotificationRegistration {
            kind: PushChannelKind::Native,
            token: channel.uri,
        };
        let status = platform
            .register_notifications(&self.identity, &registration)
            .await?;

        if status == RegistrationStatus::Success {
            notifications.subscribe_sync_scopes().await?;
        } else {
            tracing::warn!(
                target: "beacon::accounts",
                "Push registration for {} returned {:?}",
                self.identity,
                status
            );
        }
        Ok(())
    }

    /// Tears down the notification manager, removes the account from the
    /// platform registry, and reverts to `LocalOnly` so it can be re-added.
    pub(crate) async fn logout(
        &mut self,
        platform: &Arc<dyn NotificationPlatform>,
    ) -> Result<()> {
        if !self.is_synced() {
            return Err(BeaconError::AccountNotSynced);
        }

        if let Registration::Synced { notifications } =
            std::mem::replace(&mut self.registration, Registration::LocalOnly)
        {
            notifications.reset();
        }
        platform.remove_account(&self.identity).await?;
        tracing::debug!(target: "beacon::accounts", "Logged out {}", self.identity);
        Ok(())
    }

    /// Resolves an access token for this account.
    ///
    /// Consumer accounts exchange the stored refresh credential in a single
    /// attempt. Workplace accounts try the silent flow first and fall back to
    /// interactive; an interactive failure is fatal for the request.
    pub(crate) async fn access_token(
        &self,
        scopes: &[String],
        tokens: &Arc<dyn TokenProvider>,
    ) -> Result<String> {
        match self.identity.account_type {
            AccountType::Consumer => Ok(tokens
                .exchange_refresh_token(&self.credential, scopes)
                .await?),
            AccountType::Workplace => {
                let scope = scopes.first().ok_or_else(|| {
                    BeaconError::InvalidInput("token request carried no scopes".to_string())
                })?;

                match tokens.acquire_token_silent(&self.identity.id, scope).await {
                    Ok(token) => Ok(token),
                    Err(e) => {
                        tracing::warn!(
                            target: "beacon::accounts",
                            "Silent token acquisition failed for {}: {}",
                            self.identity,
                            e
                        );
                        Ok(tokens
                            .acquire_token_interactive(&self.identity.id, scope)
                            .await?)
                    }
                }
            }
        }
    }
}
