pub mod accounts;
pub mod database;
pub mod error;
mod event_processor;
pub mod notifications;
pub(crate) mod streams;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod toast;
pub mod token_provider;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Mutex;

use crate::platform::{NotificationPlatform, ToastPresenter};
use crate::types::PlatformEvent;
use accounts::{Account, AccountIdentity, PersistedAccount};
use database::{Database, Setting};
use error::{BeaconError, Result};
use notifications::NotificationManager;
use streams::{AccountsUpdate, StreamManager};
use token_provider::TokenProvider;

/// Settings key holding the persisted account list as a JSON array.
const ACCOUNTS_KEY: &str = "accounts";

#[derive(Debug, Clone)]
pub struct BeaconConfig {
    /// Directory for application data (the local database lives here).
    pub data_dir: PathBuf,

    /// Directory for application logs.
    pub logs_dir: PathBuf,
}

impl BeaconConfig {
    pub fn new(data_dir: impl Into<PathBuf>, logs_dir: impl Into<PathBuf>) -> Self {
        let env_suffix = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };

        Self {
            data_dir: data_dir.into().join(env_suffix),
            logs_dir: logs_dir.into().join(env_suffix),
        }
    }
}

/// The top-level coordinator.
///
/// Owns the converged account list, reconciles it against the platform's
/// registry on [`initialize`](Beacon::initialize), persists the merged list, and
/// dispatches inbound platform events to the right account. All mutation runs on
/// one cooperative task sequence; the accounts mutex is the only shared state.
pub struct Beacon {
    pub config: BeaconConfig,
    database: Database,
    platform: Arc<dyn NotificationPlatform>,
    tokens: Arc<dyn TokenProvider>,
    toasts: Arc<dyn ToastPresenter>,
    accounts: Mutex<Vec<Account>>,
    accounts_stream: StreamManager<AccountsUpdate>,
    event_sender: Sender<PlatformEvent>,
    shutdown_sender: Sender<()>,
    /// Receivers parked here until the event loop is started.
    event_receiver: std::sync::Mutex<Option<Receiver<PlatformEvent>>>,
    shutdown_receiver: std::sync::Mutex<Option<Receiver<()>>>,
}

impl std::fmt::Debug for Beacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beacon")
            .field("config", &self.config)
            .field("database", &"<REDACTED>")
            .field("platform", &"<REDACTED>")
            .field("tokens", &"<REDACTED>")
            .field("toasts", &"<REDACTED>")
            .finish()
    }
}

impl Beacon {
    /// Creates a Beacon instance: sets up directories and logging, opens the
    /// local database, and wires the event channels. Call
    /// [`initialize`](Beacon::initialize) afterwards to run the boot
    /// reconciliation, then [`start_event_processing`](Beacon::start_event_processing).
    pub async fn new(
        config: BeaconConfig,
        platform: Arc<dyn NotificationPlatform>,
        tokens: Arc<dyn TokenProvider>,
        toasts: Arc<dyn ToastPresenter>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", config.data_dir))
            .map_err(BeaconError::from)?;
        std::fs::create_dir_all(&config.logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", config.logs_dir))
            .map_err(BeaconError::from)?;

        crate::init_tracing(&config.logs_dir);
        tracing::debug!(
            target: "beacon::initialize",
            "Logging initialized in directory: {:?}",
            config.logs_dir
        );

        let database = Database::new(config.data_dir.join("beacon.sqlite")).await?;

        let (event_sender, event_receiver) = mpsc::channel(500);
        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        Ok(Self {
            config,
            database,
            platform,
            tokens,
            toasts,
            accounts: Mutex::new(Vec::new()),
            accounts_stream: StreamManager::new(),
            event_sender,
            shutdown_sender,
            event_receiver: std::sync::Mutex::new(Some(event_receiver)),
            shutdown_receiver: std::sync::Mutex::new(Some(shutdown_receiver)),
        })
    }

    /// Boot reconciliation.
    ///
    /// Merges the persisted account list with the platform's registry into
    /// per-account states, drives every account's lifecycle transition
    /// (individual failures are logged and never abort the others), discards
    /// everything that did not reach `Synced`, persists the survivors, and
    /// raises an accounts-changed notification. Running this twice with no
    /// external change yields the same account set and the same persisted JSON.
    pub async fn initialize(&self) -> Result<()> {
        let mut accounts = self.load_accounts().await?;

        for account in accounts.iter_mut() {
            if let Err(e) = account.converge(&self.platform, &self.toasts).await {
                tracing::warn!(
                    target: "beacon::initialize",
                    "Failed to converge account {}: {}",
                    account.identity,
                    e
                );
            }
        }

        // All accounts which can be in a good state should be by now
        accounts.retain(Account::is_synced);

        let mut guard = self.accounts.lock().await;
        *guard = accounts;
        self.account_list_changed(&guard).await?;

        tracing::debug!(
            target: "beacon::initialize",
            "Boot reconciliation complete with {} account(s)",
            guard.len()
        );
        Ok(())
    }

    /// Builds the working account list from the two authorities.
    ///
    /// Persisted accounts found in the platform registry become `Synced` (their
    /// notification manager is constructed immediately); persisted accounts the
    /// platform does not know become `LocalOnly`; platform accounts with no
    /// persisted counterpart are appended as `RemoteOnly` for cleanup.
    async fn load_accounts(&self) -> Result<Vec<Account>> {
        let mut remote = self.platform.registered_accounts().await?;
        let mut accounts = Vec::new();

        if let Some(json) = Setting::fetch(ACCOUNTS_KEY, &self.database).await? {
            if !json.is_empty() {
                for persisted in PersistedAccount::decode_list(&json)? {
                    let identity = persisted.identity();
                    if let Some(pos) = remote.iter().position(|r| *r == identity) {
                        remote.remove(pos);
                        match self.platform.feed_for_account(&identity) {
                            Ok(feed) => {
                                let manager = NotificationManager::new(
                                    identity.clone(),
                                    feed,
                                    self.toasts.clone(),
                                );
                                accounts.push(Account::new_synced(
                                    identity,
                                    persisted.credential,
                                    manager,
                                ));
                            }
                            Err(e) => {
                                // Fall back to LocalOnly so convergence retries
                                // the feed construction
                                tracing::warn!(
                                    target: "beacon::initialize",
                                    "No feed for synced account {}: {}",
                                    identity,
                                    e
                                );
                                accounts
                                    .push(Account::new_local(identity, persisted.credential));
                            }
                        }
                    } else {
                        accounts.push(Account::new_local(identity, persisted.credential));
                    }
                }
            }
        }

        // Anything still in the platform registry is unknown locally and must be
        // removed from it
        for identity in remote {
            accounts.push(Account::new_remote_only(identity));
        }

        Ok(accounts)
    }

    /// Adds a freshly authenticated account and drives it to convergence.
    ///
    /// The account is kept and persisted only if it reaches `Synced`; a
    /// convergence error is returned either way.
    pub async fn add_account(&self, identity: AccountIdentity, credential: String) -> Result<()> {
        let mut guard = self.accounts.lock().await;
        if guard.iter().any(|a| a.identity == identity) {
            return Err(BeaconError::InvalidInput(format!(
                "account {} is already present",
                identity
            )));
        }

        let mut account = Account::new_local(identity, credential);
        let result = account.converge(&self.platform, &self.toasts).await;

        if account.is_synced() {
            guard.push(account);
            self.account_list_changed(&guard).await?;
        }
        result
    }

    /// Logs an account out: tears down its notification manager, removes it from
    /// the platform registry, and reverts it to `LocalOnly` so it can be
    /// re-added later.
    pub async fn logout(&self, identity: &AccountIdentity) -> Result<()> {
        let mut guard = self.accounts.lock().await;
        let account = guard
            .iter_mut()
            .find(|a| a.identity == *identity)
            .ok_or(BeaconError::AccountNotFound)?;

        account.logout(&self.platform).await?;
        self.account_list_changed(&guard).await
    }

    /// Drains the account's reader and asks its feed for another sync pass.
    pub async fn refresh(&self, identity: &AccountIdentity) -> Result<()> {
        let guard = self.accounts.lock().await;
        let account = guard
            .iter()
            .find(|a| a.identity == *identity)
            .ok_or(BeaconError::AccountNotFound)?;
        account
            .notifications()
            .ok_or(BeaconError::AccountNotSynced)?
            .refresh()
            .await
    }

    /// Marks a notification activated or dismissed and withdraws its toast.
    pub async fn activate_notification(
        &self,
        identity: &AccountIdentity,
        notification_id: &str,
        dismiss: bool,
    ) -> Result<()> {
        let guard = self.accounts.lock().await;
        let account = guard
            .iter()
            .find(|a| a.identity == *identity)
            .ok_or(BeaconError::AccountNotFound)?;
        account
            .notifications()
            .ok_or(BeaconError::AccountNotSynced)?
            .activate(notification_id, dismiss)
            .await
    }

    /// Marks a notification read.
    pub async fn mark_notification_read(
        &self,
        identity: &AccountIdentity,
        notification_id: &str,
    ) -> Result<()> {
        let guard = self.accounts.lock().await;
        let account = guard
            .iter()
            .find(|a| a.identity == *identity)
            .ok_or(BeaconError::AccountNotFound)?;
        account
            .notifications()
            .ok_or(BeaconError::AccountNotSynced)?
            .mark_read(notification_id)
            .await
    }

    /// Requests deletion of a notification through the account's write channel.
    pub async fn delete_notification(
        &self,
        identity: &AccountIdentity,
        notification_id: &str,
    ) -> Result<()> {
        let guard = self.accounts.lock().await;
        let account = guard
            .iter()
            .find(|a| a.identity == *identity)
            .ok_or(BeaconError::AccountNotFound)?;
        account
            .notifications()
            .ok_or(BeaconError::AccountNotSynced)?
            .delete(notification_id)
            .await
    }

    /// Snapshot of the converged account identities.
    pub async fn accounts(&self) -> Vec<AccountIdentity> {
        self.accounts
            .lock()
            .await
            .iter()
            .map(|a| a.identity.clone())
            .collect()
    }

    /// Observer stream for account-list changes.
    pub fn subscribe_accounts(&self) -> broadcast::Receiver<AccountsUpdate> {
        self.accounts_stream.subscribe()
    }

    /// Sender half of the inbound event channel, for platform SDK adapters.
    pub fn event_sender(&self) -> Sender<PlatformEvent> {
        self.event_sender.clone()
    }

    /// Serializes the full account list to its settings key (overwritten in
    /// full, identity + credential only) and notifies observers.
    async fn account_list_changed(&self, accounts: &[Account]) -> Result<()> {
        let json = PersistedAccount::encode_list(accounts)?;
        Setting::upsert(ACCOUNTS_KEY, &json, &self.database).await?;

        self.accounts_stream.emit(AccountsUpdate {
            accounts: accounts.iter().map(|a| a.identity.clone()).collect(),
        });
        Ok(())
    }
}
