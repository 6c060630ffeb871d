//! Shared test doubles for the platform seams.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::beacon::accounts::AccountIdentity;
use crate::beacon::notifications::types::NotificationRecord;
use crate::beacon::toast::ToastContent;
use crate::beacon::token_provider::{TokenError, TokenProvider};
use crate::beacon::{Beacon, BeaconConfig};
use crate::platform::{
    NotificationFeed, NotificationPlatform, NotificationRegistration, PlatformError,
    PlatformResult, PushChannel, RegistrationStatus, ToastPresenter,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory notification feed with scripted batches.
#[derive(Default)]
pub(crate) struct MockFeed {
    state: Mutex<MockFeedState>,
}

#[derive(Default)]
struct MockFeedState {
    pending: Vec<NotificationRecord>,
    saved: Vec<NotificationRecord>,
    deleted: Vec<String>,
    subscribed: bool,
    decline_subscribe: bool,
    sync_requests: usize,
}

impl MockFeed {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues records for the next `read_batch` call.
    pub(crate) fn push_batch(&self, records: Vec<NotificationRecord>) {
        lock(&self.state).pending.extend(records);
    }

    pub(crate) fn saved(&self) -> Vec<NotificationRecord> {
        lock(&self.state).saved.clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }

    pub(crate) fn subscribed(&self) -> bool {
        lock(&self.state).subscribed
    }

    pub(crate) fn decline_subscribe(&self) {
        lock(&self.state).decline_subscribe = true;
    }

    pub(crate) fn sync_requests(&self) -> usize {
        lock(&self.state).sync_requests
    }
}

#[async_trait]
impl NotificationFeed for MockFeed {
    async fn subscribe_sync_scopes(&self) -> PlatformResult<bool> {
        let mut state = lock(&self.state);
        if state.decline_subscribe {
            return Ok(false);
        }
        state.subscribed = true;
        Ok(true)
    }

    async fn start_sync(&self) -> PlatformResult<()> {
        lock(&self.state).sync_requests += 1;
        Ok(())
    }

    async fn read_batch(&self, max: u32) -> PlatformResult<Vec<NotificationRecord>> {
        let mut state = lock(&self.state);
        let take = (max as usize).min(state.pending.len());
        Ok(state.pending.drain(..take).collect())
    }

    async fn save(&self, record: &NotificationRecord) -> PlatformResult<()> {
        lock(&self.state).saved.push(record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> PlatformResult<()> {
        lock(&self.state).deleted.push(id.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ToastAction {
    Shown(String),
    Withdrawn(String),
}

/// Toast presenter that records every show/withdraw by tag.
#[derive(Default)]
pub(crate) struct RecordingToasts {
    actions: Mutex<Vec<ToastAction>>,
}

impl RecordingToasts {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn actions(&self) -> Vec<ToastAction> {
        lock(&self.actions).clone()
    }

    /// Tags shown, in order.
    pub(crate) fn shown(&self) -> Vec<String> {
        lock(&self.actions)
            .iter()
            .filter_map(|a| match a {
                ToastAction::Shown(tag) => Some(tag.clone()),
                ToastAction::Withdrawn(_) => None,
            })
            .collect()
    }
}

impl ToastPresenter for RecordingToasts {
    fn show(&self, toast: &ToastContent) {
        lock(&self.actions).push(ToastAction::Shown(toast.tag.clone()));
    }

    fn withdraw(&self, tag: &str) {
        lock(&self.actions).push(ToastAction::Withdrawn(tag.to_string()));
    }
}

/// Fake platform SDK: an in-memory registry plus one [`MockFeed`] per account.
#[derive(Default)]
pub(crate) struct MockPlatform {
    state: Mutex<MockPlatformState>,
}

#[derive(Default)]
struct MockPlatformState {
    remote: Vec<AccountIdentity>,
    removed: Vec<AccountIdentity>,
    registrations: Vec<(AccountIdentity, NotificationRegistration)>,
    registration_status: Option<RegistrationStatus>,
    fail_add_for: Option<String>,
    feeds: HashMap<AccountIdentity, Arc<MockFeed>>,
}

impl MockPlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the platform registry, as if a previous run registered
    /// the account.
    pub(crate) fn seed_remote(&self, identity: AccountIdentity) {
        let mut state = lock(&self.state);
        if !state.remote.contains(&identity) {
            state.remote.push(identity);
        }
    }

    /// Makes `add_account` fail for the given account id.
    pub(crate) fn fail_add_for(&self, id: &str) {
        lock(&self.state).fail_add_for = Some(id.to_string());
    }

    /// Forces every subsequent registration attempt to report this status.
    pub(crate) fn set_registration_status(&self, status: RegistrationStatus) {
        lock(&self.state).registration_status = Some(status);
    }

    pub(crate) fn remote_contains(&self, identity: &AccountIdentity) -> bool {
        lock(&self.state).remote.contains(identity)
    }

    pub(crate) fn removed(&self) -> Vec<AccountIdentity> {
        lock(&self.state).removed.clone()
    }

    pub(crate) fn registrations(&self) -> Vec<(AccountIdentity, NotificationRegistration)> {
        lock(&self.state).registrations.clone()
    }

    /// The feed handed out for this account, if one was ever requested.
    pub(crate) fn feed(&self, identity: &AccountIdentity) -> Option<Arc<MockFeed>> {
        lock(&self.state).feeds.get(identity).cloned()
    }
}

#[async_trait]
impl NotificationPlatform for MockPlatform {
    async fn registered_accounts(&self) -> PlatformResult<Vec<AccountIdentity>> {
        Ok(lock(&self.state).remote.clone())
    }

    async fn add_account(&self, identity: &AccountIdentity) -> PlatformResult<()> {
        let mut state = lock(&self.state);
        if state.fail_add_for.as_deref() == Some(identity.id.as_str()) {
            return Err(PlatformError::Transport(format!(
                "simulated add failure for {}",
                identity.id
            )));
        }
        if !state.remote.contains(identity) {
            state.remote.push(identity.clone());
        }
        Ok(())
    }

    async fn remove_account(&self, identity: &AccountIdentity) -> PlatformResult<()> {
        let mut state = lock(&self.state);
        state.remote.retain(|r| r != identity);
        state.removed.push(identity.clone());
        Ok(())
    }

    async fn create_push_channel(&self) -> PlatformResult<PushChannel> {
        Ok(PushChannel {
            uri: "https://push.localhost/channel".to_string(),
        })
    }

    async fn register_notifications(
        &self,
        identity: &AccountIdentity,
        registration: &NotificationRegistration,
    ) -> PlatformResult<RegistrationStatus> {
        let mut state = lock(&self.state);
        state
            .registrations
            .push((identity.clone(), registration.clone()));
        Ok(state
            .registration_status
            .unwrap_or(RegistrationStatus::Success))
    }

    fn feed_for_account(
        &self,
        identity: &AccountIdentity,
    ) -> PlatformResult<Arc<dyn NotificationFeed>> {
        let mut state = lock(&self.state);
        let feed = state
            .feeds
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(MockFeed::new()))
            .clone();
        Ok(feed)
    }
}

/// Token provider that fabricates tokens deterministically from its inputs.
#[derive(Default)]
pub(crate) struct MockTokenProvider {
    state: Mutex<MockTokenState>,
}

#[derive(Default)]
struct MockTokenState {
    fail_refresh: Option<String>,
    fail_silent: bool,
    fail_interactive: bool,
    silent_calls: Vec<String>,
    interactive_calls: Vec<String>,
}

impl MockTokenProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes refresh-token exchanges fail with this error description.
    pub(crate) fn fail_refresh(&self, description: &str) {
        lock(&self.state).fail_refresh = Some(description.to_string());
    }

    pub(crate) fn fail_silent(&self) {
        lock(&self.state).fail_silent = true;
    }

    pub(crate) fn fail_interactive(&self) {
        lock(&self.state).fail_interactive = true;
    }

    pub(crate) fn silent_calls(&self) -> Vec<String> {
        lock(&self.state).silent_calls.clone()
    }

    pub(crate) fn interactive_calls(&self) -> Vec<String> {
        lock(&self.state).interactive_calls.clone()
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        _scopes: &[String],
    ) -> Result<String, TokenError> {
        if let Some(description) = lock(&self.state).fail_refresh.clone() {
            return Err(TokenError::Rejected { description });
        }
        Ok(format!("access-for-{refresh_token}"))
    }

    async fn exchange_auth_code(
        &self,
        code: &str,
        _code_verifier: &str,
    ) -> Result<String, TokenError> {
        Ok(format!("refresh-for-{code}"))
    }

    async fn acquire_token_silent(
        &self,
        account_id: &str,
        _scope: &str,
    ) -> Result<String, TokenError> {
        let mut state = lock(&self.state);
        state.silent_calls.push(account_id.to_string());
        if state.fail_silent {
            return Err(TokenError::Transport(
                "silent acquisition unavailable".to_string(),
            ));
        }
        Ok(format!("silent-for-{account_id}"))
    }

    async fn acquire_token_interactive(
        &self,
        account_id: &str,
        _scope: &str,
    ) -> Result<String, TokenError> {
        let mut state = lock(&self.state);
        state.interactive_calls.push(account_id.to_string());
        if state.fail_interactive {
            return Err(TokenError::Rejected {
                description: "interactive sign-in declined".to_string(),
            });
        }
        Ok(format!("interactive-for-{account_id}"))
    }
}

/// Builds a Beacon wired to fresh mocks and a temp data directory.
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub(crate) async fn create_mock_beacon() -> (
    Arc<Beacon>,
    Arc<MockPlatform>,
    Arc<MockTokenProvider>,
    Arc<RecordingToasts>,
    TempDir,
) {
    let temp = TempDir::new().expect("failed to create temp directory");
    let config = BeaconConfig::new(temp.path().join("data"), temp.path().join("logs"));

    let platform = Arc::new(MockPlatform::new());
    let tokens = Arc::new(MockTokenProvider::new());
    let toasts = Arc::new(RecordingToasts::new());

    let beacon = Beacon::new(
        config,
        platform.clone(),
        tokens.clone(),
        toasts.clone(),
    )
    .await
    .expect("failed to create test beacon");

    (Arc::new(beacon), platform, tokens, toasts, temp)
}
