//! Session lifecycle: credentials, profile, and the task cache.
//!
//! A session is connected only when both an access token and a Jira cloud
//! id are present. Token and cloud id are mirrored into a
//! [`CredentialStore`] so they survive restarts; the profile and the task
//! list are always refetched.
//!
//! ```text
//! bootstrap(address)
//!   ├─ ?token=..&cloud_id=..  → persist, load profile + tasks
//!   ├─ ?code=..               → complete_oauth_callback(code)
//!   ├─ stored credentials     → load profile + tasks
//!   └─ nothing                → stay disconnected
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::api::{RelayApi, TenantDescriptor, UserProfile};
use crate::errors::{SessionError, StorageError};
use crate::storage::{CredentialStore, TENANT_KEY, TOKEN_KEY};
use crate::tasks::{Issue, TaskCache};

/// Query parameters the relay uses to hand credentials back.
const TOKEN_PARAM: &str = "token";
const TENANT_PARAM: &str = "cloud_id";
const CODE_PARAM: &str = "code";
const STATE_PARAM: &str = "state";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub access_token: Option<String>,
    pub tenant_id: Option<String>,
    pub profile: Option<UserProfile>,
}

impl Session {
    pub fn connected(&self) -> bool {
        non_empty(&self.access_token) && non_empty(&self.tenant_id)
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Change notifications published on [`SessionStore::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Initial value before anything happened.
    Started,
    Connected { tenant_id: String },
    ProfileLoaded,
    TasksReplaced { count: usize },
    Disconnected,
}

/// Where `bootstrap` found its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapSource {
    Redirect,
    AuthorizationCode,
    Stored,
    None,
}

/// What `bootstrap` did. A load failure is reported here rather than
/// returned, since bootstrap never fails on network errors.
#[derive(Debug)]
pub struct BootstrapReport {
    pub source: BootstrapSource,
    pub connected: bool,
    /// Set when loading failed. If it was an auth rejection the session has
    /// already been logged out.
    pub load_error: Option<SessionError>,
}

/// Picks the active Jira site among the ones a token can reach.
pub trait TenantSelector: Send + Sync {
    fn select<'a>(
        &self,
        tenants: &'a [TenantDescriptor],
    ) -> Result<&'a TenantDescriptor, SessionError>;
}

/// Takes the first accessible site.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstTenant;

impl TenantSelector for FirstTenant {
    fn select<'a>(
        &self,
        tenants: &'a [TenantDescriptor],
    ) -> Result<&'a TenantDescriptor, SessionError> {
        let first = tenants.first().ok_or(SessionError::NoAccessibleResources)?;
        if tenants.len() > 1 {
            warn!(
                count = tenants.len(),
                selected = %first.label(),
                "multiple Jira sites accessible; using the first"
            );
        }
        Ok(first)
    }
}

/// Takes the site whose id or name equals the preference, or whose URL
/// contains it. Names compare case-insensitively.
#[derive(Debug, Clone)]
pub struct PreferredTenant(pub String);

impl PreferredTenant {
    fn matches(&self, tenant: &TenantDescriptor) -> bool {
        let wanted = self.0.as_str();
        tenant.id == wanted
            || tenant
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
            || tenant.url.as_deref().is_some_and(|u| u.contains(wanted))
    }
}

impl TenantSelector for PreferredTenant {
    fn select<'a>(
        &self,
        tenants: &'a [TenantDescriptor],
    ) -> Result<&'a TenantDescriptor, SessionError> {
        if tenants.is_empty() {
            return Err(SessionError::NoAccessibleResources);
        }
        tenants
            .iter()
            .find(|t| self.matches(t))
            .ok_or_else(|| SessionError::TenantNotFound(self.0.clone()))
    }
}

#[derive(Default)]
struct State {
    session: Session,
    tasks: TaskCache,
    /// Bumped whenever credentials change. A refresh that started under an
    /// older epoch drops its result.
    epoch: u64,
}

pub struct SessionStore {
    api: Arc<dyn RelayApi>,
    storage: Arc<dyn CredentialStore>,
    selector: Box<dyn TenantSelector>,
    state: RwLock<State>,
    refresh_gate: Mutex<()>,
    events: watch::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn RelayApi>, storage: Arc<dyn CredentialStore>) -> Self {
        let (events, _rx) = watch::channel(SessionEvent::Started);
        Self {
            api,
            storage,
            selector: Box::new(FirstTenant),
            state: RwLock::new(State::default()),
            refresh_gate: Mutex::new(()),
            events,
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn TenantSelector>) -> Self {
        self.selector = selector;
        self
    }

    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&*state)
    }

    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *state)
    }

    pub fn connected(&self) -> bool {
        self.read(|s| s.session.connected())
    }

    pub fn snapshot(&self) -> Session {
        self.read(|s| s.session.clone())
    }

    pub fn tasks(&self) -> Vec<Issue> {
        self.read(|s| s.tasks.issues().to_vec())
    }

    pub fn task(&self, id_or_key: &str) -> Option<Issue> {
        self.read(|s| s.tasks.find(id_or_key).cloned())
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn credentials(&self) -> Option<(String, String, u64)> {
        self.read(|s| match (&s.session.access_token, &s.session.tenant_id) {
            (Some(token), Some(tenant)) if !token.is_empty() && !tenant.is_empty() => {
                Some((token.clone(), tenant.clone(), s.epoch))
            }
            _ => None,
        })
    }

    /// Persist and adopt a token/tenant pair. Profile and tasks from any
    /// previous session are dropped.
    fn set_credentials(&self, token: &str, tenant_id: &str) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(TENANT_KEY, tenant_id)?;
        self.write(|s| {
            s.session = Session {
                access_token: Some(token.to_string()),
                tenant_id: Some(tenant_id.to_string()),
                profile: None,
            };
            s.tasks.clear();
            s.epoch += 1;
        });
        info!(tenant = tenant_id, "connected to Jira");
        self.events.send_replace(SessionEvent::Connected {
            tenant_id: tenant_id.to_string(),
        });
        Ok(())
    }

    /// Adopt stored credentials without touching the network. Returns
    /// whether both values were present.
    pub fn restore(&self) -> Result<bool, StorageError> {
        let token = self.storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty());
        let tenant = self.storage.get(TENANT_KEY)?.filter(|t| !t.is_empty());
        let (Some(token), Some(tenant)) = (token, tenant) else {
            return Ok(false);
        };
        self.write(|s| {
            s.session.access_token = Some(token);
            s.session.tenant_id = Some(tenant.clone());
            s.epoch += 1;
        });
        debug!(tenant = %tenant, "restored stored credentials");
        self.events
            .send_replace(SessionEvent::Connected { tenant_id: tenant });
        Ok(true)
    }

    /// Establish the session from `address`, stored credentials, or nothing.
    ///
    /// Handoff parameters are removed from `address` whether or not loading
    /// succeeds. Only a storage failure is returned as an error.
    pub async fn bootstrap(&self, address: &mut Url) -> Result<BootstrapReport, StorageError> {
        if let Some(report) = self.accept_handoff(address).await? {
            return Ok(report);
        }

        let (source, loaded) = if self.restore()? {
            (BootstrapSource::Stored, self.load().await)
        } else {
            (BootstrapSource::None, Ok(()))
        };
        self.settle(source, loaded)
    }

    /// Adopt the redirect or authorization-code parameters in `address`,
    /// never falling back to stored credentials.
    ///
    /// Returns `None` when `address` carries no usable handoff; in that case
    /// neither the relay nor the credential store is touched. Handoff
    /// parameters are stripped either way.
    pub async fn accept_handoff(
        &self,
        address: &mut Url,
    ) -> Result<Option<BootstrapReport>, StorageError> {
        let (source, loaded) = match take_handoff_params(address) {
            Handoff {
                token: Some(token),
                tenant_id: Some(tenant_id),
                ..
            } if !token.is_empty() && !tenant_id.is_empty() => {
                self.set_credentials(&token, &tenant_id)?;
                (BootstrapSource::Redirect, self.load().await)
            }
            Handoff {
                code: Some(code), ..
            } if !code.is_empty() => {
                let result = match self.complete_oauth_callback(&code).await {
                    Err(SessionError::Storage(e)) => return Err(e),
                    other => other.map(|_| ()),
                };
                (BootstrapSource::AuthorizationCode, result)
            }
            _ => return Ok(None),
        };
        self.settle(source, loaded).map(Some)
    }

    /// Log out on an auth rejection, log anything else, and report.
    fn settle(
        &self,
        source: BootstrapSource,
        loaded: Result<(), SessionError>,
    ) -> Result<BootstrapReport, StorageError> {
        let load_error = match loaded {
            Ok(()) => None,
            Err(e) if e.is_auth_rejection() => {
                warn!(error = %e, "credentials rejected; logging out");
                self.logout()?;
                Some(e)
            }
            Err(e) => {
                error!(error = %e, "failed to load Jira session data");
                Some(e)
            }
        };

        Ok(BootstrapReport {
            source,
            connected: self.connected(),
            load_error,
        })
    }

    /// Profile first, then tasks.
    pub async fn load(&self) -> Result<(), SessionError> {
        let (token, _, epoch) = self.credentials().ok_or(SessionError::NotConnected)?;

        let profile = self.api.get_user_profile(&token).await?;
        let applied = self.write(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.session.profile = Some(profile);
            true
        });
        if applied {
            debug!("profile loaded");
            self.events.send_replace(SessionEvent::ProfileLoaded);
        }

        self.refresh_tasks().await?;
        Ok(())
    }

    /// Exchange an authorization code and connect to the selected site.
    /// Every failure propagates; nothing is persisted if no site is reachable.
    pub async fn complete_oauth_callback(
        &self,
        code: &str,
    ) -> Result<TenantDescriptor, SessionError> {
        let token = self.api.exchange_code_for_token(code).await?.access_token;
        let resources = self.api.get_accessible_resources(&token).await?;
        if resources.is_empty() {
            return Err(SessionError::NoAccessibleResources);
        }
        let tenant = self.selector.select(&resources)?.clone();

        self.set_credentials(&token, &tenant.id)?;
        self.load().await?;
        Ok(tenant)
    }

    /// Sites reachable with the current token.
    pub async fn accessible_resources(&self) -> Result<Vec<TenantDescriptor>, SessionError> {
        let token = self
            .read(|s| s.session.access_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::NotConnected)?;
        Ok(self.api.get_accessible_resources(&token).await?)
    }

    /// Clear memory and storage. Safe to call repeatedly.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.write(|s| {
            s.session = Session::default();
            s.tasks.clear();
            s.epoch += 1;
        });
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(TENANT_KEY)?;
        info!("logged out of Jira");
        self.events.send_replace(SessionEvent::Disconnected);
        Ok(())
    }

    /// Refetch the task list and replace the cache. Returns the new count.
    ///
    /// Calls are serialized: a second refresh waits for the first to finish
    /// and then issues its own request.
    pub async fn refresh_tasks(&self) -> Result<usize, SessionError> {
        let _gate = self.refresh_gate.lock().await;
        let (token, tenant_id, epoch) = self.credentials().ok_or(SessionError::NotConnected)?;

        let response = self.api.get_user_tasks(&token, &tenant_id).await?;
        let issues = response.issues.unwrap_or_else(|| {
            warn!("task response has no issues field; treating as empty");
            Vec::new()
        });

        let count = issues.len();
        let applied = self.write(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.tasks.replace(issues);
            true
        });
        if !applied {
            debug!("credentials changed during refresh; dropping result");
            return Ok(self.read(|s| s.tasks.len()));
        }

        debug!(count, "tasks replaced");
        self.events
            .send_replace(SessionEvent::TasksReplaced { count });
        Ok(count)
    }
}

#[derive(Debug, Default)]
struct Handoff {
    token: Option<String>,
    tenant_id: Option<String>,
    code: Option<String>,
}

/// Pull the credential handoff parameters out of `address`, keeping any
/// other query parameters in order.
fn take_handoff_params(address: &mut Url) -> Handoff {
    let mut handoff = Handoff::default();
    let mut kept = Vec::new();
    let mut stripped = false;

    for (key, value) in address.query_pairs() {
        match key.as_ref() {
            TOKEN_PARAM => handoff.token = Some(value.into_owned()),
            TENANT_PARAM => handoff.tenant_id = Some(value.into_owned()),
            CODE_PARAM => handoff.code = Some(value.into_owned()),
            STATE_PARAM => {}
            _ => {
                kept.push((key.into_owned(), value.into_owned()));
                continue;
            }
        }
        stripped = true;
    }

    if stripped {
        if kept.is_empty() {
            address.set_query(None);
        } else {
            address.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    handoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        DeploymentOutcome, PreviewResponse, TaskPayload, TasksResponse, TokenResponse,
    };
    use crate::errors::ApiError;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    type Reply = Result<Value, (u16, &'static str)>;

    fn reply<T: serde::de::DeserializeOwned>(r: &Reply) -> Result<T, ApiError> {
        match r {
            Ok(v) => Ok(serde_json::from_value(v.clone()).unwrap()),
            Err((status, message)) => Err(ApiError::Server {
                status: *status,
                message: message.to_string(),
            }),
        }
    }

    struct FakeRelay {
        token: Reply,
        resources: Reply,
        profile: Reply,
        tasks: StdMutex<VecDeque<(Duration, Reply)>>,
        task_calls: StdMutex<Vec<(String, String)>>,
    }

    impl Default for FakeRelay {
        fn default() -> Self {
            Self {
                token: Ok(json!({"access_token": "tok-new"})),
                resources: Ok(json!([{"id": "cloud-1", "name": "acme"}])),
                profile: Ok(json!({"displayName": "Ada"})),
                tasks: StdMutex::new(VecDeque::new()),
                task_calls: StdMutex::new(Vec::new()),
            }
        }
    }

    impl FakeRelay {
        fn with_tasks(self, replies: impl IntoIterator<Item = Reply>) -> Self {
            self.tasks
                .lock()
                .unwrap()
                .extend(replies.into_iter().map(|r| (Duration::ZERO, r)));
            self
        }

        fn task_calls(&self) -> Vec<(String, String)> {
            self.task_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RelayApi for FakeRelay {
        async fn exchange_code_for_token(&self, _: &str) -> Result<TokenResponse, ApiError> {
            reply(&self.token)
        }
        async fn get_accessible_resources(
            &self,
            _: &str,
        ) -> Result<Vec<TenantDescriptor>, ApiError> {
            reply(&self.resources)
        }
        async fn get_user_tasks(
            &self,
            token: &str,
            tenant: &str,
        ) -> Result<TasksResponse, ApiError> {
            self.task_calls
                .lock()
                .unwrap()
                .push((token.to_string(), tenant.to_string()));
            let next = self.tasks.lock().unwrap().pop_front();
            let (delay, r) = next.unwrap_or((Duration::ZERO, Ok(json!({"issues": []}))));
            tokio::time::sleep(delay).await;
            reply(&r)
        }
        async fn get_user_profile(&self, _: &str) -> Result<UserProfile, ApiError> {
            reply(&self.profile)
        }
        async fn send_task_to_void(&self, _: &TaskPayload) -> Result<Value, ApiError> {
            unreachable!()
        }
        async fn preview_void_message(
            &self,
            _: &TaskPayload,
        ) -> Result<PreviewResponse, ApiError> {
            unreachable!()
        }
        async fn trigger_deployment(&self, _: &str) -> Result<DeploymentOutcome, ApiError> {
            unreachable!()
        }
        async fn get_deployment_status(&self) -> Result<Value, ApiError> {
            unreachable!()
        }
    }

    fn store_with(relay: FakeRelay, storage: Arc<MemoryStore>) -> (SessionStore, Arc<FakeRelay>) {
        let relay = Arc::new(relay);
        (SessionStore::new(relay.clone(), storage), relay)
    }

    fn keys(store: &SessionStore) -> Vec<String> {
        store
            .tasks()
            .iter()
            .map(|i| i.key.clone().unwrap_or_default())
            .collect()
    }

    fn home() -> Url {
        Url::parse("http://localhost:5173/").unwrap()
    }

    // ── connected ────────────────────────────────────────────────────

    #[test]
    fn connected_requires_both_values() {
        let mut session = Session::default();
        assert!(!session.connected());
        session.access_token = Some("t".into());
        assert!(!session.connected());
        session.tenant_id = Some(String::new());
        assert!(!session.connected());
        session.tenant_id = Some("c".into());
        assert!(session.connected());
        session.access_token = None;
        assert!(!session.connected());
    }

    // ── bootstrap ────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_bootstrap_stays_disconnected() {
        let (store, relay) = store_with(FakeRelay::default(), Arc::new(MemoryStore::new()));
        store.logout().unwrap();

        let mut address = home();
        let report = store.bootstrap(&mut address).await.unwrap();

        assert_eq!(report.source, BootstrapSource::None);
        assert!(!report.connected);
        assert!(report.load_error.is_none());
        assert_eq!(store.snapshot(), Session::default());
        assert!(relay.task_calls().is_empty());
    }

    #[tokio::test]
    async fn redirect_params_are_adopted_and_stripped() {
        let storage = Arc::new(MemoryStore::new());
        let relay = FakeRelay::default().with_tasks([Ok(json!({"issues": [{"id": "1", "key": "A-1"}]}))]);
        let (store, relay) = store_with(relay, storage.clone());

        let mut address =
            Url::parse("http://localhost:5173/?token=T&cloud_id=C&tab=tasks").unwrap();
        let report = store.bootstrap(&mut address).await.unwrap();

        assert_eq!(report.source, BootstrapSource::Redirect);
        assert!(report.connected);
        let session = store.snapshot();
        assert_eq!(session.access_token.as_deref(), Some("T"));
        assert_eq!(session.tenant_id.as_deref(), Some("C"));
        assert_eq!(session.profile.unwrap().display_name(), "Ada");
        assert_eq!(address.as_str(), "http://localhost:5173/?tab=tasks");
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("T"));
        assert_eq!(storage.get(TENANT_KEY).unwrap().as_deref(), Some("C"));
        assert_eq!(relay.task_calls(), vec![("T".to_string(), "C".to_string())]);
        assert_eq!(keys(&store), vec!["A-1"]);
    }

    #[tokio::test]
    async fn lone_token_param_is_not_a_handoff() {
        let (store, _) = store_with(FakeRelay::default(), Arc::new(MemoryStore::new()));
        let mut address = Url::parse("http://localhost:5173/?token=T").unwrap();
        let report = store.bootstrap(&mut address).await.unwrap();
        assert_eq!(report.source, BootstrapSource::None);
        assert!(!store.connected());
        // Stripped anyway; a half handoff is never kept in the address.
        assert_eq!(address.query(), None);
    }

    #[tokio::test]
    async fn accept_handoff_ignores_stored_credentials() {
        let storage = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "T"), (TENANT_KEY, "C")]));
        let relay = FakeRelay {
            profile: Err((401, "Unauthorized")),
            ..Default::default()
        };
        let (store, relay) = store_with(relay, storage.clone());

        let mut address = Url::parse("http://localhost:5173/?tab=1").unwrap();
        let report = store.accept_handoff(&mut address).await.unwrap();

        assert!(report.is_none());
        assert!(!store.connected());
        assert!(relay.task_calls().is_empty());
        assert_eq!(address.as_str(), "http://localhost:5173/?tab=1");
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("T"));
        assert_eq!(storage.get(TENANT_KEY).unwrap().as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn stored_credentials_are_restored() {
        let storage = Arc::new(MemoryStore::with_entries([
            (TOKEN_KEY, "stored-t"),
            (TENANT_KEY, "stored-c"),
        ]));
        let (store, relay) = store_with(FakeRelay::default(), storage);
        let report = store.bootstrap(&mut home()).await.unwrap();
        assert_eq!(report.source, BootstrapSource::Stored);
        assert!(report.connected);
        assert_eq!(
            relay.task_calls(),
            vec![("stored-t".to_string(), "stored-c".to_string())]
        );
    }

    #[tokio::test]
    async fn orphan_stored_token_is_ignored() {
        let storage = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "t")]));
        let (store, _) = store_with(FakeRelay::default(), storage);
        let report = store.bootstrap(&mut home()).await.unwrap();
        assert_eq!(report.source, BootstrapSource::None);
        assert!(!store.connected());
    }

    #[tokio::test]
    async fn rejected_profile_logs_out_without_error() {
        let storage = Arc::new(MemoryStore::new());
        let relay = FakeRelay {
            profile: Err((401, "Unauthorized")),
            ..Default::default()
        };
        let (store, _) = store_with(relay, storage.clone());

        let mut address = Url::parse("http://localhost:5173/?token=T&cloud_id=C").unwrap();
        let report = store.bootstrap(&mut address).await.unwrap();

        assert!(!report.connected);
        assert!(report.load_error.unwrap().is_auth_rejection());
        assert_eq!(store.snapshot(), Session::default());
        assert!(store.tasks().is_empty());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(TENANT_KEY).unwrap(), None);
        assert_eq!(address.query(), None);
    }

    #[tokio::test]
    async fn wrapped_401_message_also_logs_out() {
        let storage = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "t"), (TENANT_KEY, "c")]));
        let relay = FakeRelay::default().with_tasks([Err((500, "Jira API error: 401"))]);
        let (store, _) = store_with(relay, storage);
        let report = store.bootstrap(&mut home()).await.unwrap();
        assert!(!report.connected);
        assert!(store.snapshot().profile.is_none());
    }

    #[tokio::test]
    async fn other_load_failures_keep_the_session() {
        let storage = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "t"), (TENANT_KEY, "c")]));
        let relay = FakeRelay {
            profile: Err((500, "Failed to get user profile")),
            ..Default::default()
        };
        let (store, _) = store_with(relay, storage.clone());
        let report = store.bootstrap(&mut home()).await.unwrap();

        assert!(report.connected);
        assert_eq!(
            report.load_error.unwrap().to_string(),
            "Failed to get user profile"
        );
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn code_param_runs_the_callback() {
        let storage = Arc::new(MemoryStore::new());
        let (store, relay) = store_with(FakeRelay::default(), storage.clone());

        let mut address = Url::parse("http://localhost:5173/callback?code=abc&state=xyz").unwrap();
        let report = store.bootstrap(&mut address).await.unwrap();

        assert_eq!(report.source, BootstrapSource::AuthorizationCode);
        assert!(report.connected);
        assert_eq!(address.as_str(), "http://localhost:5173/callback");
        assert_eq!(storage.get(TENANT_KEY).unwrap().as_deref(), Some("cloud-1"));
        assert_eq!(
            relay.task_calls(),
            vec![("tok-new".to_string(), "cloud-1".to_string())]
        );
    }

    // ── complete_oauth_callback ──────────────────────────────────────

    #[tokio::test]
    async fn callback_without_sites_persists_nothing() {
        let storage = Arc::new(MemoryStore::new());
        let relay = FakeRelay {
            resources: Ok(json!([])),
            ..Default::default()
        };
        let (store, _) = store_with(relay, storage.clone());

        let err = store.complete_oauth_callback("abc").await.unwrap_err();
        assert!(matches!(err, SessionError::NoAccessibleResources));
        assert!(!store.connected());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn callback_propagates_exchange_failure() {
        let relay = FakeRelay {
            token: Err((400, "Invalid authorization code")),
            ..Default::default()
        };
        let (store, _) = store_with(relay, Arc::new(MemoryStore::new()));
        let err = store.complete_oauth_callback("bad").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid authorization code");
    }

    #[tokio::test]
    async fn preferred_tenant_is_selected() {
        let relay = FakeRelay {
            resources: Ok(json!([
                {"id": "c-1", "name": "first"},
                {"id": "c-2", "name": "Second", "url": "https://second.atlassian.net"}
            ])),
            ..Default::default()
        };
        let relay = Arc::new(relay);
        let store = SessionStore::new(relay.clone(), Arc::new(MemoryStore::new()))
            .with_selector(Box::new(PreferredTenant("second".to_string())));

        let tenant = store.complete_oauth_callback("abc").await.unwrap();
        assert_eq!(tenant.id, "c-2");
        assert_eq!(store.snapshot().tenant_id.as_deref(), Some("c-2"));
    }

    #[test]
    fn preferred_tenant_matches_url_fragment_and_reports_misses() {
        let tenants: Vec<TenantDescriptor> = serde_json::from_value(json!([
            {"id": "c-1", "url": "https://acme.atlassian.net"}
        ]))
        .unwrap();
        let found = PreferredTenant("acme.atlassian".into()).select(&tenants).unwrap();
        assert_eq!(found.id, "c-1");
        let err = PreferredTenant("nope".into()).select(&tenants).unwrap_err();
        assert!(matches!(err, SessionError::TenantNotFound(name) if name == "nope"));
    }

    #[test]
    fn first_tenant_on_empty_list() {
        assert!(matches!(
            FirstTenant.select(&[]),
            Err(SessionError::NoAccessibleResources)
        ));
    }

    // ── refresh_tasks ────────────────────────────────────────────────

    async fn connected_store(relay: FakeRelay) -> (SessionStore, Arc<FakeRelay>) {
        let storage = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "t"), (TENANT_KEY, "c")]));
        let pair = store_with(relay, storage);
        assert!(pair.0.restore().unwrap());
        pair
    }

    #[tokio::test]
    async fn refresh_replaces_cache_in_order() {
        let (store, _) = connected_store(FakeRelay::default().with_tasks([Ok(json!({
            "issues": [{"id": "1", "key": "A"}, {"id": "2", "key": "B"}]
        }))]))
        .await;
        assert_eq!(store.refresh_tasks().await.unwrap(), 2);
        assert_eq!(keys(&store), vec!["A", "B"]);
        assert_eq!(store.task("b").unwrap().id, "2");
    }

    #[tokio::test]
    async fn missing_issues_field_yields_empty_list() {
        let (store, _) = connected_store(
            FakeRelay::default().with_tasks([
                Ok(json!({"issues": [{"id": "1"}]})),
                Ok(json!({})),
            ]),
        )
        .await;
        store.refresh_tasks().await.unwrap();
        assert_eq!(store.refresh_tasks().await.unwrap(), 0);
        assert!(store.tasks().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_leaves_cache_unchanged() {
        let (store, _) = connected_store(FakeRelay::default().with_tasks([
            Ok(json!({"issues": [{"id": "1", "key": "A"}]})),
            Err((502, "Failed to get user tasks")),
        ]))
        .await;
        store.refresh_tasks().await.unwrap();
        let err = store.refresh_tasks().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to get user tasks");
        assert_eq!(keys(&store), vec!["A"]);
    }

    #[tokio::test]
    async fn refresh_while_disconnected_fails() {
        let (store, relay) = store_with(FakeRelay::default(), Arc::new(MemoryStore::new()));
        assert!(matches!(
            store.refresh_tasks().await,
            Err(SessionError::NotConnected)
        ));
        assert!(relay.task_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_apply_in_call_order() {
        let relay = FakeRelay::default();
        relay.tasks.lock().unwrap().extend([
            (
                Duration::from_millis(500),
                Ok(json!({"issues": [{"id": "1", "key": "SLOW"}]})),
            ),
            (
                Duration::from_millis(10),
                Ok(json!({"issues": [{"id": "2", "key": "FAST"}]})),
            ),
        ]);
        let (store, _) = connected_store(relay).await;

        let (first, second) = tokio::join!(store.refresh_tasks(), store.refresh_tasks());
        first.unwrap();
        second.unwrap();
        assert_eq!(keys(&store), vec!["FAST"]);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_result_is_dropped_after_logout() {
        let relay = FakeRelay::default();
        relay.tasks.lock().unwrap().push_back((
            Duration::from_millis(100),
            Ok(json!({"issues": [{"id": "1"}]})),
        ));
        let (store, _) = connected_store(relay).await;

        let refresh = store.refresh_tasks();
        let logout = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.logout().unwrap();
        };
        let (count, ()) = tokio::join!(refresh, logout);
        assert_eq!(count.unwrap(), 0);
        assert!(store.tasks().is_empty());
        assert!(!store.connected());
    }

    // ── logout / events ──────────────────────────────────────────────

    #[tokio::test]
    async fn logout_is_idempotent_and_notifies() {
        let (store, _) = connected_store(FakeRelay::default()).await;
        let mut rx = store.subscribe();
        store.logout().unwrap();
        store.logout().unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionEvent::Disconnected);
        assert!(!store.connected());
    }

    #[tokio::test]
    async fn events_follow_the_load_sequence() {
        let (store, _) = connected_store(FakeRelay::default()).await;
        let mut rx = store.subscribe();
        store.load().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            SessionEvent::TasksReplaced { count: 0 }
        );
    }

    #[test]
    fn handoff_keeps_unrelated_params() {
        let mut address = Url::parse("http://h/p?a=1&code=x&state=s&b=2").unwrap();
        let handoff = take_handoff_params(&mut address);
        assert_eq!(handoff.code.as_deref(), Some("x"));
        assert_eq!(address.as_str(), "http://h/p?a=1&b=2");

        let mut untouched = Url::parse("http://h/p?a=1").unwrap();
        take_handoff_params(&mut untouched);
        assert_eq!(untouched.as_str(), "http://h/p?a=1");
    }
}
