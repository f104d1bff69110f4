//! Everything a command needs, wired once at startup.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::ActionBoard;
use crate::api::{RelayApi, RelayClient};
use crate::config::Config;
use crate::deploy::DeploymentTracker;
use crate::session::{PreferredTenant, SessionStore, TenantSelector};
use crate::storage::{CredentialStore, FileStore};

pub struct AppContext {
    pub config: Config,
    pub api: Arc<dyn RelayApi>,
    pub session: SessionStore,
    pub deployments: DeploymentTracker,
    pub actions: ActionBoard,
    login_url: String,
}

impl AppContext {
    /// Build the HTTP client and file-backed store from `config`.
    ///
    /// `fallback_selector` picks the Jira site when the config names none.
    pub fn from_config(config: Config, fallback_selector: Box<dyn TenantSelector>) -> Result<Self> {
        let client = RelayClient::new(&config.base_url).context("Invalid relay configuration")?;
        let login_url = client.login_url();
        let api: Arc<dyn RelayApi> = Arc::new(client);
        let storage: Arc<dyn CredentialStore> = Arc::new(FileStore::new(&config.store_path));
        let selector: Box<dyn TenantSelector> = match &config.tenant {
            Some(tenant) => Box::new(PreferredTenant(tenant.clone())),
            None => fallback_selector,
        };

        let session = SessionStore::new(api.clone(), storage).with_selector(selector);
        let deployments = DeploymentTracker::new(config.deploy_reset_after());
        let actions = ActionBoard::new(config.send_clear_after());
        Ok(Self {
            config,
            api,
            session,
            deployments,
            actions,
            login_url,
        })
    }

    /// Relay endpoint that starts the OAuth flow in a browser.
    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}
