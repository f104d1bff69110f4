//! Deployment trigger and the global deployment status.
//!
//! ```text
//! none --begin--> deploying --ok--> success --(reset delay)--> none
//!                     |
//!                     +--fail--> error
//! success / error --dismiss--> none   (cancels a pending reset)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::RelayApi;

pub const DEFAULT_RESET_AFTER: Duration = Duration::from_secs(5);
const DEFAULT_PLATFORM: &str = "Vercel";

/// Global deployment status shared by every task.
///
/// `none -> deploying -> success -> (reset) none`, or `deploying -> error`
/// until dismissed or the next deployment starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// No deployment in flight and nothing to report.
    #[default]
    None,
    Deploying,
    /// Last deployment succeeded; resets to `None` after the reset delay.
    Success,
    /// Last deployment failed; stays until dismissed.
    Error,
}

/// Result of one deployment attempt, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentResult {
    Deployed {
        url: Option<String>,
        message: Option<String>,
        platform: String,
    },
    Failed {
        error: String,
    },
}

struct Inner {
    status: watch::Sender<DeploymentStatus>,
    /// Bumped on every transition; a reset timer only fires if the
    /// generation it captured is still current.
    generation: AtomicU64,
    reset_after: Duration,
    last: Mutex<Option<DeploymentResult>>,
}

/// Shared, cloneable handle to the deployment status.
#[derive(Clone)]
pub struct DeploymentTracker {
    inner: Arc<Inner>,
}

impl Default for DeploymentTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_AFTER)
    }
}

impl DeploymentTracker {
    /// A tracker that returns from `success` to `none` after `reset_after`.
    pub fn new(reset_after: Duration) -> Self {
        let (status, _rx) = watch::channel(DeploymentStatus::None);
        Self {
            inner: Arc::new(Inner {
                status,
                generation: AtomicU64::new(0),
                reset_after,
                last: Mutex::new(None),
            }),
        }
    }

    pub fn status(&self) -> DeploymentStatus {
        *self.inner.status.borrow()
    }

    /// Receiver that observes every status transition.
    pub fn subscribe(&self) -> watch::Receiver<DeploymentStatus> {
        self.inner.status.subscribe()
    }

    /// Outcome of the most recent finished deployment.
    pub fn last_result(&self) -> Option<DeploymentResult> {
        self.inner
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn transition(&self, next: DeploymentStatus) -> u64 {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.status.send_replace(next);
        generation
    }

    /// Enter `deploying`, cancelling any pending reset.
    pub fn begin(&self) {
        self.transition(DeploymentStatus::Deploying);
    }

    /// Enter `error`.
    pub fn fail(&self) {
        self.transition(DeploymentStatus::Error);
    }

    /// Enter `success` and schedule the automatic reset.
    pub fn succeed(&self) {
        let generation = self.transition(DeploymentStatus::Success);
        self.schedule_reset(generation);
    }

    /// User dismissal: back to `none`, cancelling any pending reset.
    pub fn dismiss(&self) {
        self.transition(DeploymentStatus::None);
    }

    fn schedule_reset(&self, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; deployment status will not auto-reset");
            return;
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.reset_after;
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.generation.load(Ordering::SeqCst) == generation {
                inner.status.send_replace(DeploymentStatus::None);
            }
        });
    }

    fn record(&self, result: &DeploymentResult) {
        *self.inner.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
    }

    /// POST a deployment for `task_title` and drive the status through it.
    /// Never fails; errors come back as `DeploymentResult::Failed`.
    pub async fn trigger(&self, api: &dyn RelayApi, task_title: &str) -> DeploymentResult {
        self.begin();
        info!(task = task_title, "deployment requested");

        let result = match api.trigger_deployment(task_title).await {
            Ok(outcome) if outcome.success => DeploymentResult::Deployed {
                url: outcome.deployed_url,
                message: outcome.message,
                platform: outcome
                    .platform
                    .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            },
            Ok(outcome) => DeploymentResult::Failed {
                error: outcome
                    .error
                    .unwrap_or_else(|| "Deployment failed".to_string()),
            },
            Err(e) => DeploymentResult::Failed {
                error: e.to_string(),
            },
        };

        match &result {
            DeploymentResult::Deployed { url, .. } => {
                info!(url = url.as_deref().unwrap_or("-"), "deployment succeeded");
                self.record(&result);
                self.succeed();
            }
            DeploymentResult::Failed { error } => {
                warn!(%error, "deployment failed");
                self.record(&result);
                self.fail();
            }
        }
        result
    }
}
