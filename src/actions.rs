//! Per-task preview / send / deploy actions.
//!
//! Each task id owns one [`ActionState`]. Actions on one task never touch
//! another task's state; only `deploy` also drives the global
//! [`DeploymentTracker`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::RelayApi;
use crate::deploy::{DeploymentResult, DeploymentTracker};
use crate::tasks::Issue;

pub const DEFAULT_SEND_CLEAR_AFTER: Duration = Duration::from_secs(3);

/// Which of the three task actions a state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Preview,
    Send,
    Deploy,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Preview => write!(f, "preview"),
            ActionKind::Send => write!(f, "send"),
            ActionKind::Deploy => write!(f, "deploy"),
        }
    }
}

/// What the user sees for one task.
///
/// Serialized with a `state` tag, e.g. `{"state":"previewed","text":"..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ActionState {
    /// Nothing in flight and nothing to show.
    #[default]
    Idle,
    /// A relay call for `kind` is in flight.
    Loading {
        kind: ActionKind,
    },
    /// The Void message the relay would send for this task.
    Previewed {
        text: String,
    },
    /// Forwarded to Void. Falls back to `Idle` after the send-clear delay.
    Sent,
    /// The relay reported a successful deployment.
    Deployed {
        url: Option<String>,
        message: Option<String>,
    },
    /// The action failed; `message` is the relay's error or a fallback.
    Failed {
        kind: ActionKind,
        message: String,
    },
}

#[derive(Debug, Default)]
struct Slot {
    state: ActionState,
    generation: u64,
}

struct Inner {
    slots: Mutex<HashMap<String, Slot>>,
    send_clear_after: Duration,
}

impl Inner {
    fn set(&self, task_id: &str, state: ActionState) -> u64 {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(task_id.to_string()).or_default();
        slot.generation += 1;
        slot.state = state;
        slot.generation
    }
}

/// Action states keyed by task id.
///
/// The board never returns errors from an action: a failure is recorded as
/// [`ActionState::Failed`] for that task and returned, so callers can render
/// it like any other state.
pub struct ActionBoard {
    inner: Arc<Inner>,
}

impl Default for ActionBoard {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_CLEAR_AFTER)
    }
}

impl ActionBoard {
    /// Create an empty board. A `Sent` state clears after `send_clear_after`.
    pub fn new(send_clear_after: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                send_clear_after,
            }),
        }
    }

    /// Current state for `task_id`; `Idle` for tasks never acted on.
    pub fn state(&self, task_id: &str) -> ActionState {
        let slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(task_id)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    /// Back to idle. Cancels a pending send clear.
    pub fn reset(&self, task_id: &str) {
        self.inner.set(task_id, ActionState::Idle);
    }

    /// Ask the relay what would be sent to Void for `task`.
    ///
    /// Moves the task to `Loading`, then to `Previewed` or `Failed`.
    pub async fn preview(&self, api: &dyn RelayApi, task: &Issue) -> ActionState {
        let id = task.handle();
        self.inner.set(
            id,
            ActionState::Loading {
                kind: ActionKind::Preview,
            },
        );

        let next = match api.preview_void_message(&task.payload()).await {
            Ok(response) => ActionState::Previewed {
                text: response.preview,
            },
            Err(e) => failed(ActionKind::Preview, id, e.to_string()),
        };
        self.inner.set(id, next.clone());
        next
    }

    /// Forward `task` to Void.
    ///
    /// Moves the task to `Loading`, then to `Sent` or `Failed`. `Sent` is
    /// cleared back to `Idle` after the send-clear delay unless another
    /// action on the same task happens first.
    pub async fn send(&self, api: &dyn RelayApi, task: &Issue) -> ActionState {
        let id = task.handle();
        self.inner.set(
            id,
            ActionState::Loading {
                kind: ActionKind::Send,
            },
        );

        match api.send_task_to_void(&task.payload()).await {
            Ok(_) => {
                let generation = self.inner.set(id, ActionState::Sent);
                self.schedule_clear(id, generation);
                ActionState::Sent
            }
            Err(e) => {
                let next = failed(ActionKind::Send, id, e.to_string());
                self.inner.set(id, next.clone());
                next
            }
        }
    }

    /// Trigger a deployment titled after `task`.
    ///
    /// Besides this task's own state, drives `tracker` through
    /// `deploying` and on to `success` or `error`.
    pub async fn deploy(
        &self,
        api: &dyn RelayApi,
        tracker: &DeploymentTracker,
        task: &Issue,
    ) -> ActionState {
        let id = task.handle();
        self.inner.set(
            id,
            ActionState::Loading {
                kind: ActionKind::Deploy,
            },
        );

        let next = match tracker.trigger(api, task.title()).await {
            DeploymentResult::Deployed { url, message, .. } => {
                ActionState::Deployed { url, message }
            }
            DeploymentResult::Failed { error } => failed(ActionKind::Deploy, id, error),
        };
        self.inner.set(id, next.clone());
        next
    }

    /// The spawned timer holds only a `Weak`, so dropping the board cancels it.
    fn schedule_clear(&self, task_id: &str, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; sent state will not clear");
            return;
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.send_clear_after;
        let task_id = task_id.to_string();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut slots = inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get_mut(&task_id) {
                if slot.generation == generation {
                    debug!(task = %task_id, "clearing sent state");
                    slot.state = ActionState::Idle;
                }
            }
        });
    }
}

fn failed(kind: ActionKind, task_id: &str, message: String) -> ActionState {
    warn!(%kind, task = task_id, error = %message, "task action failed");
    ActionState::Failed { kind, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        DeploymentOutcome, PreviewResponse, TaskPayload, TasksResponse, TenantDescriptor,
        TokenResponse, UserProfile,
    };
    use crate::deploy::DeploymentStatus;
    use crate::errors::ApiError;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    #[derive(Default)]
    struct VoidRelay {
        fail: bool,
        payloads: Mutex<Vec<TaskPayload>>,
    }

    impl VoidRelay {
        fn outcome<T>(&self, ok: T, message: &str) -> Result<T, ApiError> {
            if self.fail {
                Err(ApiError::Server {
                    status: 500,
                    message: message.to_string(),
                })
            } else {
                Ok(ok)
            }
        }
    }

    #[async_trait]
    impl RelayApi for VoidRelay {
        async fn exchange_code_for_token(&self, _: &str) -> Result<TokenResponse, ApiError> {
            unreachable!()
        }
        async fn get_accessible_resources(
            &self,
            _: &str,
        ) -> Result<Vec<TenantDescriptor>, ApiError> {
            unreachable!()
        }
        async fn get_user_tasks(&self, _: &str, _: &str) -> Result<TasksResponse, ApiError> {
            unreachable!()
        }
        async fn get_user_profile(&self, _: &str) -> Result<UserProfile, ApiError> {
            unreachable!()
        }
        async fn send_task_to_void(&self, payload: &TaskPayload) -> Result<Value, ApiError> {
            self.payloads.lock().unwrap().push(payload.clone());
            self.outcome(json!({"success": true}), "Failed to send task to Void")
        }
        async fn preview_void_message(
            &self,
            payload: &TaskPayload,
        ) -> Result<PreviewResponse, ApiError> {
            self.outcome(
                PreviewResponse {
                    preview: format!("Task: {}", payload.title),
                },
                "Failed to preview message",
            )
        }
        async fn trigger_deployment(&self, _: &str) -> Result<DeploymentOutcome, ApiError> {
            self.outcome(
                DeploymentOutcome {
                    success: true,
                    deployed_url: Some("https://app.example".to_string()),
                    ..Default::default()
                },
                "Deployment failed",
            )
        }
        async fn get_deployment_status(&self) -> Result<Value, ApiError> {
            unreachable!()
        }
    }

    fn issue(id: &str, summary: &str) -> Issue {
        serde_json::from_value(json!({
            "id": id,
            "fields": {"summary": summary, "description": "body"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn preview_sets_text_for_that_task_only() {
        let board = ActionBoard::default();
        let relay = VoidRelay::default();
        let state = board.preview(&relay, &issue("1", "Fix login")).await;

        assert_eq!(
            state,
            ActionState::Previewed {
                text: "Task: Fix login".to_string()
            }
        );
        assert_eq!(board.state("1"), state);
        assert_eq!(board.state("2"), ActionState::Idle);
    }

    #[tokio::test]
    async fn preview_failure_is_recorded() {
        let board = ActionBoard::default();
        let relay = VoidRelay {
            fail: true,
            ..Default::default()
        };
        let state = board.preview(&relay, &issue("1", "x")).await;
        assert_eq!(
            state,
            ActionState::Failed {
                kind: ActionKind::Preview,
                message: "Failed to preview message".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sent_clears_after_three_seconds() {
        let board = ActionBoard::default();
        let relay = VoidRelay::default();
        let task = issue("7", "Ship it");

        assert_eq!(board.send(&relay, &task).await, ActionState::Sent);
        assert_eq!(
            relay.payloads.lock().unwrap()[0],
            TaskPayload {
                title: "Ship it".to_string(),
                description: "body".to_string()
            }
        );

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(board.state("7"), ActionState::Sent);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(board.state("7"), ActionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn later_action_survives_stale_clear() {
        let board = ActionBoard::default();
        let relay = VoidRelay::default();
        let task = issue("7", "Ship it");

        board.send(&relay, &task).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        board.preview(&relay, &task).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(matches!(board.state("7"), ActionState::Previewed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_does_not_clear() {
        let board = ActionBoard::default();
        let relay = VoidRelay {
            fail: true,
            ..Default::default()
        };
        board.send(&relay, &issue("1", "x")).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(matches!(
            board.state("1"),
            ActionState::Failed {
                kind: ActionKind::Send,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_clear_does_not_keep_board_alive() {
        let board = ActionBoard::default();
        board.send(&VoidRelay::default(), &issue("1", "x")).await;
        let inner = Arc::downgrade(&board.inner);
        assert_eq!(inner.strong_count(), 1);

        drop(board);
        assert!(inner.upgrade().is_none());

        // The timer wakes, finds the board gone and exits.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(inner.upgrade().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_drives_global_status() {
        let board = ActionBoard::default();
        let tracker = DeploymentTracker::default();
        let state = board
            .deploy(&VoidRelay::default(), &tracker, &issue("3", "Release"))
            .await;

        assert_eq!(
            state,
            ActionState::Deployed {
                url: Some("https://app.example".to_string()),
                message: None
            }
        );
        assert_eq!(tracker.status(), DeploymentStatus::Success);
        assert_eq!(board.state("1"), ActionState::Idle);
    }

    #[tokio::test]
    async fn deploy_failure_marks_task_and_tracker() {
        let board = ActionBoard::default();
        let tracker = DeploymentTracker::default();
        let relay = VoidRelay {
            fail: true,
            ..Default::default()
        };
        let state = board.deploy(&relay, &tracker, &issue("3", "Release")).await;
        assert_eq!(
            state,
            ActionState::Failed {
                kind: ActionKind::Deploy,
                message: "Deployment failed".to_string()
            }
        );
        assert_eq!(tracker.status(), DeploymentStatus::Error);
    }

    #[test]
    fn reset_returns_to_idle() {
        let board = ActionBoard::default();
        board.inner.set("1", ActionState::Sent);
        board.reset("1");
        assert_eq!(board.state("1"), ActionState::Idle);
    }
}
