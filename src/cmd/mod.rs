//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                      |
//! |-----------|-------------------------------------------------------|
//! | `auth`    | `Login`, `Callback`, `Logout`, `Status`, `Resources`  |
//! | `tasks`   | `Tasks`, `Show`                                       |
//! | `actions` | `Preview`, `Send`, `Deploy`, `DeployStatus`           |
//! | `config`  | `Config`                                              |

pub mod actions;
pub mod auth;
pub mod config;
pub mod tasks;

pub use actions::{cmd_deploy, cmd_deploy_status, cmd_preview, cmd_send};
pub use auth::{PromptTenant, cmd_callback, cmd_login, cmd_logout, cmd_resources, cmd_status};
pub use config::{cmd_config, cmd_config_init};
pub use tasks::{cmd_show, cmd_tasks};

use anyhow::{Result, bail};
use reqwest::Url;
use taskbridge::context::AppContext;
use taskbridge::ui::Spinner;

/// Address used when no redirect URL is involved.
const CLI_ADDRESS: &str = "taskbridge://cli/";

/// Bootstrap from stored credentials and fail unless the session is live.
pub(crate) async fn connect(ctx: &AppContext) -> Result<()> {
    let mut address = Url::parse(CLI_ADDRESS)?;
    let spinner = Spinner::start("Loading Jira session...");
    let report = ctx.session.bootstrap(&mut address).await?;
    spinner.clear();

    match report.load_error {
        Some(e) if e.is_auth_rejection() => {
            bail!("Jira rejected the stored token ({}). Run 'taskbridge login' again.", e)
        }
        Some(e) => Err(e.into()),
        None if !report.connected => {
            bail!("Not connected to Jira. Run 'taskbridge login' first.")
        }
        None => Ok(()),
    }
}
