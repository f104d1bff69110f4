//! Per-task actions: `preview`, `send`, `deploy`, plus `deploy-status`.

use anyhow::{Context, Result, bail};
use console::style;
use taskbridge::actions::ActionState;
use taskbridge::context::AppContext;
use taskbridge::deploy::DeploymentResult;
use taskbridge::ui::icons::{CHECK, PREVIEW, SEND};
use taskbridge::ui::{Spinner, render};

use super::connect;
use super::tasks::find_task;

/// Title used when deploying without picking a task.
const MANUAL_DEPLOYMENT: &str = "Manual Deployment";

fn failure(state: ActionState) -> anyhow::Error {
    match state {
        ActionState::Failed { kind, message } => anyhow::anyhow!("{} failed: {}", kind, message),
        other => anyhow::anyhow!("unexpected action state: {:?}", other),
    }
}

/// Print the Void message the relay would send for a task.
pub async fn cmd_preview(ctx: &AppContext, id_or_key: &str) -> Result<()> {
    connect(ctx).await?;
    let task = find_task(ctx, id_or_key)?;

    let spinner = Spinner::start(format!("Previewing {}...", task.title()));
    match ctx.actions.preview(ctx.api.as_ref(), &task).await {
        ActionState::Previewed { text } => {
            spinner.clear();
            println!("{}{}", PREVIEW, style("Message preview").bold());
            println!();
            println!("{}", text);
            Ok(())
        }
        other => {
            spinner.failure("Preview failed");
            Err(failure(other))
        }
    }
}

/// Forward a task to Void.
pub async fn cmd_send(ctx: &AppContext, id_or_key: &str) -> Result<()> {
    connect(ctx).await?;
    let task = find_task(ctx, id_or_key)?;

    let spinner = Spinner::start(format!("Sending {} to Void...", task.title()));
    match ctx.actions.send(ctx.api.as_ref(), &task).await {
        ActionState::Sent => {
            spinner.clear();
            println!("{}Sent '{}' to Void", SEND, task.title());
            Ok(())
        }
        other => {
            spinner.failure("Send failed");
            Err(failure(other))
        }
    }
}

/// Deploy for one task, or a manual deployment when no task is given.
pub async fn cmd_deploy(ctx: &AppContext, id_or_key: Option<&str>) -> Result<()> {
    let task = match id_or_key {
        Some(id) => {
            connect(ctx).await?;
            Some(find_task(ctx, id)?)
        }
        None => None,
    };

    let title = task.as_ref().map_or(MANUAL_DEPLOYMENT, |t| t.title());
    let spinner = Spinner::start(format!("Deploying {}...", title));
    let result = match &task {
        Some(task) => {
            ctx.actions
                .deploy(ctx.api.as_ref(), &ctx.deployments, task)
                .await;
            ctx.deployments.last_result()
        }
        None => Some(ctx.deployments.trigger(ctx.api.as_ref(), title).await),
    };
    spinner.clear();

    match result {
        Some(result @ DeploymentResult::Deployed { .. }) => {
            println!("{}", render::deployment_result(&result));
            println!(
                "Status: {}",
                render::deployment_status(ctx.deployments.status())
            );
            Ok(())
        }
        Some(DeploymentResult::Failed { error }) => bail!("Deployment failed: {}", error),
        None => bail!("Deployment finished without a result"),
    }
}

/// Print the relay's deployment readiness checklist.
pub async fn cmd_deploy_status(ctx: &AppContext) -> Result<()> {
    let body = ctx
        .api
        .get_deployment_status()
        .await
        .context("Failed to query deployment readiness")?;

    let ready = body
        .pointer("/status/ready_for_deployment")
        .and_then(serde_json::Value::as_bool);
    print!("{}", render::readiness(&body));
    match ready {
        Some(true) => println!("{}{}", CHECK, style("Ready to deploy").green()),
        Some(false) => println!("{}", style("Not ready to deploy").yellow()),
        None => {}
    }
    Ok(())
}
