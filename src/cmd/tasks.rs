//! Task listing commands: `tasks`, `show`.

use anyhow::{Result, anyhow};
use taskbridge::context::AppContext;
use taskbridge::tasks::Issue;
use taskbridge::ui::render;

use super::connect;

/// List the assigned tasks, as a table or as JSON.
pub async fn cmd_tasks(ctx: &AppContext, json: bool) -> Result<()> {
    connect(ctx).await?;
    let tasks = ctx.session.tasks();

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    } else {
        print!("{}", render::task_list(&tasks));
    }
    Ok(())
}

/// Print one task, including its extracted description.
pub async fn cmd_show(ctx: &AppContext, id_or_key: &str) -> Result<()> {
    connect(ctx).await?;
    let task = find_task(ctx, id_or_key)?;
    print!("{}", render::task_detail(&task));
    Ok(())
}

/// Look up a cached task by id or key (case-insensitive key match).
pub(crate) fn find_task(ctx: &AppContext, id_or_key: &str) -> Result<Issue> {
    ctx.session.task(id_or_key).ok_or_else(|| {
        anyhow!(
            "No assigned task matches '{}'. Run 'taskbridge tasks' to list them.",
            id_or_key
        )
    })
}
