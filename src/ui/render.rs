//! Plain-text rendering of tasks, profiles, and deployment results.
//!
//! Functions return `String`s so commands decide where output goes and
//! tests can inspect it. Styling comes from `console::style`, which drops
//! colors automatically when stdout is not a terminal.

use console::{StyledObject, style};
use serde_json::Value;

use crate::api::{TenantDescriptor, UserProfile};
use crate::deploy::{DeploymentResult, DeploymentStatus};
use crate::session::Session;
use crate::tasks::{Issue, PriorityLevel, StatusCategory};
use crate::ui::icons::{CHECK, CROSS, KEY, LINK, ROCKET, SITE, TASK, USER, WARN};

const SUMMARY_WIDTH: usize = 60;

/// Shorten `text` to at most `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn status_badge(issue: &Issue) -> StyledObject<String> {
    let name = issue.status_name().unwrap_or("Unknown").to_string();
    match issue.status_category() {
        StatusCategory::Todo => style(name).blue(),
        StatusCategory::InProgress => style(name).yellow(),
        StatusCategory::Done => style(name).green(),
        StatusCategory::Other | StatusCategory::Unknown => style(name).dim(),
    }
}

fn priority_badge(issue: &Issue) -> StyledObject<String> {
    let name = issue.priority_name().unwrap_or("None").to_string();
    match issue.priority_level() {
        PriorityLevel::High => style(name).red().bold(),
        PriorityLevel::Medium => style(name).yellow(),
        PriorityLevel::Low => style(name).green(),
        PriorityLevel::Other | PriorityLevel::Unknown => style(name).dim(),
    }
}

/// One line per task: key, status, priority, summary.
pub fn task_line(issue: &Issue) -> String {
    format!(
        "{}{:<10} [{}] [{}] {}",
        TASK,
        style(issue.key.as_deref().unwrap_or(&issue.id)).bold(),
        status_badge(issue),
        priority_badge(issue),
        truncate(issue.title(), SUMMARY_WIDTH)
    )
}

pub fn task_list(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return format!("{}", style("No tasks assigned to you.").dim());
    }
    let mut out = format!("{} task(s)\n", issues.len());
    for issue in issues {
        out.push_str(&task_line(issue));
        out.push('\n');
    }
    out
}

/// Full detail view used by `show`.
pub fn task_detail(issue: &Issue) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        style(issue.key.as_deref().unwrap_or(&issue.id)).bold().cyan(),
        style(issue.title()).bold()
    ));
    out.push_str(&format!("  Type:     {}\n", issue.issue_type()));
    out.push_str(&format!("  Status:   {}\n", status_badge(issue)));
    out.push_str(&format!("  Priority: {}\n", priority_badge(issue)));
    out.push_str(&format!("  Assignee: {}\n", issue.assignee_label()));

    let components = issue.component_names();
    if !components.is_empty() {
        out.push_str(&format!("  Components: {}\n", components.join(", ")));
    }
    if !issue.fields.labels.is_empty() {
        out.push_str(&format!("  Labels:   {}\n", issue.fields.labels.join(", ")));
    }

    out.push('\n');
    for line in issue.description().lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

pub fn profile_summary(profile: &UserProfile) -> String {
    let mut out = format!("{}{}\n", USER, style(profile.display_name()).bold());
    let rows = [
        ("Email", profile.email()),
        ("Account", profile.account_id()),
        ("Locale", profile.locale()),
        ("Timezone", profile.timezone()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            out.push_str(&format!("  {:<9} {}\n", format!("{}:", label), value));
        }
    }
    out
}

pub fn session_summary(session: &Session) -> String {
    if !session.connected() {
        return format!("{}Not connected to Jira", CROSS);
    }
    let mut out = format!(
        "{}{}\n{}Site: {}\n",
        KEY,
        style("Connected to Jira").green().bold(),
        SITE,
        session.tenant_id.as_deref().unwrap_or_default()
    );
    if let Some(profile) = &session.profile {
        out.push_str(&profile_summary(profile));
    }
    out
}

pub fn tenant_line(tenant: &TenantDescriptor) -> String {
    format!("{}{}  {}", SITE, style(&tenant.id).dim(), tenant.label())
}

pub fn deployment_result(result: &DeploymentResult) -> String {
    match result {
        DeploymentResult::Deployed {
            url,
            message,
            platform,
        } => {
            let mut out = format!(
                "{}{}",
                ROCKET,
                style(format!("Deployed to {}", platform)).green().bold()
            );
            if let Some(message) = message {
                out.push_str(&format!("\n  {}", message));
            }
            if let Some(url) = url {
                out.push_str(&format!("\n  {}{}", LINK, style(url).underlined()));
            }
            out
        }
        DeploymentResult::Failed { error } => {
            format!("{}{}", CROSS, style(format!("Deployment failed: {}", error)).red())
        }
    }
}

pub fn deployment_status(status: DeploymentStatus) -> String {
    match status {
        DeploymentStatus::None => format!("{}", style("idle").dim()),
        DeploymentStatus::Deploying => format!("{}", style("deploying").yellow()),
        DeploymentStatus::Success => format!("{}", style("success").green()),
        DeploymentStatus::Error => format!("{}", style("error").red()),
    }
}

/// Readiness checklist from `/api/deploy/status`.
///
/// The relay answers `{success, status: {<flag>: bool, ...}}`; unknown
/// shapes are pretty-printed as JSON.
pub fn readiness(body: &Value) -> String {
    let Some(flags) = body.get("status").and_then(Value::as_object) else {
        return serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
    };

    let mut out = String::new();
    for (name, value) in flags {
        let label = name.replace('_', " ");
        match value.as_bool() {
            Some(true) => out.push_str(&format!("{}{}\n", CHECK, label)),
            Some(false) => out.push_str(&format!("{}{}\n", WARN, style(label).yellow())),
            None => out.push_str(&format!("   {}: {}\n", label, value)),
        }
    }
    out
}
