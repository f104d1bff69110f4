//! Sign-in commands: `login`, `callback`, `logout`, `status`, `resources`.

use std::io::IsTerminal;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::{Select, theme::ColorfulTheme};
use reqwest::Url;
use taskbridge::api::TenantDescriptor;
use taskbridge::context::AppContext;
use taskbridge::errors::SessionError;
use taskbridge::session::{FirstTenant, TenantSelector};
use taskbridge::ui::icons::{CHECK, KEY, SPARKLE};
use taskbridge::ui::{Spinner, render};

/// Asks which Jira site to use when several are reachable and a terminal
/// is attached; otherwise takes the first.
pub struct PromptTenant;

impl TenantSelector for PromptTenant {
    fn select<'a>(
        &self,
        tenants: &'a [TenantDescriptor],
    ) -> Result<&'a TenantDescriptor, SessionError> {
        if tenants.len() <= 1 || !std::io::stdin().is_terminal() {
            return FirstTenant.select(tenants);
        }

        let labels: Vec<String> = tenants.iter().map(TenantDescriptor::label).collect();
        let index = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Which Jira site should taskbridge use?")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| SessionError::TenantSelection(e.to_string()))?;
        Ok(&tenants[index])
    }
}

/// Print the relay login URL and open it unless `no_open` is set.
pub fn cmd_login(ctx: &AppContext, no_open: bool) -> Result<()> {
    let url = ctx.login_url();
    println!("{}Sign in to Jira at:", KEY);
    println!("  {}", style(url).underlined());
    println!();

    if !no_open {
        if let Err(e) = open::that(url) {
            eprintln!("Could not open a browser ({}); open the URL manually.", e);
        }
    }

    println!(
        "After approving access, run {} with the URL you were redirected to.",
        style("taskbridge callback <url>").bold()
    );
    Ok(())
}

/// Accepts the full redirect URL (`?token=..&cloud_id=..` or `?code=..`)
/// or a bare authorization code.
pub async fn cmd_callback(ctx: &AppContext, input: &str) -> Result<()> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Expected a redirect URL or an authorization code");
    }

    let Ok(mut address) = Url::parse(input) else {
        let spinner = Spinner::start("Exchanging authorization code...");
        let tenant = match ctx.session.complete_oauth_callback(input).await {
            Ok(tenant) => tenant,
            Err(e) => {
                spinner.failure("Sign-in failed");
                return Err(e).context("Failed to complete Jira sign-in");
            }
        };
        spinner.success(format!("Connected to {}", tenant.label()));
        print_connected(ctx);
        return Ok(());
    };

    let spinner = Spinner::start("Completing sign-in...");
    let Some(report) = ctx.session.accept_handoff(&mut address).await? else {
        spinner.failure("No credentials in that URL");
        bail!("The URL has neither token/cloud_id nor code parameters");
    };
    if let Some(e) = report.load_error {
        spinner.failure("Sign-in failed");
        return Err(e).context("Failed to complete Jira sign-in");
    }

    spinner.success("Connected to Jira");
    print_connected(ctx);
    Ok(())
}

fn print_connected(ctx: &AppContext) {
    let session = ctx.session.snapshot();
    if let Some(profile) = &session.profile {
        print!("{}", render::profile_summary(profile));
    }
    println!(
        "{}{} task(s) loaded",
        SPARKLE,
        ctx.session.tasks().len()
    );
}

/// Clear the session and the stored credentials.
pub fn cmd_logout(ctx: &AppContext) -> Result<()> {
    ctx.session.logout().context("Failed to clear stored credentials")?;
    println!("{}Logged out of Jira", CHECK);
    Ok(())
}

/// Show whether a Jira session is live, refreshing the profile if so.
///
/// A rejected token is cleared rather than reported as a failure.
pub async fn cmd_status(ctx: &AppContext, json: bool) -> Result<()> {
    let restored = ctx
        .session
        .restore()
        .context("Failed to read stored credentials")?;

    if restored {
        if let Err(e) = ctx.session.load().await {
            if e.is_auth_rejection() {
                ctx.session.logout()?;
            }
            if !json {
                eprintln!("{}", style(format!("Could not load profile: {}", e)).yellow());
            }
        }
    }

    let session = ctx.session.snapshot();
    if json {
        let body = serde_json::json!({
            "connected": session.connected(),
            "tenant_id": session.tenant_id,
            "profile": session.profile,
            "tasks": ctx.session.tasks().len(),
            "relay": ctx.config.base_url,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{}", render::session_summary(&session));
    if session.connected() {
        println!("{} task(s) assigned", ctx.session.tasks().len());
    }
    println!("Relay: {}", ctx.config.base_url);
    Ok(())
}

/// List the Jira sites reachable with the stored token; `*` marks the active one.
pub async fn cmd_resources(ctx: &AppContext) -> Result<()> {
    ctx.session
        .restore()
        .context("Failed to read stored credentials")?;
    let resources = ctx
        .session
        .accessible_resources()
        .await
        .context("Failed to list Jira sites")?;

    let active = ctx.session.snapshot().tenant_id;
    for tenant in &resources {
        let marker = if active.as_deref() == Some(tenant.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}", marker, render::tenant_line(tenant));
    }
    if resources.is_empty() {
        println!("No Jira sites are accessible with this account");
    }
    Ok(())
}
