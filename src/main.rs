use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskbridge::config::{CliOverrides, Config};
use taskbridge::context::AppContext;
use taskbridge::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "taskbridge")]
#[command(
    version,
    about = "Sign in to Jira through the relay, list your tasks, send them to Void and deploy"
)]
pub struct Cli {
    /// Debug logging for taskbridge (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Relay server base URL (default http://localhost:3000)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Credential file holding the token and Jira cloud id
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Jira site to use when several are accessible (id, name, or URL fragment)
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the relay login page to start Jira sign-in
    Login {
        /// Print the URL without opening a browser
        #[arg(long)]
        no_open: bool,
    },
    /// Finish sign-in from the redirect URL or an authorization code
    Callback {
        /// Redirect URL (with token/cloud_id or code) or a bare code
        input: String,
    },
    /// Forget the stored token and Jira site
    Logout,
    /// Show connection state and profile
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List Jira sites reachable with the stored token
    Resources,
    /// List tasks assigned to you
    Tasks {
        #[arg(long)]
        json: bool,
    },
    /// Show one task in full
    Show {
        /// Issue id or key (e.g. PROJ-12)
        task: String,
    },
    /// Preview the Void message for a task
    Preview { task: String },
    /// Send a task to Void
    Send { task: String },
    /// Trigger a deployment, for a task or manually
    Deploy { task: Option<String> },
    /// Show whether the relay is ready to deploy
    DeployStatus,
    /// View, validate, or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logging::init(cli.verbose, format)?;

    if let Commands::Config {
        command: Some(ConfigCommands::Init { force }),
    } = &cli.command
    {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::default_path(
                &std::env::current_dir().context("Failed to get current directory")?,
            ),
        };
        return cmd::cmd_config_init(&path, *force);
    }

    let config = Config::resolve(&CliOverrides {
        config_path: cli.config.clone(),
        base_url: cli.base_url.clone(),
        store_path: cli.store.clone(),
        tenant: cli.tenant.clone(),
    })?;

    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(&config, command.clone());
    }

    let ctx = AppContext::from_config(config, Box::new(cmd::PromptTenant))?;

    match &cli.command {
        Commands::Login { no_open } => cmd::cmd_login(&ctx, *no_open)?,
        Commands::Callback { input } => cmd::cmd_callback(&ctx, input).await?,
        Commands::Logout => cmd::cmd_logout(&ctx)?,
        Commands::Status { json } => cmd::cmd_status(&ctx, *json).await?,
        Commands::Resources => cmd::cmd_resources(&ctx).await?,
        Commands::Tasks { json } => cmd::cmd_tasks(&ctx, *json).await?,
        Commands::Show { task } => cmd::cmd_show(&ctx, task).await?,
        Commands::Preview { task } => cmd::cmd_preview(&ctx, task).await?,
        Commands::Send { task } => cmd::cmd_send(&ctx, task).await?,
        Commands::Deploy { task } => cmd::cmd_deploy(&ctx, task.as_deref()).await?,
        Commands::DeployStatus => cmd::cmd_deploy_status(&ctx).await?,
        // Handled above, before the relay client is built.
        Commands::Config { .. } => {}
    }

    Ok(())
}
