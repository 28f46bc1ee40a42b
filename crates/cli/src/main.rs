use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "budgetflow", about = "Review and commit recurring budget optimizations")]
pub struct Cli {
    /// SQLite database holding budget documents.
    #[arg(long, env = "BUDGETFLOW_DB", default_value = "budgetflow.db")]
    pub db: PathBuf,

    /// Planner settings (TOML). Defaults apply when the file is absent.
    #[arg(long, env = "BUDGETFLOW_CONFIG", default_value = "budgetflow.toml")]
    pub config: PathBuf,

    #[arg(long, env = "BUDGETFLOW_USER", default_value = "default")]
    pub user: String,

    /// Review as of this date instead of the local calendar day.
    #[arg(long)]
    pub today: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a budget document read from a JSON file.
    Import { file: PathBuf },
    /// Add a financial goal for an account.
    AddGoal {
        #[arg(long)]
        account: String,
        #[arg(long)]
        deadline: Option<NaiveDate>,
        #[arg(long, default_value = "moyenne")]
        priority: String,
    },
    /// Set the profile end date used as the default planning horizon.
    SetProfileEnd { date: NaiveDate },
    /// List lines awaiting review with their proposed change.
    Review,
    /// List detected transfer pairs.
    Twins,
    /// Apply a JSON list of decisions and persist the result.
    Commit {
        decisions: PathBuf,
        /// Compute and print the result without saving.
        #[arg(long)]
        dry_run: bool,
    },
    /// Queue a continuous-optimization request for a JSON projection array.
    Request { projection: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());

    let db = budgetflow_storage::create_db(&cli.db)
        .await
        .with_context(|| format!("Failed to open database {}", cli.db.display()))?;
    let config = budgetflow_planner::PlannerConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    let ctx = commands::Context {
        db,
        config,
        user: cli.user,
        today,
    };

    match cli.command {
        Command::Import { file } => commands::import(&ctx, &file).await,
        Command::AddGoal {
            account,
            deadline,
            priority,
        } => commands::add_goal(&ctx, &account, deadline, &priority).await,
        Command::SetProfileEnd { date } => commands::set_profile_end(&ctx, date).await,
        Command::Review => commands::review(&ctx).await,
        Command::Twins => commands::twins(&ctx).await,
        Command::Commit { decisions, dry_run } => commands::commit(&ctx, &decisions, dry_run).await,
        Command::Request { projection } => commands::request(&ctx, &projection).await,
    }
}
