use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "clickupdw", about = "ClickUp data warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.clickupdw/clickupdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl clickupdw::SyncProgress for StderrProgress {
    fn on_space_start(&self, name: &str, index: usize, total: usize) {
        eprintln!("[{}/{}] Syncing space {}...", index + 1, total, name);
    }

    fn on_board_start(&self, name: &str) {
        eprintln!("  Board {name}");
    }

    fn on_tasks_fetched(&self, list_name: &str, count: usize) {
        eprintln!("    {list_name}: fetched {count} tasks");
    }

    fn on_board_complete(&self, board: &clickupdw::BoardSummary) {
        eprintln!(
            "  Done: {} sprints, {} issues",
            board.sprint_count, board.issue_count
        );
    }
}

/// Look-back window for task updates.
#[derive(Args)]
struct Window {
    /// Number of days to look back
    #[arg(long, conflicts_with = "since")]
    days: Option<u32>,
    /// Sync tasks updated since this date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<chrono::NaiveDate>,
}

impl Window {
    fn options(&self) -> clickupdw::SyncOptions {
        clickupdw::SyncOptions {
            since: self.since,
            days: self.days,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Full sync of an org's ClickUp workspace
    Sync {
        #[arg(long)]
        org_id: i64,
        #[command(flatten)]
        window: Window,
    },
    /// Re-sync a single board created by a previous full sync
    SyncBoard {
        #[arg(long)]
        board_id: i64,
        #[arg(long)]
        org_id: i64,
        #[command(flatten)]
        window: Window,
    },
    /// Run the HTTP trigger server
    Serve {
        /// Listen address (default: CLICKUPDW_BIND or 0.0.0.0:8000)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage stored access tokens
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
    /// Show sync status for an org
    Status {
        #[arg(long)]
        org_id: i64,
    },
}

#[derive(Subcommand)]
enum CredentialsAction {
    /// Store the ClickUp access token for an org
    Set {
        #[arg(long)]
        org_id: i64,
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = clickupdw::Config::from_env()?;
    if let Some(path) = cli.db {
        config.db_path = Some(path.into());
    }

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            let source = Arc::new(clickupdw::ClickUpClient::from_config(&config)?);
            eprintln!("Serving on {}", config.bind);
            clickupdw::server::serve(config, source).await?;
        }
        Commands::Sync { org_id, window } => {
            let dw = clickupdw::ClickUpDW::open(&config).await?;
            let summary = dw
                .sync_workspace(org_id, &window.options(), &StderrProgress)
                .await?;
            print_sync_summary(&summary);
        }
        Commands::SyncBoard {
            board_id,
            org_id,
            window,
        } => {
            let dw = clickupdw::ClickUpDW::open(&config).await?;
            let summary = dw
                .sync_board(board_id, org_id, &window.options(), &StderrProgress)
                .await?;
            print_board_summary(&summary);
        }
        Commands::Credentials {
            action: CredentialsAction::Set { org_id, token },
        } => {
            let dw = clickupdw::ClickUpDW::open(&config).await?;
            dw.set_access_token(org_id, &token).await?;
            println!("Access token stored for org {org_id}.");
        }
        Commands::Status { org_id } => {
            let dw = clickupdw::ClickUpDW::open(&config).await?;
            print_status(&dw.status(org_id).await?);
        }
    }

    Ok(())
}

fn print_sync_summary(summary: &clickupdw::SyncSummary) {
    println!("Sync complete");
    println!("  Users:            {}", summary.users);
    println!("  Task types:       {}", summary.task_types);
    println!(
        "  Custom fields:    {} workspace, {} space, {} folder, {} list",
        summary.workspace_custom_fields,
        summary.space_custom_fields,
        summary.folder_custom_fields,
        summary.list_custom_fields
    );
    println!("  Boards:           {}", summary.boards);
    println!("  Sprints:          {}", summary.sprints);
    println!("  Folderless lists: {}", summary.folderless_lists);
    println!(
        "  Issues:           {} ({} folderless, {} failed)",
        summary.issues + summary.folderless_issues,
        summary.folderless_issues,
        summary.failed_issues
    );
    println!("  PR mappings:      {}", summary.pr_mappings);
    for board in &summary.board_statuses {
        println!(
            "    {:<30} {:<12} {} sprints, {} issues",
            board.name,
            board.status.as_str(),
            board.sprint_count,
            board.issue_count
        );
    }
}

fn print_board_summary(summary: &clickupdw::BoardSyncSummary) {
    println!("Board sync: {} (id {})", summary.board_name, summary.board_id);
    println!("  Sprints:     {}", summary.sprints);
    println!("  Issues:      {}", summary.issues);
    println!("  Failed:      {}", summary.issues_failed);
    println!("  List fields: {}", summary.list_custom_fields);
    println!("  PR mappings: {}", summary.pr_mappings);
}

fn print_status(report: &clickupdw::StatusReport) {
    println!("Org {}", report.org_id);
    match &report.org_status {
        Some(status) => println!("  Status:   {} (at {})", status.status, status.updated_at),
        None => println!("  Status:   never synced"),
    }
    match &report.last_job {
        Some(job) => {
            println!(
                "  Last run: {} started {}, finished {}",
                job.status,
                job.started_at,
                job.finished_at.as_deref().unwrap_or("-")
            );
            if let Some(ref err) = job.error_message {
                println!("  Error:    {err}");
            }
        }
        None => println!("  Last run: none"),
    }
    if report.boards.is_empty() {
        return;
    }
    println!("  Boards:");
    for board in &report.boards {
        println!(
            "    {:<6} {:<30} {:<12} {} sprints, {} issues ({})",
            board.board_id,
            board.board_name,
            board.sync_status,
            board.sprint_count,
            board.issue_count,
            board.modified_at
        );
    }
}
