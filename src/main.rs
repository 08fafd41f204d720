use anyhow::Result;
use clap::{Parser, Subcommand};
use mangamatch::{App, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mangamatch")]
#[command(
    author,
    version,
    about = "Reconcile a remote manga reading list with a local library"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Library root override for this invocation
    #[arg(long)]
    library: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the remote reading list against the directory index
    Sync {
        /// Bypass the detail cache and refetch every series detail
        #[arg(long)]
        refresh: bool,
        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage the directory index
    Dirs {
        #[command(subcommand)]
        action: DirsCommands,
    },

    /// Manage the review queue
    Review {
        #[command(subcommand)]
        action: ReviewCommands,
    },

    /// Merge reader progress into reconciled records
    Progress {
        #[command(subcommand)]
        action: ProgressCommands,
    },

    /// Show current status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum DirsCommands {
    /// Scan the library root and refresh the directory index
    Scan,
    /// List the indexed directories
    List,
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// List entries awaiting review with their candidate directories
    List,
    /// Resolve an entry by picking one of its numbered candidates
    Resolve {
        /// Remote series id of the queued entry
        series_id: i64,
        /// 1-based candidate number from 'review list'
        choice: usize,
    },
    /// Discard an entry without matching it
    Remove {
        /// Remote series id of the queued entry
        series_id: i64,
    },
}

#[derive(Subcommand)]
enum ProgressCommands {
    /// Rebuild the merged view and stage chapter updates
    Merge {
        /// Submit staged chapter updates upstream
        #[arg(long)]
        push: bool,
        /// Never submit, even if configuration allows it
        #[arg(long)]
        skip_push: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Set the library root directory
    SetLibrary { path: String },
    /// Set the reader profile directory
    SetReaderDir { path: String },
    /// Set the remote reading-list id
    SetList { list_id: i64 },
    /// Set the API token for the reading-list service
    SetToken { token: String },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "mangamatch=info",
        1 => "mangamatch=debug",
        2 => "mangamatch=trace",
        _ => "trace",
    };

    let log_dir = std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".mangamatch");

    std::fs::create_dir_all(&log_dir).ok();
    let log_file = log_dir.join("mangamatch.log");

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .expect("Failed to open log file");

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::sync::Arc::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    // Load configuration
    let mut config = Config::load().await?;
    if let Some(library) = cli.library.as_deref() {
        let trimmed = library.trim();
        if trimmed.is_empty() {
            anyhow::bail!("--library cannot be empty");
        }
        config.library_root = Some(trimmed.to_string());
    }

    let mut app = App::new(config)?;

    match cli.command {
        Commands::Sync { refresh, dry_run } => app.cmd_sync(refresh, dry_run).await?,
        Commands::Dirs { action } => match action {
            DirsCommands::Scan => app.cmd_dirs_scan().await?,
            DirsCommands::List => app.cmd_dirs_list().await?,
        },
        Commands::Review { action } => match action {
            ReviewCommands::List => app.cmd_review_list().await?,
            ReviewCommands::Resolve { series_id, choice } => {
                app.cmd_review_resolve(series_id, choice).await?
            }
            ReviewCommands::Remove { series_id } => app.cmd_review_remove(series_id).await?,
        },
        Commands::Progress { action } => match action {
            ProgressCommands::Merge { push, skip_push } => {
                app.cmd_progress_merge(push, skip_push).await?
            }
        },
        Commands::Status => app.cmd_status().await?,
        Commands::Config { action } => match action {
            ConfigCommands::Show => app.cmd_config_show()?,
            ConfigCommands::SetLibrary { path } => app.cmd_config_set_library(&path).await?,
            ConfigCommands::SetReaderDir { path } => app.cmd_config_set_reader_dir(&path).await?,
            ConfigCommands::SetList { list_id } => app.cmd_config_set_list(list_id).await?,
            ConfigCommands::SetToken { token } => app.cmd_config_set_token(&token).await?,
        },
    }

    Ok(())
}
