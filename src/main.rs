use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use convbuddy::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for convbuddy::AppCommand {
    fn from(cmd: Commands) -> convbuddy::AppCommand {
        match cmd {
            Commands::Convert {
                category,
                value,
                from,
                to,
            } => convbuddy::AppCommand::Convert {
                category,
                value,
                from,
                to,
            },
            Commands::Units { category } => convbuddy::AppCommand::Units { category },
            Commands::Categories => convbuddy::AppCommand::Categories,
            Commands::Rates { refresh } => convbuddy::AppCommand::Rates { refresh },
            Commands::History { clear, limit } => convbuddy::AppCommand::History { clear, limit },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a value between two units of a category
    Convert {
        /// Category, e.g. Length or Currency
        category: String,
        /// Value to convert
        #[arg(allow_hyphen_values = true)]
        value: String,
        /// Source unit (or currency code)
        from: String,
        /// Target unit (or currency code)
        to: String,
    },
    /// List the units of a category
    Units { category: String },
    /// List all categories
    Categories,
    /// Show the current currency rates
    Rates {
        /// Fetch new rates even if the cached ones are fresh
        #[arg(long)]
        refresh: bool,
    },
    /// Show recent conversions
    History {
        /// Delete all recorded conversions
        #[arg(long)]
        clear: bool,
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Create default configuration
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => convbuddy::cli::setup::setup_at_path(path),
            None => convbuddy::cli::setup::setup(),
        },
        Some(cmd) => convbuddy::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
