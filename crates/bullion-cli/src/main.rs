//! CLI application for scraping SGE and SHFE bullion reports and PAJ inventory tables.

mod commands;
mod listing;
mod net;
mod output;
mod paj;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, extract, monthly, open_interest, weekly};

/// Bullion reports - SGE withdrawals and vault inventory, SHFE silver open interest
#[derive(Parser)]
#[command(name = "bullion")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl SGE monthly data highlights and extract gold and silver withdrawals
    Monthly(monthly::MonthlyArgs),

    /// Crawl SGE weekly reports and extract silver vault inventory
    Weekly(weekly::WeeklyArgs),

    /// Fetch SHFE daily trading data and total silver open interest
    OpenInterest(open_interest::OpenInterestArgs),

    /// Fetch PAJ weekly crude oil and petroleum product tables
    Paj(commands::paj::PajArgs),

    /// Run a report over local PDF or JSON files
    Extract(extract::ExtractArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Execute command
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Monthly(args) => monthly::run(args, config_path).await,
        Commands::Weekly(args) => weekly::run(args, config_path).await,
        Commands::OpenInterest(args) => open_interest::run(args, config_path).await,
        Commands::Paj(args) => commands::paj::run(args, config_path).await,
        Commands::Extract(args) => extract::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
