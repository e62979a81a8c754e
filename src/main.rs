//! `sport-watch` command line: the API server plus maintenance commands.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sport_watch::accounts::{self, AccountError};
use sport_watch::api::{self, ServerError};
use sport_watch::config::{self, Config, ConfigError};
use sport_watch::core_state::{CoreError, CoreState};
use sport_watch::news::{self, NewsError};
use sport_watch::scoreboard::{self, ScoreboardError};
use sport_watch::shop::{self, ShopError};

/// Sport Watch backend.
#[derive(Parser)]
#[command(name = "sport-watch", version)]
#[command(about = "Sports news, sportswear shop and live scores as a JSON API", long_about = None)]
struct Cli {
    /// Database file (overrides SPORT_WATCH_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default).
    Serve {
        /// Port to listen on (overrides SPORT_WATCH_PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Import matches from a CSV file.
    ImportScoreboard {
        /// CSV with team1,team2,score1,score2,sport,status,date columns.
        path: PathBuf,
    },

    /// Import products from a scraped JSON file.
    ImportProducts {
        /// JSON array of scraped products.
        path: PathBuf,
    },

    /// Import sport news from a scraped JSON file.
    ImportNews {
        /// JSON array of scraped stories.
        path: PathBuf,
    },

    /// Create a user account.
    CreateUser {
        username: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "")]
        email: String,

        /// Grant staff privileges.
        #[arg(long)]
        staff: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Shop(#[from] ShopError),
    #[error(transparent)]
    News(#[from] NewsError),
    #[error(transparent)]
    Scoreboard(#[from] ScoreboardError),
    #[error(transparent)]
    Account(#[from] AccountError),
}

fn open_file(path: &PathBuf) -> Result<File, CliError> {
    File::open(path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            let addr = config.bind_addr();
            tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);
            let core = Arc::new(CoreState::open(config)?);
            api::serve(core, addr).await?;
        }

        Commands::ImportScoreboard { path } => {
            let core = CoreState::open(config)?;
            let conn = core.db()?;
            let summary = scoreboard::import_scoreboard_csv(&conn, open_file(&path)?)?;
            println!(
                "Scoreboard import: {} created, {} updated, {} skipped",
                summary.created, summary.updated, summary.skipped
            );
        }

        Commands::ImportProducts { path } => {
            let core = CoreState::open(config)?;
            let conn = core.db()?;
            let summary = shop::import_products_json(&conn, open_file(&path)?)?;
            println!(
                "Product import: {} created, {} updated, {} skipped",
                summary.created, summary.updated, summary.skipped
            );
        }

        Commands::ImportNews { path } => {
            let core = CoreState::open(config)?;
            let conn = core.db()?;
            let summary = news::import::import_news_json(&conn, open_file(&path)?)?;
            println!(
                "News import: {} created, {} duplicates, {} skipped",
                summary.created, summary.duplicates, summary.skipped
            );
        }

        Commands::CreateUser {
            username,
            password,
            email,
            staff,
        } => {
            let core = CoreState::open(config)?;
            let hasher = core.password_hasher();
            let conn = core.db()?;
            let user = accounts::create_user(&conn, &hasher, &username, &password, &email, staff)?;
            println!("Created user {} (id {}, staff: {})", user.username, user.id, staff);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    sport_watch::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
