use anyhow::{Context, bail};
use tracing::{info, warn};

use warbler_db::{Config, Database, DatabaseLocation, migrations};

const USAGE: &str = "usage: warbler [migrate|stats|reset]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Migrate,
    Stats,
    Reset,
}

impl Command {
    fn parse(arg: Option<&str>) -> anyhow::Result<Self> {
        match arg {
            None | Some("migrate") => Ok(Command::Migrate),
            Some("stats") => Ok(Command::Stats),
            Some("reset") => Ok(Command::Reset),
            Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warbler=info,warbler_db=info".into()),
        )
        .init();

    let arg = std::env::args().nth(1);
    let command = Command::parse(arg.as_deref())?;

    // Config
    let config = Config::from_env();
    if config.database == DatabaseLocation::Memory {
        warn!("DATABASE_URL points at an in-memory database; nothing will persist");
    }

    // Opening applies any pending migrations
    let db = Database::connect(&config.database).context("failed to open database")?;

    match command {
        Command::Migrate => {
            let version = db.with_conn(migrations::current_version)?;
            info!("Schema is at v{}", version);
        }
        Command::Stats => {
            let counts = db.stats()?;
            info!(
                users = counts.users,
                messages = counts.messages,
                follows = counts.follows,
                likes = counts.likes,
                "Row counts"
            );
        }
        Command::Reset => {
            let allowed = std::env::var("WARBLER_ALLOW_RESET").is_ok_and(|v| v == "1");
            if !allowed {
                bail!("refusing to reset; set WARBLER_ALLOW_RESET=1 to delete all rows");
            }
            db.reset()?;
        }
    }

    Ok(())
}
