use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod core;
mod daemon;
mod providers;
#[cfg(test)]
mod testing;

use crate::core::settings::{LogFormat, LoggingSettings, Settings};
use crate::core::store::ConnectionTarget;

#[derive(Parser)]
#[command(name = "analytics-sync")]
#[command(author, version, about = "Keeps monitored web resources in sync with realtime analytics")]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatabaseArgs {
    /// Database connection string (falls back to database.url in config)
    connection_string: Option<String>,

    /// Database login
    #[arg(long, env = "ANALYTICS_SYNC_DB_LOGIN")]
    login: Option<String>,

    /// Database password
    #[arg(long, env = "ANALYTICS_SYNC_DB_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl DatabaseArgs {
    fn into_target(self, settings: &Settings) -> anyhow::Result<ConnectionTarget> {
        let url = self
            .connection_string
            .or_else(|| settings.database.url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("No connection string given and database.url is not configured")
            })?;

        Ok(ConnectionTarget {
            url,
            login: self.login,
            password: self.password,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling daemon
    Daemon {
        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// List resources that are currently due for a refresh
    Due {
        #[command(flatten)]
        database: DatabaseArgs,

        /// List every resource with its due state instead
        #[arg(long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch online users for a single site without touching the database
    Fetch {
        /// Service account email
        #[arg(long)]
        email: String,

        /// Path to the service account key file
        #[arg(long)]
        key_file: String,

        /// Site URL as registered in analytics
        #[arg(long)]
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let journald = match logging.format {
        LogFormat::Journald => match tracing_journald::layer() {
            Ok(layer) => Some(layer),
            Err(e) => {
                eprintln!("journald unavailable, logging to stderr: {}", e);
                None
            }
        },
        _ => None,
    };
    let json = (logging.format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json());
    let pretty = (journald.is_none() && json.is_none()).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(json)
        .with(pretty)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&settings.logging);

    match cli.command {
        Commands::Daemon { database } => {
            let target = database.into_target(&settings)?;
            match daemon::run(&settings, &target).await {
                Ok(never) => match never {},
                Err(e) => {
                    tracing::error!(error = %format!("{:#}", e), "Daemon terminated");
                    std::process::exit(1);
                }
            }
        }
        Commands::Due {
            database,
            all,
            json,
        } => {
            let target = database.into_target(&settings)?;
            cli::due::run(&settings, &target, all, json).await
        }
        Commands::Fetch {
            email,
            key_file,
            url,
            json,
        } => cli::fetch::run(&settings, &email, &key_file, &url, json).await,
        Commands::Completions { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_daemon_args() {
        let cli = Cli::try_parse_from([
            "analytics-sync",
            "daemon",
            "postgres://localhost/matreshka",
            "--login",
            "daemon",
            "--password",
            "secret",
        ])
        .unwrap();

        let Commands::Daemon { database } = cli.command else {
            panic!("expected daemon command");
        };
        let target = database.into_target(&Settings::default()).unwrap();
        assert_eq!(target.url, "postgres://localhost/matreshka");
        assert_eq!(target.login.as_deref(), Some("daemon"));
        assert_eq!(target.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_connection_string_falls_back_to_config() {
        let cli = Cli::try_parse_from(["analytics-sync", "due", "--json"]).unwrap();
        let Commands::Due { database, json, all } = cli.command else {
            panic!("expected due command");
        };
        assert!(json);
        assert!(!all);

        let mut settings = Settings::default();
        assert!(DatabaseArgs {
            connection_string: None,
            login: None,
            password: None,
        }
        .into_target(&settings)
        .is_err());

        settings.database.url = Some("postgres://db/resources".to_string());
        let target = database.into_target(&settings).unwrap();
        assert_eq!(target.url, "postgres://db/resources");
    }
}
