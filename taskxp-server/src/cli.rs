use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/app.db)
  PORT        (default: 5151 or config.listen_port)
  RUST_LOG    (default: info)
"#;

#[derive(Debug, Parser)]
#[command(
    name = "taskxp-server",
    version,
    about = "taskxp family task and reward server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Path to the YAML config; overrides CONFIG_PATH
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Path to the SQLite database; overrides DB_PATH
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a starter config with a freshly generated JWT secret
    InitConfig {
        /// Destination path for the config file
        #[arg(long, default_value = "config.yaml")]
        path: PathBuf,
        /// Overwrite the file if it already exists
        #[arg(long)]
        force: bool,
    },
}
