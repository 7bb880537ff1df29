use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Character chat backend routing turns across LLM providers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
    /// Location of the JSON store, used unless DATABASE_URL selects sqlite
    #[arg(long, global = true)]
    pub local_db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Probe every configured provider and report which are reachable
    CheckProviders,
}
