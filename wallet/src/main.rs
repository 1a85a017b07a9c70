//! A CLI wallet for the Quill name registry: builds the scripts that carry
//! name operations, keeps the reveals of this wallet's own registrations,
//! and answers queries against a local copy of the name index.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use quill_core::policy::StandardPolicy;
use quill_core::script::Script;
use quill_core::store::NameStore;

mod cli;
mod names;
mod query;

use cli::{Cli, Command};

/// The wallet's local database is a sled instance holding the name index
/// plus the wallet's own registration book.
const DB_NAME: &str = "quill-wallet-db";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let db = if cli.tmp {
        sled::Config::new().temporary(true).open()?
    } else {
        let path = cli.base_path.clone().unwrap_or(default_data_path()?);
        log::info!("using wallet database at {}", path.display());
        sled::open(path.join(DB_NAME))?
    };
    let store = NameStore::open(&db)?;
    let policy = StandardPolicy;

    match cli.command {
        Command::NameNew(args) => names::name_new(&db, &store, args),
        Command::NameFirstupdate(args) => names::name_first_update(&db, args),
        Command::NameUpdate(args) => names::name_update(args),
        Command::Show { name } => query::show(&store, &policy, name.as_bytes()),
        Command::History { name } => query::history(&store, &policy, name.as_bytes()),
        Command::Scan(args) => query::scan(&store, &policy, args),
        Command::Verify => query::verify(&store),
        Command::MyNames => names::my_names(&db),
    }
}

/// Platform-specific default data directory.
fn default_data_path() -> anyhow::Result<PathBuf> {
    directories::ProjectDirs::from("", "", "quill-wallet")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("no platform data directory; pass --base-path"))
}

/// Parse a hex string into a script. Used to parse CLI arguments.
pub fn script_from_string(s: &str) -> anyhow::Result<Script> {
    Ok(Script::from(hex::decode(s)?))
}
