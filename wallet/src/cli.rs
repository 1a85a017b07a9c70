//! The name wallet's command line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quill_core::script::Script;

use crate::script_from_string;

/// The default number of scan results per page.
pub const DEFAULT_SCAN_MAX: &str = "500";

/// The wallet's main CLI struct
#[derive(Debug, Parser)]
#[command(about, version)]
pub struct Cli {
    #[arg(long, short('d'))]
    /// Path where the wallet data is stored. Default value is platform specific.
    pub base_path: Option<PathBuf>,

    #[arg(long)]
    /// Use a temporary database, deleted at the end of the process.
    /// base_path will be ignored if this is set.
    pub tmp: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// The tasks supported by the wallet
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start registering a name: generate a reveal, remember it, and emit
    /// the commitment script to embed in a transaction output.
    NameNew(NameNewArgs),

    /// Finish registering a name whose commitment was made with name-new.
    /// Emits the reveal-and-activate script.
    NameFirstupdate(NameFirstupdateArgs),

    /// Renew or transfer a name. Emits the update script.
    NameUpdate(NameUpdateArgs),

    /// Show the current record of one name.
    Show {
        /// The name to look up.
        name: String,
    },

    /// Show the complete recorded history of one name.
    History {
        /// The name to look up.
        name: String,
    },

    /// List registered names in lexicographic order.
    Scan(ScanArgs),

    /// Check that every stored history deserializes, and summarize.
    Verify,

    /// List the registrations this wallet has started, with their reveals.
    MyNames,
}

#[derive(Debug, Args)]
pub struct NameNewArgs {
    /// The name to register.
    pub name: String,

    /// Hex-encoded spending clause appended after the name prefix.
    #[arg(long, short, value_parser = script_from_string, default_value = "")]
    pub pay_to: Script,

    /// Generate a fresh commitment even if the name looks taken or was
    /// already committed to by this wallet.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct NameFirstupdateArgs {
    /// The name being activated; its reveal must be in this wallet.
    pub name: String,

    /// The initial value to publish for the name.
    #[arg(long, short)]
    pub value: String,

    /// Hex-encoded spending clause appended after the name prefix.
    #[arg(long, short, value_parser = script_from_string, default_value = "")]
    pub pay_to: Script,
}

#[derive(Debug, Args)]
pub struct NameUpdateArgs {
    /// The name being renewed or transferred.
    pub name: String,

    /// The new value to publish for the name.
    #[arg(long, short)]
    pub value: String,

    /// Hex-encoded spending clause appended after the name prefix.
    #[arg(long, short, value_parser = script_from_string, default_value = "")]
    pub pay_to: Script,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Name (or prefix) to start the scan at.
    #[arg(long, short, default_value = "")]
    pub start: String,

    /// Maximum number of names to list.
    #[arg(long, short, default_value = DEFAULT_SCAN_MAX)]
    pub max: usize,

    /// Print only the number of matching names.
    #[arg(long)]
    pub stat: bool,
}
