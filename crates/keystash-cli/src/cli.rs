use clap::{Parser, Subcommand};
use keystash_core::storage::StorageKind;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "keystash",
    about = "Key-value storage with interchangeable regular and secure backends",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Store to operate on (`regular` or `secure`); defaults to the configured store.
    #[arg(long, global = true)]
    pub store: Option<StorageKind>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    #[command(flatten)]
    Storage(StorageCommand),
    /// Save, find and remove a marker entry in the selected store.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Operations forwarded to the selected store.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StorageCommand {
    /// Print the value stored under a key (exit code 1 when absent).
    Find { key: String },
    /// Store a value under a key, replacing any existing value.
    Save { key: String, value: String },
    /// Delete a key; succeeds when the key is already absent.
    Remove { key: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
