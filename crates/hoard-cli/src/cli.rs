use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hoard", about = "Hoard: named blob stores, groups and promotion", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level, ignoring RUST_LOG and the settings file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Settings file (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List registered blob stores
    List,
    /// Show one blob store's configuration and state
    Show(ShowArgs),
    /// Register a file-system blob store
    CreateFile(CreateFileArgs),
    /// Register an in-memory blob store
    CreateMemory(CreateMemoryArgs),
    /// Register a group of existing blob stores
    CreateGroup(CreateGroupArgs),
    /// Unregister a blob store (its data is kept)
    Delete(DeleteArgs),
    /// Turn a standalone blob store into the sole member of a new group
    Promote(PromoteArgs),
    /// Write a blob
    Put(PutArgs),
    /// Read a blob
    Get(GetArgs),
}

#[derive(Args)]
pub struct ShowArgs {
    pub name: String,
}

#[derive(Args)]
pub struct CreateFileArgs {
    pub name: String,
    /// Store root; relative paths resolve against the data directory
    #[arg(long)]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct CreateMemoryArgs {
    pub name: String,
    /// Backing volume; defaults to the store name
    #[arg(long)]
    pub volume: Option<String>,
}

#[derive(Args)]
pub struct CreateGroupArgs {
    pub name: String,
    /// Member store names, in order
    #[arg(long, value_delimiter = ',', required = true)]
    pub members: Vec<String>,
    #[arg(long, default_value = "fallback")]
    pub fill_policy: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub name: String,
}

#[derive(Args)]
pub struct PromoteArgs {
    pub name: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub store: String,
    /// File to store; `-` reads standard input
    pub file: PathBuf,
    /// Recorded as the blob name header
    #[arg(long)]
    pub blob_name: Option<String>,
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub store: String,
    /// Blob id (64 hex characters)
    pub id: String,
    /// Write content here instead of standard output
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn group_members_split_on_comma() {
        let cli = Cli::parse_from(["hoard", "create-group", "g", "--members", "a,b"]);
        let Command::CreateGroup(args) = cli.command else {
            panic!("expected create-group");
        };
        assert_eq!(args.members, vec!["a", "b"]);
        assert_eq!(args.fill_policy, "fallback");
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::parse_from(["hoard", "list", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
