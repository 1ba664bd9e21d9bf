use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use passfile_core::{PassFileId, PassFileType, VERSION};

/// Passfile - encrypted password and note containers
#[derive(Parser)]
#[command(name = "passfile")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "PASSFILE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Directory that holds the passfile store
    #[arg(long, value_name = "DIR")]
    pub root: Option<String>,

    /// Server identity the store belongs to
    #[arg(long, value_name = "SERVER")]
    pub server: Option<String>,

    /// Account id on that server
    #[arg(long)]
    pub user_id: Option<i64>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// List locally deleted passfiles instead
    #[arg(long)]
    pub deleted: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// A passfile id argument. Never-uploaded passfiles have negative ids.
#[derive(Args)]
pub struct IdArg {
    /// Passfile id
    #[arg(value_name = "ID", allow_negative_numbers = true)]
    pub id: PassFileId,
}

/// Arguments for the `show` command
#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: IdArg,

    /// Print passwords instead of masking them
    #[arg(long)]
    pub reveal: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `export` command
#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub target: IdArg,

    /// Human-readable formatting
    #[arg(long)]
    pub pretty: bool,

    /// Write to the store's exports directory instead of stdout
    #[arg(long)]
    pub save: bool,
}

/// Arguments for the `new` command
#[derive(Args)]
pub struct NewArgs {
    /// Content type (pwd or txt)
    #[arg(long = "type", value_name = "TYPE")]
    pub passfile_type: PassFileType,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Hex color, e.g. #3a7bd5
    #[arg(long)]
    pub color: Option<String>,
}

/// Arguments for the `rename` command
#[derive(Args)]
pub struct RenameArgs {
    #[command(flatten)]
    pub target: IdArg,

    /// New display name
    #[arg(long)]
    pub name: String,

    /// New hex color; omit to clear
    #[arg(long)]
    pub color: Option<String>,
}

/// Arguments for the `add-section` command
#[derive(Args)]
pub struct AddSectionArgs {
    #[command(flatten)]
    pub target: IdArg,

    /// Section name
    #[arg(long)]
    pub name: String,

    /// Website (pwd passfiles)
    #[arg(long)]
    pub url: Option<String>,

    /// Username for the login item; repeat for several (pwd passfiles)
    #[arg(long, value_name = "USERNAME")]
    pub username: Vec<String>,

    /// Password for the login item (pwd passfiles)
    #[arg(long)]
    pub password: Option<String>,

    /// Section text (txt passfiles)
    #[arg(long)]
    pub text: Option<String>,
}

/// Arguments for the `remove-section` command
#[derive(Args)]
pub struct RemoveSectionArgs {
    #[command(flatten)]
    pub target: IdArg,

    /// Name of the section to remove
    #[arg(long)]
    pub name: String,
}

/// Arguments for the `status` command
#[derive(Args)]
pub struct StatusArgs {
    /// Passfile id; all passfiles when omitted
    #[arg(value_name = "ID", allow_negative_numbers = true)]
    pub id: Option<PassFileId>,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a config file and create the store
    Init(InitArgs),

    /// List passfiles
    List(ListArgs),

    /// Show a passfile's metadata and decrypted content
    Show(ShowArgs),

    /// Export decrypted content as JSON
    Export(ExportArgs),

    /// Create an empty passfile
    New(NewArgs),

    /// Rename or recolor a passfile
    Rename(RenameArgs),

    /// Append a section to a passfile
    AddSection(AddSectionArgs),

    /// Remove a section from a passfile
    RemoveSection(RemoveSectionArgs),

    /// Change a passfile's passphrase
    Passwd(IdArg),

    /// Delete a passfile locally
    Delete(IdArg),

    /// Undo a local delete
    Restore(IdArg),

    /// Show sync state
    Status(StatusArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
