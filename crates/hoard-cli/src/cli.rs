use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hoard",
    about = "Hoard - shared party inventories with per-character ownership",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the group and registry documents
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data-dir>/hoard.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new group
    InitGroup(InitGroupArgs),
    /// List known groups
    Groups,
    /// Add items to a group's inventory
    Add(AddArgs),
    /// Set an item's total quantity
    Quantity(QuantityArgs),
    /// Delete an item and every claim on it
    Remove(ItemArgs),
    /// Give units of an item to a character
    Claim(ClaimArgs),
    /// Return a character's whole holding to party storage
    Return(ReturnArgs),
    /// Set a character's holding of an item exactly
    Set(SetArgs),
    /// Show who holds an item
    Show(ItemArgs),
    /// List a group's items with their holders
    List(GroupArgs),
    /// Show totals for a group
    Summary(GroupArgs),
    /// Check the allocation invariant for a group
    Verify(GroupArgs),
    /// Copy a group's document into the backup directory
    Backup(GroupArgs),
    /// Manage the characters of a group
    #[command(subcommand)]
    Character(CharacterCommand),
}

#[derive(Subcommand)]
pub enum CharacterCommand {
    /// Add a character to a group
    Add(CharacterAddArgs),
    /// List a group's characters
    List(GroupArgs),
}

#[derive(Args)]
pub struct InitGroupArgs {
    pub name: String,
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct GroupArgs {
    /// Group id or name
    pub group: String,
}

#[derive(Args)]
pub struct ItemArgs {
    pub group: String,
    /// Item id or name
    pub item: String,
}

#[derive(Args)]
pub struct AddArgs {
    pub group: String,
    pub name: String,
    #[arg(short = 'n', long, default_value = "1")]
    pub quantity: u32,
    #[arg(short, long, default_value = "miscellaneous")]
    pub category: String,
    /// Weight of one unit
    #[arg(long, default_value = "0")]
    pub weight: f64,
    /// Value of one unit
    #[arg(long, default_value = "0")]
    pub value: f64,
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct QuantityArgs {
    pub group: String,
    pub item: String,
    pub quantity: u32,
}

#[derive(Args)]
pub struct ClaimArgs {
    pub group: String,
    pub item: String,
    /// Character id or name
    pub character: String,
    #[arg(short = 'n', long, default_value = "1")]
    pub quantity: u32,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct ReturnArgs {
    pub group: String,
    pub item: String,
    pub character: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub group: String,
    pub item: String,
    pub character: String,
    pub quantity: u32,
}

#[derive(Args)]
pub struct CharacterAddArgs {
    pub group: String,
    pub name: String,
    #[arg(long, default_value = "")]
    pub class: String,
    #[arg(long, default_value = "1")]
    pub level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_claim_with_globals() {
        let cli = Cli::parse_from([
            "hoard",
            "--data-dir",
            "/tmp/h",
            "claim",
            "Lantern",
            "Arrows",
            "Aria",
            "-n",
            "4",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/h")));
        match cli.command {
            Command::Claim(args) => {
                assert_eq!(args.character, "Aria");
                assert_eq!(args.quantity, 4);
            }
            _ => panic!("expected claim"),
        }
    }

    #[test]
    fn parses_character_subcommand() {
        let cli = Cli::parse_from(["hoard", "character", "add", "Lantern", "Bren", "--level", "3"]);
        assert!(matches!(
            cli.command,
            Command::Character(CharacterCommand::Add(CharacterAddArgs { level: 3, .. }))
        ));
    }
}
