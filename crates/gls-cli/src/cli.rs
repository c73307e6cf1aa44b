use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gls",
    about = "GlobalStorage: typed key-value store over per-key JSON files",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Data directory (overrides the config file and GLS_DATA_DIR)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// How the raw command-line value of `save` is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ValueArg {
    Number,
    String,
    Bool,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Save a value under a key
    Save(SaveArgs),
    /// Print the value stored under a key
    Load(LoadArgs),
    /// Delete a key
    Delete(DeleteArgs),
    /// List all keys and their kinds
    List(ListArgs),
    /// Show the data directory and entry counts
    Info(InfoArgs),
}

#[derive(Args)]
pub struct SaveArgs {
    pub key: String,
    pub value: String,
    #[arg(short, long, value_enum, default_value = "string")]
    pub kind: ValueArg,
}

#[derive(Args)]
pub struct LoadArgs {
    pub key: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ListArgs {}

#[derive(Args)]
pub struct InfoArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_save_defaults_to_string() {
        let cli = Cli::try_parse_from(["gls", "save", "name", "ada"]).unwrap();
        if let Command::Save(args) = cli.command {
            assert_eq!(args.key, "name");
            assert_eq!(args.value, "ada");
            assert_eq!(args.kind, ValueArg::String);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_save_with_kind() {
        let cli = Cli::try_parse_from(["gls", "save", "score", "12", "--kind", "number"]).unwrap();
        if let Command::Save(args) = cli.command {
            assert_eq!(args.kind, ValueArg::Number);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_load() {
        let cli = Cli::try_parse_from(["gls", "load", "score"]).unwrap();
        assert!(matches!(cli.command, Command::Load(args) if args.key == "score"));
    }

    #[test]
    fn parse_delete() {
        let cli = Cli::try_parse_from(["gls", "delete", "score"]).unwrap();
        assert!(matches!(cli.command, Command::Delete(_)));
    }

    #[test]
    fn parse_global_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["gls", "list", "--dir", "/tmp/saves"]).unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/saves")));
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["gls", "--format", "json", "info"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["gls", "-v", "list"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn save_requires_value() {
        assert!(Cli::try_parse_from(["gls", "save", "only-key"]).is_err());
    }
}
