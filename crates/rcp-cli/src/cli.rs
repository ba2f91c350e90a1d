use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rcp",
    about = "Recipe provenance: canonical content hashing and ledger anchoring",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Ledger configuration file (TOML). Environment variables override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the canonical hash of a recipe content file
    Hash(ContentArgs),
    /// Check the connection to the ledger node
    Status,
    /// Look up a hash in the recipe registry
    Verify(HashArgs),
    /// Show the registry's record for a hash
    Info(HashArgs),
    /// Hash a recipe content file and anchor it for a wallet
    Register(RegisterArgs),
    /// Show the effective ledger configuration
    Config,
}

#[derive(Args)]
pub struct ContentArgs {
    /// JSON file holding recipe content
    pub file: PathBuf,
}

#[derive(Args)]
pub struct HashArgs {
    /// 64-character hex recipe hash
    pub hash: String,
}

#[derive(Args)]
pub struct RegisterArgs {
    /// JSON file holding recipe content
    pub file: PathBuf,
    /// Author wallet address (0x-prefixed)
    #[arg(short, long)]
    pub wallet: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_hash() {
        let cli = Cli::try_parse_from(["rcp", "hash", "pho.json"]).unwrap();
        if let Command::Hash(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("pho.json"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_status() {
        let cli = Cli::try_parse_from(["rcp", "status"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn parse_verify() {
        let cli = Cli::try_parse_from(["rcp", "verify", "ab12"]).unwrap();
        if let Command::Verify(args) = cli.command {
            assert_eq!(args.hash, "ab12");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_register_with_wallet() {
        let cli = Cli::try_parse_from([
            "rcp",
            "register",
            "pho.json",
            "--wallet",
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
        ])
        .unwrap();
        if let Command::Register(args) = cli.command {
            assert_eq!(
                args.wallet.as_deref(),
                Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
            );
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli =
            Cli::try_parse_from(["rcp", "info", "ab", "--config", "ledger.toml", "-v", "--format", "json"])
                .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.config, Some(PathBuf::from("ledger.toml")));
    }

    #[test]
    fn register_requires_file() {
        assert!(Cli::try_parse_from(["rcp", "register"]).is_err());
    }
}
