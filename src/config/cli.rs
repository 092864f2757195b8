use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "nutrition-lookup")]
#[command(about = "Look up nutrition data by free text or barcode")]
pub struct CliConfig {
    #[arg(long, short, help = "TOML configuration file (defaults to NUTRITION_* env vars)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "JSON file with previously seen products")]
    pub local_store: Option<PathBuf>,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Search products by name
    Search {
        query: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Resolve a product from its barcode
    Barcode { code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_command() {
        let cli = CliConfig::try_parse_from([
            "nutrition-lookup",
            "--verbose",
            "search",
            "greek yogurt",
            "--limit",
            "5",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Search { query, limit } => {
                assert_eq!(query, "greek yogurt");
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_barcode_command() {
        let cli = CliConfig::try_parse_from([
            "nutrition-lookup",
            "--config",
            "lookup.toml",
            "barcode",
            "5000159484695",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("lookup.toml")));
        assert!(matches!(cli.command, Command::Barcode { ref code } if code == "5000159484695"));
    }
}
