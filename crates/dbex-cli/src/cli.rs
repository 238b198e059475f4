use std::path::PathBuf;

use clap::{value_parser, ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Export a Databricks workspace as Terraform configuration",
    long_about = "Walks the workspace APIs, assembles the discovered resources, and writes \
                  Terraform configuration plus the import commands needed to adopt them.",
    after_help = "Examples:\n  dbex --directory ws --services compute,jobs\n  dbex --match-regex '^prod' --native-import\n  dbex --incremental --updated-since 2024-01-01T00:00:00Z\n"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct DbexCli {
    #[arg(
        long,
        value_parser = value_parser!(PathBuf),
        default_value = "ws",
        help = "Directory the generated configuration is written to"
    )]
    pub directory: PathBuf,
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "SERVICE",
        help = "Services whose resources are exported (default: all)"
    )]
    pub services: Vec<String>,
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "SERVICE",
        help = "Services whose listing drivers run (defaults to --services)"
    )]
    pub listing: Vec<String>,
    #[arg(
        long = "match",
        value_name = "SUBSTRING",
        help = "Only export resources whose name contains the substring"
    )]
    pub match_substring: Option<String>,
    #[arg(
        long,
        value_name = "REGEX",
        help = "Only export resources whose name matches the regex"
    )]
    pub match_regex: Option<String>,
    #[arg(
        long,
        value_name = "REGEX",
        help = "Skip resources whose name matches the regex (wins over --match)"
    )]
    pub exclude_regex: Option<String>,
    #[arg(
        long,
        help = "Merge into existing output files instead of overwriting them"
    )]
    pub incremental: bool,
    #[arg(
        long,
        value_name = "TIMESTAMP",
        help = "RFC3339 cutoff for --incremental; older resources are left untouched"
    )]
    pub updated_since: Option<String>,
    #[arg(
        long,
        help = "Generate import {} blocks in import.tf alongside import.sh"
    )]
    pub native_import: bool,
    #[arg(long, help = "Skip attribute alignment in generated blocks")]
    pub no_format: bool,
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    pub trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    pub json: bool,
}
