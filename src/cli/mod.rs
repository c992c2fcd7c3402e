use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "TeamRules",
    about = "Per-team app productivity rules: schema, seed data and classification"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the schema if needed and apply the built-in seed data.
    Migrate,
    /// Apply the built-in seed data only.
    Seed,
    Status,
    Teams {
        #[command(subcommand)]
        command: TeamCommands,
    },
    Rules {
        #[command(subcommand)]
        command: RuleCommands,
    },
    Classify {
        #[arg(long)]
        team: String,
        #[arg(long)]
        app: String,
        #[arg(long)]
        title: Option<String>,
    },
    Report {
        #[arg(long)]
        team: String,
        /// JSON array of activity samples.
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    Suggest {
        #[arg(long)]
        team: String,
        #[arg(long)]
        input: PathBuf,
    },
    Serve,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum TeamCommands {
    List,
    Create { name: String },
    Rename { id: String, name: String },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum RuleCommands {
    List {
        #[arg(long)]
        team: String,
    },
    Add {
        #[arg(long)]
        team: String,
        pattern: String,
        #[arg(long, default_value = "neutral")]
        category: String,
        #[arg(long, default_value = "contains")]
        match_type: String,
    },
    Remove {
        #[arg(long)]
        team: String,
        rule_id: i64,
    },
    /// Replace every rule of a team from a `{productive, neutral, non_productive}` JSON file.
    Replace {
        #[arg(long)]
        team: String,
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
