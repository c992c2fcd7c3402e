mod analyzer;
mod api;
mod cli;
mod config;
mod db;
mod seed;

use crate::analyzer::categorizer::{Category, MatchType};
use crate::cli::{Cli, Commands, ConfigCommands, RuleCommands, TeamCommands};
use crate::config::Config;
use crate::db::{AddRuleOutcome, BulkRules, Database, NewRule, TeamName, TeamRow};
use crate::seed::SeedCatalog;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => handle_migrate(),
        Commands::Seed => handle_seed(),
        Commands::Status => handle_status(),
        Commands::Teams { command } => handle_team_command(command),
        Commands::Rules { command } => handle_rule_command(command),
        Commands::Classify { team, app, title } => handle_classify(&team, &app, title.as_deref()),
        Commands::Report { team, input, json } => handle_report(&team, &input, json),
        Commands::Suggest { team, input } => handle_suggest(&team, &input),
        Commands::Serve => {
            let config = Config::load_or_default()?;
            run_server(config).await
        }
        Commands::Config { command } => handle_config_command(command),
    }
}

fn handle_migrate() -> Result<()> {
    let config = Config::load_or_default()?;
    let mut database = Database::open(&config.db_path)?;
    info!(db_path = %config.db_path.display(), "schema ready");

    seed_database(&mut database)
}

fn handle_seed() -> Result<()> {
    let config = Config::load_or_default()?;
    let mut database = Database::open(&config.db_path)?;

    seed_database(&mut database)
}

fn seed_database(database: &mut Database) -> Result<()> {
    let catalog = SeedCatalog::builtin()?;
    let summary = seed::run(database, &catalog)?;

    println!("Seed applied");
    println!("- teams_inserted: {}", summary.teams_inserted);
    println!("- rules_inserted: {}", summary.rules_inserted);
    println!("- rules_skipped: {}", summary.rules_skipped);
    Ok(())
}

fn handle_status() -> Result<()> {
    let config = Config::load_or_default()?;
    let database = Database::open(&config.db_path)?;

    println!("TeamRules status");
    println!("- db_path: {}", config.db_path.display());
    println!("- teams: {}", database.team_count()?);
    println!("- rules: {}", database.rule_count()?);
    println!("- api_port: {}", config.api_port);

    Ok(())
}

fn handle_team_command(command: TeamCommands) -> Result<()> {
    let config = Config::load_or_default()?;
    let database = Database::open(&config.db_path)?;

    match command {
        TeamCommands::List => {
            for team in database.list_teams()? {
                println!("{}  {}  ({} rules)", team.id, team.name, team.rule_count);
            }
        }
        TeamCommands::Create { name } => {
            let team = database.create_team(&TeamName::parse(&name)?)?;
            println!("Team created: {} ({})", team.name, team.id);
        }
        TeamCommands::Rename { id, name } => {
            let name = TeamName::parse(&name)?;
            if !database.rename_team(&id, &name)? {
                bail!("Team not found: {id}");
            }
            println!("Team renamed: {id} -> {}", name.as_str());
        }
        TeamCommands::Delete { id } => {
            let team = require_team(&database, &id)?;
            database.delete_team(&id)?;
            println!("Team '{}' deleted along with its rules", team.name);
        }
    }

    Ok(())
}

fn handle_rule_command(command: RuleCommands) -> Result<()> {
    let config = Config::load_or_default()?;
    let mut database = Database::open(&config.db_path)?;

    match command {
        RuleCommands::List { team } => {
            require_team(&database, &team)?;
            for rule in database.rules_for_team(&team)? {
                println!(
                    "{:>5}  {:<15} {:<10} {}",
                    rule.id, rule.category, rule.match_type, rule.app_pattern
                );
            }
        }
        RuleCommands::Add {
            team,
            pattern,
            category,
            match_type,
        } => {
            require_team(&database, &team)?;
            let rule = NewRule::new(
                &pattern,
                category.parse::<Category>()?,
                match_type.parse::<MatchType>()?,
            )?;

            match database.add_rule(&team, &rule)? {
                AddRuleOutcome::Created(created) => {
                    println!(
                        "Rule added: {} -> {} (id {})",
                        created.app_pattern, created.category, created.id
                    );
                }
                AddRuleOutcome::Duplicate => {
                    bail!("Rule for '{}' already exists", rule.app_pattern);
                }
            }
        }
        RuleCommands::Remove { team, rule_id } => {
            let deleted = database
                .delete_rule(&team, rule_id)?
                .with_context(|| format!("Rule {rule_id} not found for team {team}"))?;
            println!("Rule '{}' deleted", deleted.app_pattern);
        }
        RuleCommands::Replace { team, file } => {
            require_team(&database, &team)?;
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read rules file: {}", file.display()))?;
            let bulk: BulkRules = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse rules file: {}", file.display()))?;

            let total = database.replace_rules(&team, &bulk.into_new_rules()?)?;
            println!("Rules replaced: {total}");
        }
    }

    Ok(())
}

fn handle_classify(team_id: &str, app: &str, title: Option<&str>) -> Result<()> {
    let config = Config::load_or_default()?;
    let database = Database::open(&config.db_path)?;
    require_team(&database, team_id)?;

    let classifier = analyzer::load_classifier(&database, team_id)?;
    if classifier.is_empty() {
        println!("Team {team_id} has no rules; everything is neutral");
    }

    let classification = classifier.classify(app, title);
    match classification.rule_id.and_then(|id| database.rule(id).transpose()) {
        Some(rule) => {
            let rule = rule?;
            println!(
                "{} (rule {}: {} {})",
                classification.category, rule.id, rule.match_type, rule.app_pattern
            );
        }
        None => println!("{} (no rule matched)", classification.category),
    }

    Ok(())
}

fn handle_report(team_id: &str, input: &Path, json: bool) -> Result<()> {
    let config = Config::load_or_default()?;
    let database = Database::open(&config.db_path)?;
    let team = require_team(&database, team_id)?;
    let samples = analyzer::load_samples(input)?;

    let report = analyzer::team_productivity(&config, &database, team_id, &samples)?;
    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{rendered}");
    } else {
        print!("{}", analyzer::report::render_text(&report, &team.name));
    }

    Ok(())
}

fn handle_suggest(team_id: &str, input: &Path) -> Result<()> {
    let config = Config::load_or_default()?;
    let database = Database::open(&config.db_path)?;
    require_team(&database, team_id)?;
    let samples = analyzer::load_samples(input)?;

    let suggestions = analyzer::team_suggestions(&config, &database, team_id, &samples)?;
    if suggestions.is_empty() {
        println!("No suggestions: every used app is already covered");
    }
    for suggestion in suggestions {
        println!(
            "{:<30} {:<15} {:<5} {}",
            suggestion.app_pattern,
            suggestion.suggested_category,
            suggestion.confidence.as_str(),
            suggestion.usage_display
        );
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_or_default()?;
            config.set_value(&key, &value)?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = Config::load_or_default()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    {
        let mut database = Database::open(&config.db_path)?;
        if config.seed_on_serve {
            seed::run(&mut database, &SeedCatalog::builtin()?)?;
        }
    }

    let shared_config = Arc::new(config);
    info!("TeamRules service started");

    tokio::select! {
        api_result = api::run_server(shared_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn require_team(database: &Database, team_id: &str) -> Result<TeamRow> {
    database
        .team(team_id)?
        .with_context(|| format!("Team not found: {team_id}"))
}
