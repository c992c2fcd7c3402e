pub mod categorizer;
pub mod report;
pub mod suggest;

use crate::analyzer::categorizer::Classifier;
use crate::analyzer::report::{ActivitySample, ProductivityReport};
use crate::analyzer::suggest::RuleSuggestion;
use crate::config::Config;
use crate::db::Database;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

pub fn load_classifier(database: &Database, team_id: &str) -> Result<Classifier> {
    let rules = database.rules_for_classification(team_id)?;
    let classifier = Classifier::new(&rules);
    debug!(team_id, rules = classifier.len(), "classifier loaded");

    Ok(classifier)
}

pub fn load_samples(path: &Path) -> Result<Vec<ActivitySample>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read activity samples: {}", path.display()))?;
    let samples = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse activity samples: {}", path.display()))?;

    Ok(samples)
}

pub fn team_productivity(
    config: &Config,
    database: &Database,
    team_id: &str,
    samples: &[ActivitySample],
) -> Result<ProductivityReport> {
    let classifier = load_classifier(database, team_id)?;

    Ok(report::build_productivity_report(
        team_id,
        &classifier,
        samples,
        config.sample_interval_seconds,
        config.top_apps_limit,
    ))
}

pub fn team_suggestions(
    config: &Config,
    database: &Database,
    team_id: &str,
    samples: &[ActivitySample],
) -> Result<Vec<RuleSuggestion>> {
    let existing = database
        .rules_for_team(team_id)?
        .into_iter()
        .map(|rule| rule.app_pattern)
        .collect::<Vec<_>>();

    Ok(suggest::suggest_rules(
        samples,
        &existing,
        config.sample_interval_seconds,
        config.suggestion_limit,
    ))
}
