use crate::analyzer::categorizer::{Category, MatchType};
use crate::db::{Database, NewRule, insert_rule_if_absent, queries};
use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const BUILTIN_CATALOG: &str = include_str!("../../assets/seed_catalog.json");
const TEAM_ID_LEN: usize = 36;

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCatalog {
    pub teams: Vec<TeamSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub productive: Vec<String>,
    #[serde(default)]
    pub non_productive: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub teams_inserted: usize,
    pub rules_inserted: usize,
    pub rules_skipped: usize,
}

impl SeedCatalog {
    pub fn builtin() -> Result<Self> {
        let catalog: Self =
            serde_json::from_str(BUILTIN_CATALOG).context("Failed to parse built-in seed catalog")?;
        catalog.validate()?;

        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        self.teams.iter().try_for_each(|team| {
            if team.id.len() != TEAM_ID_LEN {
                bail!(
                    "Seed team '{}' has an identifier of {} characters, expected {TEAM_ID_LEN}",
                    team.name,
                    team.id.len()
                );
            }
            if team.name.trim().is_empty() {
                bail!("Seed team {} has an empty name", team.id);
            }
            Ok(())
        })
    }
}

impl TeamSeed {
    fn batches(&self) -> [(Category, &[String]); 2] {
        [
            (Category::Productive, self.productive.as_slice()),
            (Category::NonProductive, self.non_productive.as_slice()),
        ]
    }
}

/// Seeds the catalog in a single transaction. Existing teams and existing
/// `(team_id, app_pattern)` pairs are left untouched; any error rolls back
/// the whole run.
pub fn run(database: &mut Database, catalog: &SeedCatalog) -> Result<SeedSummary> {
    let transaction = database.transaction()?;
    let summary = apply(&transaction, catalog)?;
    transaction.commit().context("Failed to commit seed data")?;

    info!(
        teams_inserted = summary.teams_inserted,
        rules_inserted = summary.rules_inserted,
        rules_skipped = summary.rules_skipped,
        "seed data applied"
    );

    Ok(summary)
}

fn apply(conn: &Connection, catalog: &SeedCatalog) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for team in &catalog.teams {
        let inserted = conn
            .execute(queries::INSERT_TEAM_IF_ABSENT, params![&team.id, &team.name])
            .with_context(|| format!("Failed to insert seed team: {}", team.name))?;
        summary.teams_inserted += inserted;
    }

    for team in &catalog.teams {
        let team_id = resolve_team(conn, team)?;

        for (category, patterns) in team.batches() {
            for pattern in patterns {
                let rule = NewRule {
                    app_pattern: pattern.clone(),
                    match_type: MatchType::Contains,
                    category,
                };

                if insert_rule_if_absent(conn, &team_id, &rule)? {
                    summary.rules_inserted += 1;
                } else {
                    summary.rules_skipped += 1;
                }
            }
        }
    }

    Ok(summary)
}

/// Looks the team up by its fixed identifier. A display name shared by
/// several rows is only reported, never used for resolution.
fn resolve_team(conn: &Connection, team: &TeamSeed) -> Result<String> {
    let resolved: Option<String> = conn
        .query_row(
            "SELECT id FROM teams WHERE id = ?1",
            params![&team.id],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to resolve seed team: {}", team.name))?;

    let Some(team_id) = resolved else {
        bail!(
            "Seed team '{}' ({}) does not exist; refusing to seed its rules",
            team.name,
            team.id
        );
    };

    let same_name: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM teams WHERE name = ?1",
            params![&team.name],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to count teams named {}", team.name))?;
    if same_name > 1 {
        warn!(
            team = %team.name,
            count = same_name,
            team_id = %team_id,
            "team name is not unique; seeding by identifier"
        );
    }

    Ok(team_id)
}
