pub mod queries;

use crate::analyzer::categorizer::{Category, MatchType, validate_pattern};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

const MAX_TEAM_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct TeamRow {
    pub id: String,
    pub name: String,
    pub manager_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    pub id: String,
    pub name: String,
    pub rule_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppRule {
    pub id: i64,
    pub team_id: String,
    pub app_pattern: String,
    pub match_type: MatchType,
    pub category: Category,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A trimmed team name of 1 to 100 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamName(String);

impl TeamName {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("Team name must not be empty");
        }
        if trimmed.chars().count() > MAX_TEAM_NAME_CHARS {
            bail!("Team name must be at most {MAX_TEAM_NAME_CHARS} characters");
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct NewRule {
    pub app_pattern: String,
    pub match_type: MatchType,
    pub category: Category,
}

impl NewRule {
    pub fn new(app_pattern: &str, category: Category, match_type: MatchType) -> Result<Self> {
        Ok(Self {
            app_pattern: validate_pattern(app_pattern, match_type)?,
            match_type,
            category,
        })
    }
}

#[derive(Debug, Clone)]
pub enum AddRuleOutcome {
    Created(AppRule),
    Duplicate,
}

/// Pattern lists used to replace every rule of a team at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkRules {
    #[serde(default)]
    pub productive: Vec<String>,
    #[serde(default)]
    pub neutral: Vec<String>,
    #[serde(default)]
    pub non_productive: Vec<String>,
}

impl BulkRules {
    pub fn into_new_rules(self) -> Result<Vec<NewRule>> {
        [
            (Category::Productive, self.productive),
            (Category::Neutral, self.neutral),
            (Category::NonProductive, self.non_productive),
        ]
        .into_iter()
        .flat_map(|(category, patterns)| {
            patterns
                .into_iter()
                .map(move |pattern| NewRule::new(&pattern, category, MatchType::Contains))
        })
        .collect()
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: anyhow::Error| FromSqlError::Other(error.into()))
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl ToSql for MatchType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign key enforcement")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction()
            .context("Failed to start transaction")
    }

    pub fn team_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))
            .context("Failed to count teams")
    }

    pub fn rule_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM team_app_rules", [], |row| row.get(0))
            .context("Failed to count rules")
    }

    pub fn list_teams(&self) -> Result<Vec<TeamSummary>> {
        let mut statement = self.conn.prepare(
            "SELECT t.id, t.name, t.created_at, COUNT(r.id)
             FROM teams t
             LEFT JOIN team_app_rules r ON r.team_id = t.id
             GROUP BY t.id, t.name, t.created_at
             ORDER BY t.name ASC, t.id ASC",
        )?;

        let rows = statement
            .query_map([], |row| {
                Ok(TeamSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                    rule_count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list teams")?;

        Ok(rows)
    }

    pub fn team(&self, team_id: &str) -> Result<Option<TeamRow>> {
        self.conn
            .query_row(
                "SELECT id, name, manager_id, created_at FROM teams WHERE id = ?1",
                params![team_id],
                |row| {
                    Ok(TeamRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        manager_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query team")
    }

    pub fn create_team(&self, name: &TeamName) -> Result<TeamRow> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO teams (id, name) VALUES (?1, ?2)",
                params![&id, name.as_str()],
            )
            .context("Failed to insert team")?;

        self.team(&id)?
            .with_context(|| format!("Team disappeared after insert: {id}"))
    }

    pub fn rename_team(&self, team_id: &str, name: &TeamName) -> Result<bool> {
        let updated = self
            .conn
            .execute(
                "UPDATE teams SET name = ?1 WHERE id = ?2",
                params![name.as_str(), team_id],
            )
            .context("Failed to rename team")?;

        Ok(updated > 0)
    }

    /// Removes a team; its rules go with it through `ON DELETE CASCADE`.
    pub fn delete_team(&self, team_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM teams WHERE id = ?1", params![team_id])
            .context("Failed to delete team")?;

        Ok(deleted > 0)
    }

    /// Rules in display order: grouped by category, then by pattern.
    pub fn rules_for_team(&self, team_id: &str) -> Result<Vec<AppRule>> {
        self.query_rules(team_id, "ORDER BY category ASC, app_pattern ASC")
    }

    /// Rules in insertion order, which is the order they are applied in.
    pub fn rules_for_classification(&self, team_id: &str) -> Result<Vec<AppRule>> {
        self.query_rules(team_id, "ORDER BY id ASC")
    }

    fn query_rules(&self, team_id: &str, order_by: &str) -> Result<Vec<AppRule>> {
        let sql = format!(
            "{} WHERE team_id = ?1 {order_by}",
            queries::SELECT_RULE_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![team_id], rule_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query team rules")?;

        Ok(rows)
    }

    pub fn rule(&self, rule_id: i64) -> Result<Option<AppRule>> {
        let sql = format!("{} WHERE id = ?1", queries::SELECT_RULE_COLUMNS);
        self.conn
            .query_row(&sql, params![rule_id], rule_from_row)
            .optional()
            .context("Failed to query rule")
    }

    pub fn add_rule(&self, team_id: &str, rule: &NewRule) -> Result<AddRuleOutcome> {
        let inserted = insert_rule_if_absent(&self.conn, team_id, rule)?;
        if !inserted {
            return Ok(AddRuleOutcome::Duplicate);
        }

        let rule_id = self.conn.last_insert_rowid();
        let created = self
            .rule(rule_id)?
            .with_context(|| format!("Rule disappeared after insert: {rule_id}"))?;

        Ok(AddRuleOutcome::Created(created))
    }

    /// Deletes every rule of the team and inserts `rules` in one transaction.
    /// A pattern listed twice keeps its first category.
    pub fn replace_rules(&mut self, team_id: &str, rules: &[NewRule]) -> Result<usize> {
        let transaction = self.transaction()?;

        transaction
            .execute(
                "DELETE FROM team_app_rules WHERE team_id = ?1",
                params![team_id],
            )
            .context("Failed to delete existing rules")?;

        let inserted = rules.iter().try_fold(0_usize, |count, rule| {
            insert_rule_if_absent(&transaction, team_id, rule)
                .map(|inserted| count + usize::from(inserted))
        })?;

        transaction.commit().context("Failed to commit rules")?;
        Ok(inserted)
    }

    pub fn delete_rule(&self, team_id: &str, rule_id: i64) -> Result<Option<AppRule>> {
        let Some(rule) = self.rule(rule_id)?.filter(|rule| rule.team_id == team_id) else {
            return Ok(None);
        };

        self.conn
            .execute(
                "DELETE FROM team_app_rules WHERE id = ?1 AND team_id = ?2",
                params![rule_id, team_id],
            )
            .context("Failed to delete rule")?;

        Ok(Some(rule))
    }
}

/// Inserts a rule unless the team already has one for the same pattern.
/// Returns whether a row was written.
pub fn insert_rule_if_absent(conn: &Connection, team_id: &str, rule: &NewRule) -> Result<bool> {
    let changed = conn
        .execute(
            queries::INSERT_RULE_IF_ABSENT,
            params![team_id, &rule.app_pattern, rule.match_type, rule.category],
        )
        .with_context(|| format!("Failed to insert rule: {}", rule.app_pattern))?;

    Ok(changed > 0)
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<AppRule> {
    let id = row.get(0)?;
    Ok(AppRule {
        id,
        team_id: row.get(1)?,
        app_pattern: row.get(2)?,
        match_type: stored_match_type(id, row.get::<_, Option<String>>(3)?.as_deref()),
        category: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Other writers may store match types this build does not know; those rows
/// fall back to `contains` instead of failing the whole team.
fn stored_match_type(rule_id: i64, raw: Option<&str>) -> MatchType {
    let Some(raw) = raw else {
        return MatchType::default();
    };

    raw.parse().unwrap_or_else(|_| {
        warn!(rule_id, match_type = raw, "unknown stored match type; using contains");
        MatchType::Contains
    })
}
