pub const CREATE_TEAMS: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
  id          VARCHAR(36) PRIMARY KEY,
  name        VARCHAR(100) NOT NULL,
  manager_id  VARCHAR(36),
  created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;

pub const CREATE_TEAM_APP_RULES: &str = r#"
CREATE TABLE IF NOT EXISTS team_app_rules (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  team_id      VARCHAR(36) NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
  app_pattern  VARCHAR(255) NOT NULL,
  match_type   VARCHAR(20) DEFAULT 'contains',
  category     VARCHAR(20) NOT NULL DEFAULT 'neutral',
  created_at   TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  updated_at   TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  UNIQUE (team_id, app_pattern)
);
"#;

pub const INDEX_TEAM_APP_RULES_TEAM_ID: &str =
    "CREATE INDEX IF NOT EXISTS idx_team_app_rules_team_id ON team_app_rules(team_id);";

pub const INDEX_TEAM_APP_RULES_CATEGORY: &str =
    "CREATE INDEX IF NOT EXISTS idx_team_app_rules_category ON team_app_rules(category);";

pub const INSERT_TEAM_IF_ABSENT: &str =
    "INSERT INTO teams (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING";

pub const INSERT_RULE_IF_ABSENT: &str = "INSERT INTO team_app_rules (team_id, app_pattern, match_type, category)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(team_id, app_pattern) DO NOTHING";

pub const SELECT_RULE_COLUMNS: &str =
    "SELECT id, team_id, app_pattern, match_type, category, created_at, updated_at FROM team_app_rules";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_TEAMS,
        CREATE_TEAM_APP_RULES,
        INDEX_TEAM_APP_RULES_TEAM_ID,
        INDEX_TEAM_APP_RULES_CATEGORY,
    ]
}
