use crate::db::AppRule;
use anyhow::{Result, bail};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const MAX_PATTERN_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Productive,
    NonProductive,
    #[default]
    Neutral,
}

impl Category {
    /// Ordering used when picking a primary category on ties.
    pub const ALL: [Category; 3] = [Self::Productive, Self::Neutral, Self::NonProductive];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Productive => "productive",
            Self::NonProductive => "non_productive",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "productive" => Ok(Self::Productive),
            "non_productive" | "non-productive" | "nonproductive" => Ok(Self::NonProductive),
            "neutral" => Ok(Self::Neutral),
            other => bail!(
                "Invalid category: {other}. Must be one of: productive, non_productive, neutral"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Contains,
    Exact,
    StartsWith,
    Regex,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Exact => "exact",
            Self::StartsWith => "startswith",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "exact" => Ok(Self::Exact),
            "startswith" | "starts_with" => Ok(Self::StartsWith),
            "regex" => Ok(Self::Regex),
            other => bail!(
                "Invalid match type: {other}. Must be one of: contains, exact, startswith, regex"
            ),
        }
    }
}

/// Checks a user-supplied pattern and returns it trimmed.
pub fn validate_pattern(pattern: &str, match_type: MatchType) -> Result<String> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        bail!("app_pattern must not be empty");
    }
    if trimmed.chars().count() > MAX_PATTERN_CHARS {
        bail!("app_pattern must be at most {MAX_PATTERN_CHARS} characters");
    }
    if match_type == MatchType::Regex {
        if let Err(error) = compile_regex(trimmed) {
            bail!("Invalid regex pattern '{trimmed}': {error}");
        }
    }

    Ok(trimmed.to_string())
}

fn compile_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub rule_id: Option<i64>,
}

#[derive(Debug)]
enum Matcher {
    Contains(String),
    Exact(String),
    StartsWith(String),
    Regex(Regex),
}

#[derive(Debug)]
struct CompiledRule {
    id: i64,
    matcher: Matcher,
    category: Category,
}

/// A team's rules, ready to be applied in order. The first matching rule wins.
#[derive(Debug, Default)]
pub struct Classifier {
    rules: Vec<CompiledRule>,
}

impl Classifier {
    pub fn new(rules: &[AppRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| {
                let pattern = rule.app_pattern.to_lowercase();
                let matcher = match rule.match_type {
                    MatchType::Contains => Matcher::Contains(pattern),
                    MatchType::Exact => Matcher::Exact(pattern),
                    MatchType::StartsWith => Matcher::StartsWith(pattern),
                    MatchType::Regex => match compile_regex(&rule.app_pattern) {
                        Ok(regex) => Matcher::Regex(regex),
                        Err(error) => {
                            warn!(rule_id = rule.id, error = %error, "skipping rule with invalid regex");
                            return None;
                        }
                    },
                };

                Some(CompiledRule {
                    id: rule.id,
                    matcher,
                    category: rule.category,
                })
            })
            .collect::<Vec<_>>();

        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn classify(&self, app_name: &str, window_title: Option<&str>) -> Classification {
        let app = app_name.to_lowercase();
        let title = window_title.unwrap_or_default().to_lowercase();
        let combined = format!("{app} {title}");

        self.rules
            .iter()
            .find(|rule| match &rule.matcher {
                Matcher::Contains(pattern) => combined.contains(pattern.as_str()),
                Matcher::Exact(pattern) => *pattern == app || *pattern == title,
                Matcher::StartsWith(pattern) => {
                    app.starts_with(pattern.as_str()) || title.starts_with(pattern.as_str())
                }
                Matcher::Regex(regex) => {
                    regex.is_match(app_name) || regex.is_match(window_title.unwrap_or_default())
                }
            })
            .map(|rule| Classification {
                category: rule.category,
                rule_id: Some(rule.id),
            })
            .unwrap_or(Classification {
                category: Category::Neutral,
                rule_id: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, Classifier, MatchType, validate_pattern};
    use crate::db::AppRule;

    fn rule(id: i64, pattern: &str, match_type: MatchType, category: Category) -> AppRule {
        AppRule {
            id,
            team_id: "team".to_string(),
            app_pattern: pattern.to_string(),
            match_type,
            category,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn contains_matches_window_title_case_insensitively() {
        let classifier = Classifier::new(&[rule(
            1,
            "meet.google.com",
            MatchType::Contains,
            Category::Productive,
        )]);

        let result = classifier.classify("Google Chrome", Some("Standup - MEET.GOOGLE.COM"));
        assert_eq!(result.category, Category::Productive);
        assert_eq!(result.rule_id, Some(1));
    }

    #[test]
    fn unmatched_activity_is_neutral() {
        let classifier = Classifier::new(&[rule(
            1,
            "Slack",
            MatchType::Contains,
            Category::Productive,
        )]);

        let result = classifier.classify("Finder", None);
        assert_eq!(result.category, Category::Neutral);
        assert_eq!(result.rule_id, None);
    }

    #[test]
    fn first_matching_rule_wins() {
        let classifier = Classifier::new(&[
            rule(1, "YouTube", MatchType::Contains, Category::NonProductive),
            rule(2, "Chrome", MatchType::Contains, Category::Productive),
        ]);

        let result = classifier.classify("Chrome", Some("Lo-fi beats - YouTube"));
        assert_eq!(result.category, Category::NonProductive);
        assert_eq!(result.rule_id, Some(1));
    }

    #[test]
    fn exact_and_startswith_look_at_each_field_separately() {
        let classifier = Classifier::new(&[
            rule(1, "terminal", MatchType::Exact, Category::Productive),
            rule(2, "Jira", MatchType::StartsWith, Category::Productive),
        ]);

        assert_eq!(classifier.classify("Terminal", None).rule_id, Some(1));
        assert_eq!(classifier.classify("iTerm", Some("terminal")).rule_id, Some(1));
        assert_eq!(classifier.classify("Terminal 2", None).rule_id, None);
        assert_eq!(
            classifier.classify("Chrome", Some("JIRA-123 board")).rule_id,
            Some(2)
        );
        assert_eq!(classifier.classify("Chrome", Some("My Jira")).rule_id, None);
    }

    #[test]
    fn regex_rules_match_and_invalid_ones_are_skipped() {
        let classifier = Classifier::new(&[
            rule(1, "([", MatchType::Regex, Category::NonProductive),
            rule(2, r"^pull request #\d+", MatchType::Regex, Category::Productive),
        ]);

        assert_eq!(classifier.len(), 1);
        assert_eq!(
            classifier
                .classify("Firefox", Some("Pull Request #42 - GitHub"))
                .category,
            Category::Productive
        );
    }

    #[test]
    fn parses_categories_and_match_types() {
        assert_eq!(" Productive ".parse::<Category>().unwrap(), Category::Productive);
        assert_eq!(
            "non-productive".parse::<Category>().unwrap(),
            Category::NonProductive
        );
        assert!("distraction".parse::<Category>().is_err());
        assert_eq!("startswith".parse::<MatchType>().unwrap(), MatchType::StartsWith);
        assert!("fuzzy".parse::<MatchType>().is_err());
    }

    #[test]
    fn validates_patterns() {
        assert_eq!(
            validate_pattern("  Slack ", MatchType::Contains).unwrap(),
            "Slack"
        );
        assert!(validate_pattern("   ", MatchType::Contains).is_err());
        assert!(validate_pattern(&"x".repeat(256), MatchType::Contains).is_err());
        assert!(validate_pattern("([", MatchType::Regex).is_err());
    }
}
