use crate::analyzer::categorizer::Category;
use crate::analyzer::report::{ActivitySample, format_duration};
use serde::Serialize;
use std::collections::HashMap;

const PRODUCTIVE_HINTS: &[&str] = &[
    "visual studio",
    "vscode",
    "code",
    "pycharm",
    "intellij",
    "webstorm",
    "android studio",
    "xcode",
    "eclipse",
    "sublime",
    "vim",
    "neovim",
    "terminal",
    "powershell",
    "cmd",
    "git",
    "github",
    "gitlab",
    "bitbucket",
    "jira",
    "confluence",
    "notion",
    "linear",
    "asana",
    "trello",
    "figma",
    "sketch",
    "adobe",
    "photoshop",
    "illustrator",
    "postman",
    "insomnia",
    "docker",
    "kubernetes",
    "slack",
    "teams",
    "microsoft teams",
    "zoom",
    "google docs",
    "google sheets",
    "google slides",
    "excel",
    "word",
    "powerpoint",
    "outlook",
    "encord",
    "labelbox",
    "roboflow",
];

const NON_PRODUCTIVE_HINTS: &[&str] = &[
    "youtube",
    "netflix",
    "twitch",
    "tiktok",
    "instagram",
    "facebook",
    "twitter",
    "reddit",
    "9gag",
    "imgur",
    "pinterest",
    "spotify",
    "music",
    "whatsapp",
    "telegram",
    "discord",
    "steam",
    "epic games",
    "game",
    "gaming",
    "amazon",
    "flipkart",
    "shopping",
    "ebay",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleSuggestion {
    pub app_pattern: String,
    pub suggested_category: Category,
    pub confidence: Confidence,
    pub total_seconds: u64,
    pub usage_display: String,
}

/// Proposes categories for the most used apps that no existing pattern covers.
pub fn suggest_rules(
    samples: &[ActivitySample],
    existing_patterns: &[String],
    interval_seconds: u64,
    limit: usize,
) -> Vec<RuleSuggestion> {
    let existing = existing_patterns
        .iter()
        .map(|pattern| pattern.to_lowercase())
        .collect::<Vec<_>>();

    let mut order: Vec<&str> = Vec::new();
    let mut usage: HashMap<&str, u64> = HashMap::new();
    for sample in samples
        .iter()
        .filter(|sample| !sample.is_idle && !sample.app_name.is_empty())
    {
        let seconds = usage.entry(sample.app_name.as_str()).or_insert_with(|| {
            order.push(sample.app_name.as_str());
            0
        });
        *seconds = seconds.saturating_add(interval_seconds);
    }

    let mut unclassified = order
        .into_iter()
        .filter(|app| {
            let lowered = app.to_lowercase();
            !existing
                .iter()
                .any(|pattern| lowered.contains(pattern.as_str()))
        })
        .map(|app| (app, usage.get(app).copied().unwrap_or_default()))
        .collect::<Vec<_>>();
    unclassified.sort_by(|left, right| right.1.cmp(&left.1));
    unclassified.truncate(limit);

    unclassified
        .into_iter()
        .map(|(app, total_seconds)| {
            let (suggested_category, confidence) = guess_category(app);
            RuleSuggestion {
                app_pattern: app.to_string(),
                suggested_category,
                confidence,
                total_seconds,
                usage_display: format_duration(total_seconds),
            }
        })
        .collect()
}

fn guess_category(app_name: &str) -> (Category, Confidence) {
    let lowered = app_name.to_lowercase();

    if PRODUCTIVE_HINTS.iter().any(|hint| lowered.contains(hint)) {
        (Category::Productive, Confidence::High)
    } else if NON_PRODUCTIVE_HINTS
        .iter()
        .any(|hint| lowered.contains(hint))
    {
        (Category::NonProductive, Confidence::High)
    } else {
        (Category::Neutral, Confidence::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::{Confidence, suggest_rules};
    use crate::analyzer::categorizer::Category;
    use crate::analyzer::report::ActivitySample;

    fn samples(apps: &[(&str, usize)]) -> Vec<ActivitySample> {
        apps.iter()
            .flat_map(|(app, count)| {
                std::iter::repeat_with(move || ActivitySample {
                    app_name: app.to_string(),
                    window_title: None,
                    is_idle: false,
                })
                .take(*count)
            })
            .collect()
    }

    #[test]
    fn skips_apps_covered_by_existing_patterns() {
        let samples = samples(&[("Slack", 4), ("Steam", 2), ("Calculator", 1)]);
        let suggestions = suggest_rules(&samples, &["slack".to_string()], 5, 20);

        let apps = suggestions
            .iter()
            .map(|suggestion| suggestion.app_pattern.as_str())
            .collect::<Vec<_>>();
        assert_eq!(apps, ["Steam", "Calculator"]);

        assert_eq!(suggestions[0].suggested_category, Category::NonProductive);
        assert_eq!(suggestions[0].confidence, Confidence::High);
        assert_eq!(suggestions[0].total_seconds, 10);
        assert_eq!(suggestions[1].suggested_category, Category::Neutral);
        assert_eq!(suggestions[1].confidence, Confidence::Low);
    }

    #[test]
    fn productive_hints_take_precedence() {
        let samples = samples(&[("Xcode Game Template", 1)]);
        let suggestions = suggest_rules(&samples, &[], 5, 20);
        assert_eq!(suggestions[0].suggested_category, Category::Productive);
    }

    #[test]
    fn limits_and_formats_usage() {
        let mut samples = samples(&[("Figma", 780), ("Notes", 2), ("Maps", 1)]);
        samples.push(ActivitySample {
            app_name: "Maps".to_string(),
            window_title: None,
            is_idle: true,
        });

        let suggestions = suggest_rules(&samples, &[], 5, 2);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].usage_display, "1h 5m");
        assert_eq!(suggestions[1].app_pattern, "Notes");
        assert_eq!(suggestions[1].usage_display, "0m");
    }

    #[test]
    fn usage_saturates_instead_of_overflowing() {
        let samples = samples(&[("Calculator", 3)]);
        let suggestions = suggest_rules(&samples, &[], u64::MAX, 20);
        assert_eq!(suggestions[0].total_seconds, u64::MAX);
    }
}
