use crate::analyzer::categorizer::{Category, Classifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySample {
    pub app_name: String,
    #[serde(default)]
    pub window_title: Option<String>,
    #[serde(default)]
    pub is_idle: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySeconds {
    pub productive_seconds: u64,
    pub neutral_seconds: u64,
    pub non_productive_seconds: u64,
}

impl CategorySeconds {
    pub fn add(&mut self, category: Category, seconds: u64) {
        match category {
            Category::Productive => {
                self.productive_seconds = self.productive_seconds.saturating_add(seconds)
            }
            Category::Neutral => self.neutral_seconds = self.neutral_seconds.saturating_add(seconds),
            Category::NonProductive => {
                self.non_productive_seconds = self.non_productive_seconds.saturating_add(seconds)
            }
        }
    }

    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Productive => self.productive_seconds,
            Category::Neutral => self.neutral_seconds,
            Category::NonProductive => self.non_productive_seconds,
        }
    }

    pub fn total(&self) -> u64 {
        self.productive_seconds
            .saturating_add(self.neutral_seconds)
            .saturating_add(self.non_productive_seconds)
    }

    pub fn score(&self) -> u32 {
        productivity_score(self.productive_seconds, self.non_productive_seconds)
    }

    /// Category with the most time; ties go to the earlier entry of `Category::ALL`.
    pub fn primary(&self) -> Category {
        Category::ALL
            .into_iter()
            .fold(Category::Productive, |best, category| {
                if self.get(category) > self.get(best) {
                    category
                } else {
                    best
                }
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppUsage {
    pub name: String,
    #[serde(flatten)]
    pub seconds: CategorySeconds,
    pub total_seconds: u64,
    pub primary_category: Category,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductivityReport {
    pub team_id: String,
    #[serde(flatten)]
    pub totals: CategorySeconds,
    pub productivity_score: u32,
    pub total_samples: usize,
    pub top_apps: Vec<AppUsage>,
}

/// Share of productive time among classified (non-neutral) time, 0..=100.
/// Halves round to the nearest even integer.
pub fn productivity_score(productive: u64, non_productive: u64) -> u32 {
    if productive == 0 && non_productive == 0 {
        return 0;
    }

    let denominator = productive as f64 + non_productive as f64;
    (productive as f64 / denominator * 100.0).round_ties_even() as u32
}

pub fn build_productivity_report(
    team_id: &str,
    classifier: &Classifier,
    samples: &[ActivitySample],
    interval_seconds: u64,
    top_apps_limit: usize,
) -> ProductivityReport {
    let mut totals = CategorySeconds::default();
    let mut order: Vec<String> = Vec::new();
    let mut per_app: HashMap<String, CategorySeconds> = HashMap::new();

    let active = samples
        .iter()
        .filter(|sample| !sample.is_idle)
        .collect::<Vec<_>>();

    for sample in &active {
        let category = classifier
            .classify(&sample.app_name, sample.window_title.as_deref())
            .category;

        totals.add(category, interval_seconds);
        per_app
            .entry(sample.app_name.clone())
            .or_insert_with(|| {
                order.push(sample.app_name.clone());
                CategorySeconds::default()
            })
            .add(category, interval_seconds);
    }

    let mut top_apps = order
        .into_iter()
        .filter_map(|name| {
            per_app.remove(&name).map(|seconds| AppUsage {
                total_seconds: seconds.total(),
                primary_category: seconds.primary(),
                seconds,
                name,
            })
        })
        .collect::<Vec<_>>();
    top_apps.sort_by(|left, right| right.total_seconds.cmp(&left.total_seconds));
    top_apps.truncate(top_apps_limit);

    ProductivityReport {
        team_id: team_id.to_string(),
        productivity_score: totals.score(),
        totals,
        total_samples: active.len(),
        top_apps,
    }
}

pub fn render_text(report: &ProductivityReport, team_name: &str) -> String {
    let top_apps = if report.top_apps.is_empty() {
        "- No activity recorded".to_string()
    } else {
        report
            .top_apps
            .iter()
            .map(|app| {
                format!(
                    "- {} ({}, {})",
                    app.name,
                    format_duration(app.total_seconds),
                    app.primary_category
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# Productivity report: {}\n\n- score: {}%\n- samples: {}\n- productive: {}\n- neutral: {}\n- non_productive: {}\n\n## Top apps\n{}\n",
        team_name,
        report.productivity_score,
        report.total_samples,
        format_duration(report.totals.productive_seconds),
        format_duration(report.totals.neutral_seconds),
        format_duration(report.totals.non_productive_seconds),
        top_apps
    )
}

pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ActivitySample, CategorySeconds, build_productivity_report, format_duration,
        productivity_score, render_text,
    };
    use crate::analyzer::categorizer::{Category, Classifier, MatchType};
    use crate::db::AppRule;

    fn classifier() -> Classifier {
        let rules = [
            ("Slack", Category::Productive),
            ("YouTube", Category::NonProductive),
        ]
        .into_iter()
        .enumerate()
        .map(|(index, (pattern, category))| AppRule {
            id: index as i64 + 1,
            team_id: "team".to_string(),
            app_pattern: pattern.to_string(),
            match_type: MatchType::Contains,
            category,
            created_at: None,
            updated_at: None,
        })
        .collect::<Vec<_>>();

        Classifier::new(&rules)
    }

    fn sample(app: &str, title: Option<&str>, is_idle: bool) -> ActivitySample {
        ActivitySample {
            app_name: app.to_string(),
            window_title: title.map(ToOwned::to_owned),
            is_idle,
        }
    }

    #[test]
    fn score_ignores_neutral_time_and_rounds_half_to_even() {
        assert_eq!(productivity_score(0, 0), 0);
        assert_eq!(productivity_score(30, 10), 75);
        assert_eq!(productivity_score(5, 35), 12);
        assert_eq!(productivity_score(15, 25), 38);
    }

    #[test]
    fn report_tallies_active_samples_only() {
        let samples = vec![
            sample("Slack", None, false),
            sample("Slack", None, false),
            sample("Chrome", Some("Music - YouTube"), false),
            sample("Chrome", Some("Docs"), false),
            sample("Slack", None, true),
        ];

        let report = build_productivity_report("team", &classifier(), &samples, 5, 10);

        assert_eq!(report.total_samples, 4);
        assert_eq!(report.totals.productive_seconds, 10);
        assert_eq!(report.totals.non_productive_seconds, 5);
        assert_eq!(report.totals.neutral_seconds, 5);
        assert_eq!(report.productivity_score, 67);

        assert_eq!(report.top_apps.len(), 2);
        assert_eq!(report.top_apps[0].name, "Slack");
        let chrome = &report.top_apps[1];
        assert_eq!(chrome.total_seconds, 10);
        assert_eq!(chrome.primary_category, Category::Neutral);
    }

    #[test]
    fn top_apps_are_limited_and_keep_first_seen_order_on_ties() {
        let samples = vec![
            sample("Finder", None, false),
            sample("Notes", None, false),
            sample("Slack", None, false),
            sample("Slack", None, false),
        ];

        let report = build_productivity_report("team", &classifier(), &samples, 5, 2);
        let names = report
            .top_apps
            .iter()
            .map(|app| app.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Slack", "Finder"]);
    }

    #[test]
    fn primary_category_prefers_productive_on_ties() {
        let seconds = CategorySeconds {
            productive_seconds: 10,
            neutral_seconds: 10,
            non_productive_seconds: 10,
        };
        assert_eq!(seconds.primary(), Category::Productive);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(59), "0m");
        assert_eq!(format_duration(600), "10m");
        assert_eq!(format_duration(3_900), "1h 5m");
    }

    #[test]
    fn huge_intervals_saturate_instead_of_overflowing() {
        let samples = vec![
            sample("Slack", None, false),
            sample("Slack", None, false),
            sample("YouTube", None, false),
        ];

        let report = build_productivity_report("team", &classifier(), &samples, u64::MAX, 10);

        assert_eq!(report.totals.productive_seconds, u64::MAX);
        assert_eq!(report.totals.non_productive_seconds, u64::MAX);
        assert_eq!(report.totals.total(), u64::MAX);
        assert_eq!(report.productivity_score, 50);
        assert_eq!(report.top_apps[0].total_seconds, u64::MAX);
    }

    #[test]
    fn renders_text_summary() {
        let samples = vec![
            sample("Slack", None, false),
            sample("Chrome", Some("YouTube"), false),
        ];
        let report = build_productivity_report("team", &classifier(), &samples, 5, 10);
        let text = render_text(&report, "Ops");

        assert!(text.starts_with("# Productivity report: Ops\n"));
        assert!(text.contains("- score: 50%"));
        assert!(text.contains("- Slack (0m, productive)"));
        assert!(text.contains("- Chrome (0m, non_productive)"));
    }
}
