//! App usage aggregation and categorization
//!
//! Computes per-app overlap with a time window and resolves app categories
//! through a layered lookup: user overrides, then the built-in table, then
//! a substring fallback, then `utility`.

use crate::types::{AppCategory, AppSession, AppUsageSummary};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Built-in category table. Immutable; user overrides layer on top and are
/// always passed explicitly, never read from ambient state.
const CATEGORY_TABLE: &[(&str, AppCategory)] = &[
    // Work
    ("figma", AppCategory::Work),
    ("vscode", AppCategory::Work),
    ("xcode", AppCategory::Work),
    ("intellij", AppCategory::Work),
    ("terminal", AppCategory::Work),
    ("notion", AppCategory::Work),
    ("obsidian", AppCategory::Work),
    ("github", AppCategory::Work),
    ("gitlab", AppCategory::Work),
    ("linear", AppCategory::Work),
    ("jira", AppCategory::Work),
    ("excel", AppCategory::Work),
    ("sheets", AppCategory::Work),
    ("docs", AppCategory::Work),
    // Comms
    ("slack", AppCategory::Comms),
    ("zoom", AppCategory::Comms),
    ("teams", AppCategory::Comms),
    ("meet", AppCategory::Comms),
    ("gmail", AppCategory::Comms),
    ("outlook", AppCategory::Comms),
    ("messages", AppCategory::Comms),
    ("whatsapp", AppCategory::Comms),
    ("telegram", AppCategory::Comms),
    ("signal", AppCategory::Comms),
    // Social
    ("instagram", AppCategory::Social),
    ("tiktok", AppCategory::Social),
    ("twitter", AppCategory::Social),
    ("facebook", AppCategory::Social),
    ("snapchat", AppCategory::Social),
    ("reddit", AppCategory::Social),
    ("linkedin", AppCategory::Social),
    // Entertainment
    ("youtube", AppCategory::Entertainment),
    ("netflix", AppCategory::Entertainment),
    ("spotify", AppCategory::Entertainment),
    ("twitch", AppCategory::Entertainment),
    ("steam", AppCategory::Entertainment),
    ("disneyplus", AppCategory::Entertainment),
    // Utility
    ("maps", AppCategory::Utility),
    ("calendar", AppCategory::Utility),
    ("camera", AppCategory::Utility),
    ("photos", AppCategory::Utility),
    ("settings", AppCategory::Utility),
    ("weather", AppCategory::Utility),
    ("chrome", AppCategory::Utility),
    ("safari", AppCategory::Utility),
    ("firefox", AppCategory::Utility),
    // Ignore
    ("launcher", AppCategory::Ignore),
    ("systemui", AppCategory::Ignore),
    ("lockscreen", AppCategory::Ignore),
    ("keyboard", AppCategory::Ignore),
];

fn normalize(app_id: &str) -> String {
    app_id.trim().to_lowercase()
}

/// Resolve an app's category.
///
/// Resolution order: user override, exact table match, substring match in
/// either direction, then `utility`. Pure; easy to test apart from any
/// store.
pub fn categorize(app_id: &str, overrides: &HashMap<String, AppCategory>) -> AppCategory {
    let id = normalize(app_id);

    if let Some(category) = overrides.get(&id) {
        return *category;
    }
    if let Some((_, category)) = CATEGORY_TABLE.iter().find(|(key, _)| *key == id) {
        return *category;
    }
    if let Some((_, category)) = CATEGORY_TABLE
        .iter()
        .find(|(key, _)| id.contains(key) || key.contains(id.as_str()) && id.len() >= 4)
    {
        return *category;
    }
    AppCategory::Utility
}

/// App usage aggregator
pub struct UsageAggregator;

impl UsageAggregator {
    /// Compute per-app overlap seconds with `[start, end)`.
    ///
    /// Duplicate sessions sum by app id, `ignore` apps are excluded, and
    /// output is sorted descending by seconds (app id breaks ties so the
    /// result is deterministic).
    pub fn aggregate(
        sessions: &[AppSession],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        overrides: &HashMap<String, AppCategory>,
    ) -> Vec<AppUsageSummary> {
        let mut totals: HashMap<String, f64> = HashMap::new();
        for session in sessions {
            let overlap_start = session.start.max(start);
            let overlap_end = session.end.min(end);
            let seconds = (overlap_end - overlap_start).num_milliseconds() as f64 / 1000.0;
            if seconds <= 0.0 {
                continue;
            }
            *totals.entry(normalize(&session.app_id)).or_insert(0.0) += seconds;
        }

        let mut usage: Vec<AppUsageSummary> = totals
            .into_iter()
            .filter_map(|(app_id, seconds)| {
                let category = categorize(&app_id, overrides);
                if category == AppCategory::Ignore {
                    return None;
                }
                Some(AppUsageSummary {
                    app_id,
                    seconds,
                    category: Some(category),
                })
            })
            .collect();

        usage.sort_by(|a, b| {
            b.seconds
                .partial_cmp(&a.seconds)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.app_id.cmp(&b.app_id))
        });
        usage
    }
}

/// Total seconds across summaries
pub fn total_seconds(usage: &[AppUsageSummary]) -> f64 {
    usage.iter().map(|u| u.seconds).sum()
}

/// Seconds attributed to one category, resolving any unset categories
pub fn category_seconds(
    usage: &[AppUsageSummary],
    category: AppCategory,
    overrides: &HashMap<String, AppCategory>,
) -> f64 {
    usage
        .iter()
        .filter(|u| u.category.unwrap_or_else(|| categorize(&u.app_id, overrides)) == category)
        .map(|u| u.seconds)
        .sum()
}
