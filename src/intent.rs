//! Standalone intent classification
//!
//! A simpler threshold engine that labels a pure app-usage summary — no
//! location context — as work, leisure, distracted work, mixed, or offline.
//! Comms time counts toward the productive share and reports under "work"
//! in the breakdown.

use crate::apps::{categorize, category_seconds};
use crate::types::{AppCategory, AppUsageSummary, IntentLabel, IntentResult};
use std::collections::{BTreeMap, HashMap};

/// Work share at or above which the window is `work`
pub const WORK_SHARE_THRESHOLD: f64 = 0.6;

/// Leisure (social + entertainment) share at or above which the window is
/// `leisure`
pub const LEISURE_SHARE_THRESHOLD: f64 = 0.6;

/// Work-share band `[0.4, 0.6)` with social at or above this share is
/// `distracted_work`
pub const DISTRACTED_SOCIAL_THRESHOLD: f64 = 0.25;

/// Intent classifier over a bare usage summary
pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify a window of app usage.
    ///
    /// Unset categories resolve through the standard lookup with the given
    /// overrides. `ignore` apps contribute nothing.
    pub fn classify(
        usage: &[AppUsageSummary],
        overrides: &HashMap<String, AppCategory>,
    ) -> IntentResult {
        let resolved: Vec<AppUsageSummary> = usage
            .iter()
            .map(|u| AppUsageSummary {
                app_id: u.app_id.clone(),
                seconds: u.seconds,
                category: Some(
                    u.category
                        .unwrap_or_else(|| categorize(&u.app_id, overrides)),
                ),
            })
            .filter(|u| u.category != Some(AppCategory::Ignore))
            .collect();

        let work = category_seconds(&resolved, AppCategory::Work, overrides)
            + category_seconds(&resolved, AppCategory::Comms, overrides);
        let social = category_seconds(&resolved, AppCategory::Social, overrides);
        let entertainment = category_seconds(&resolved, AppCategory::Entertainment, overrides);
        let utility = category_seconds(&resolved, AppCategory::Utility, overrides);
        let total = work + social + entertainment + utility;

        let mut breakdown = BTreeMap::new();
        if work > 0.0 {
            breakdown.insert("work".to_string(), work);
        }
        if social > 0.0 {
            breakdown.insert("social".to_string(), social);
        }
        if entertainment > 0.0 {
            breakdown.insert("entertainment".to_string(), entertainment);
        }
        if utility > 0.0 {
            breakdown.insert("utility".to_string(), utility);
        }

        if total <= 0.0 {
            return IntentResult {
                label: IntentLabel::Offline,
                breakdown,
                total_seconds: 0.0,
                reasoning: "No screen time recorded in this window".to_string(),
            };
        }

        let work_share = work / total;
        let social_share = social / total;
        let leisure_share = (social + entertainment) / total;

        let (label, reasoning) = if work_share >= WORK_SHARE_THRESHOLD {
            (
                IntentLabel::Work,
                format!(
                    "Work apps account for {:.0}% of {:.0} min of screen time",
                    work_share * 100.0,
                    total / 60.0
                ),
            )
        } else if leisure_share >= LEISURE_SHARE_THRESHOLD {
            (
                IntentLabel::Leisure,
                format!(
                    "Social and entertainment apps account for {:.0}% of screen time",
                    leisure_share * 100.0
                ),
            )
        } else if (0.4..WORK_SHARE_THRESHOLD).contains(&work_share)
            && social_share >= DISTRACTED_SOCIAL_THRESHOLD
        {
            (
                IntentLabel::DistractedWork,
                format!(
                    "Work apps hold {:.0}% of screen time but social apps hold {:.0}%",
                    work_share * 100.0,
                    social_share * 100.0
                ),
            )
        } else {
            (
                IntentLabel::Mixed,
                format!(
                    "No category dominates: work {:.0}%, social {:.0}%, entertainment {:.0}%",
                    work_share * 100.0,
                    social_share * 100.0,
                    entertainment / total * 100.0
                ),
            )
        };

        IntentResult {
            label,
            breakdown,
            total_seconds: total,
            reasoning,
        }
    }
}
