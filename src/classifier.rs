//! Activity classification and confidence scoring
//!
//! Combines place category, app-usage breakdown, time of day, and optional
//! health evidence into one activity label, then fuses the evidence volumes
//! into a single confidence value. Deterministic and threshold-based; the
//! rule order is load-bearing and first match wins.

use crate::apps::total_seconds;
use crate::types::{ActivityLabel, AppCategory, AppUsageSummary, PlaceCategory};

/// Everything the classifier looks at for one segment
#[derive(Debug, Clone, Default)]
pub struct ClassifierInput<'a> {
    pub place_category: Option<PlaceCategory>,
    /// Aggregated usage for the segment window, `ignore` already excluded
    pub usage: &'a [AppUsageSummary],
    /// Local hour of the segment start
    pub local_hour: u32,
    pub is_weekday: bool,
    /// A workout interval overlaps this segment
    pub has_workout: bool,
    /// A sleep signal overlaps this segment
    pub is_sleeping: bool,
}

/// Evidence volumes feeding the confidence scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceInput {
    pub sample_count: usize,
    pub match_ratio: f64,
    pub session_count: usize,
    pub dominant_share: f64,
}

/// Activity classifier
pub struct ActivityClassifier;

impl ActivityClassifier {
    /// Classify one segment. First matching rule wins.
    pub fn classify(input: &ClassifierInput) -> ActivityLabel {
        // 1. Health signals outrank everything
        if input.has_workout {
            return ActivityLabel::Workout;
        }
        if input.is_sleeping {
            return ActivityLabel::Sleep;
        }

        // 2. Commute place
        if input.place_category == Some(PlaceCategory::Commute) {
            return ActivityLabel::Commute;
        }

        let total = total_seconds(input.usage);
        let screen_minutes = total / 60.0;
        let dominant = dominant_category(input.usage);

        // 3. Focused work, unless comms dominates the time share
        if dominant == Some(AppCategory::Work) && screen_minutes > 30.0 {
            let comms_share = share_of(input.usage, AppCategory::Comms, total);
            if comms_share > 0.4 {
                return ActivityLabel::CollaborativeWork;
            }
            return ActivityLabel::DeepWork;
        }

        // 4. Sustained comms
        if dominant == Some(AppCategory::Comms) && screen_minutes > 20.0 {
            return ActivityLabel::Meeting;
        }

        // 5. Entertainment during working hours reads differently
        if dominant == Some(AppCategory::Entertainment) {
            if input.is_weekday && (9..18).contains(&input.local_hour) {
                return ActivityLabel::DistractedTime;
            }
            return ActivityLabel::Leisure;
        }

        // 6. Social
        if dominant == Some(AppCategory::Social) {
            if screen_minutes > 30.0 {
                return ActivityLabel::ExtendedSocial;
            }
            return ActivityLabel::SocialBreak;
        }

        // 7. Phone barely used: fall back to where the user is
        if screen_minutes < 5.0 {
            return match input.place_category {
                Some(PlaceCategory::Home) => ActivityLabel::PersonalTime,
                Some(PlaceCategory::Work) => ActivityLabel::AwayFromDesk,
                _ => ActivityLabel::OfflineActivity,
            };
        }

        // 8. Nothing dominates
        ActivityLabel::MixedActivity
    }
}

/// Confidence scorer fusing location, screen-time, and consensus evidence.
///
/// Always in [0, 1].
pub fn score_confidence(input: &ConfidenceInput) -> f64 {
    let location = if input.sample_count >= 10 {
        0.4 * input.match_ratio.min(1.0)
    } else if input.sample_count >= 5 {
        0.2 * input.match_ratio.min(1.0)
    } else {
        0.0
    };

    let screen = if input.session_count >= 5 {
        0.3
    } else if input.session_count >= 2 {
        0.15
    } else {
        0.0
    };

    let consensus = 0.3 * input.dominant_share.clamp(0.0, 1.0);

    (location + screen + consensus).clamp(0.0, 1.0)
}

/// Category with the largest share of screen time
pub fn dominant_category(usage: &[AppUsageSummary]) -> Option<AppCategory> {
    let mut totals: Vec<(AppCategory, f64)> = Vec::new();
    for u in usage {
        let Some(category) = u.category else { continue };
        match totals.iter_mut().find(|(c, _)| *c == category) {
            Some(entry) => entry.1 += u.seconds,
            None => totals.push((category, u.seconds)),
        }
    }
    totals
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, _)| c)
}

/// Share of total seconds held by the dominant category, 0 when idle
pub fn dominant_share(usage: &[AppUsageSummary]) -> f64 {
    let total = total_seconds(usage);
    if total <= 0.0 {
        return 0.0;
    }
    let Some(dominant) = dominant_category(usage) else {
        return 0.0;
    };
    share_of(usage, dominant, total)
}

fn share_of(usage: &[AppUsageSummary], category: AppCategory, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    usage
        .iter()
        .filter(|u| u.category == Some(category))
        .map(|u| u.seconds)
        .sum::<f64>()
        / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn usage(entries: &[(&str, f64, AppCategory)]) -> Vec<AppUsageSummary> {
        entries
            .iter()
            .map(|(id, seconds, category)| AppUsageSummary {
                app_id: id.to_string(),
                seconds: *seconds,
                category: Some(*category),
            })
            .collect()
    }

    fn input<'a>(usage: &'a [AppUsageSummary]) -> ClassifierInput<'a> {
        ClassifierInput {
            place_category: None,
            usage,
            local_hour: 10,
            is_weekday: true,
            has_workout: false,
            is_sleeping: false,
        }
    }

    #[test]
    fn test_workout_outranks_everything() {
        let u = usage(&[("figma", 3600.0, AppCategory::Work)]);
        let mut i = input(&u);
        i.has_workout = true;
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::Workout);
    }

    #[test]
    fn test_sleep_signal() {
        let u = usage(&[]);
        let mut i = input(&u);
        i.is_sleeping = true;
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::Sleep);
    }

    #[test]
    fn test_commute_place() {
        let u = usage(&[("spotify", 900.0, AppCategory::Entertainment)]);
        let mut i = input(&u);
        i.place_category = Some(PlaceCategory::Commute);
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::Commute);
    }

    #[test]
    fn test_deep_work() {
        let u = usage(&[
            ("figma", 2400.0, AppCategory::Work),
            ("slack", 600.0, AppCategory::Comms),
        ]);
        assert_eq!(ActivityClassifier::classify(&input(&u)), ActivityLabel::DeepWork);
    }

    #[test]
    fn test_collaborative_work_when_comms_heavy() {
        // Work dominates, but comms holds >40% of the time
        let u = usage(&[
            ("figma", 1600.0, AppCategory::Work),
            ("slack", 1500.0, AppCategory::Comms),
        ]);
        assert_eq!(
            ActivityClassifier::classify(&input(&u)),
            ActivityLabel::CollaborativeWork
        );
    }

    #[test]
    fn test_meeting() {
        let u = usage(&[("zoom", 1500.0, AppCategory::Comms)]);
        assert_eq!(ActivityClassifier::classify(&input(&u)), ActivityLabel::Meeting);
    }

    #[test]
    fn test_entertainment_weekday_office_hours_is_distracted() {
        let u = usage(&[("youtube", 1200.0, AppCategory::Entertainment)]);
        let mut i = input(&u);
        i.local_hour = 14;
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::DistractedTime);

        i.local_hour = 20;
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::Leisure);

        i.local_hour = 14;
        i.is_weekday = false;
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::Leisure);
    }

    #[test]
    fn test_social_split_on_duration() {
        let long = usage(&[("instagram", 2400.0, AppCategory::Social)]);
        assert_eq!(
            ActivityClassifier::classify(&input(&long)),
            ActivityLabel::ExtendedSocial
        );

        let short = usage(&[("instagram", 900.0, AppCategory::Social)]);
        assert_eq!(
            ActivityClassifier::classify(&input(&short)),
            ActivityLabel::SocialBreak
        );
    }

    #[test]
    fn test_low_screen_time_falls_back_to_place() {
        let u = usage(&[("maps", 120.0, AppCategory::Utility)]);
        let mut i = input(&u);
        i.place_category = Some(PlaceCategory::Home);
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::PersonalTime);

        i.place_category = Some(PlaceCategory::Work);
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::AwayFromDesk);

        i.place_category = None;
        assert_eq!(ActivityClassifier::classify(&i), ActivityLabel::OfflineActivity);
    }

    #[test]
    fn test_mixed_activity_fallback() {
        let u = usage(&[
            ("maps", 600.0, AppCategory::Utility),
            ("chrome", 500.0, AppCategory::Utility),
        ]);
        assert_eq!(
            ActivityClassifier::classify(&input(&u)),
            ActivityLabel::MixedActivity
        );
    }

    #[test]
    fn test_confidence_tiers() {
        // Full evidence
        let full = ConfidenceInput {
            sample_count: 12,
            match_ratio: 1.0,
            session_count: 6,
            dominant_share: 1.0,
        };
        assert!((score_confidence(&full) - 1.0).abs() < 1e-9);

        // Mid location evidence halves the location weight
        let mid = ConfidenceInput {
            sample_count: 7,
            match_ratio: 1.0,
            session_count: 3,
            dominant_share: 0.5,
        };
        assert!((score_confidence(&mid) - (0.2 + 0.15 + 0.15)).abs() < 1e-9);

        // Below all floors
        let none = ConfidenceInput::default();
        assert_eq!(score_confidence(&none), 0.0);
    }

    #[test]
    fn test_confidence_always_bounded() {
        let extreme = ConfidenceInput {
            sample_count: 1000,
            match_ratio: 5.0,
            session_count: 100,
            dominant_share: 3.0,
        };
        let score = score_confidence(&extreme);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_dominant_share() {
        let u = usage(&[
            ("figma", 3000.0, AppCategory::Work),
            ("instagram", 1000.0, AppCategory::Social),
        ]);
        assert!((dominant_share(&u) - 0.75).abs() < 1e-9);
        assert_eq!(dominant_share(&[]), 0.0);
    }
}
