//! Place inference engine
//!
//! Analyzes weeks of historical hourly location aggregates, clustered by
//! spatial cell key, to infer which cells are home, work, or merely
//! frequent. A pure fold over the fetched rows followed by slotted
//! classification; callers own fetching and persistence, and promotion to a
//! user place happens only on explicit confirmation.

use crate::error::EngineError;
use crate::geo::RunningCentroid;
use crate::types::{CellStats, HourlyCellRow, InferredPlace, InferredPlaceType};
use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use chrono_tz::Tz;
use std::collections::{BTreeSet, HashMap};

/// Trailing history consumed per inference run (days)
pub const DEFAULT_TRAILING_DAYS: u32 = 14;

/// Thresholds for place inference. Defaults carry the engine's standard
/// floors; everything is tunable by the caller.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// Hours of presence required before a cluster competes for
    /// home/work/frequent
    pub min_cluster_hours: u32,
    pub min_overnight_hours: u32,
    pub min_work_hours: u32,
    pub overnight_ratio_floor: f64,
    pub work_ratio_floor: f64,
    pub frequent_min_days: u32,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            min_cluster_hours: 3,
            min_overnight_hours: 5,
            min_work_hours: 5,
            overnight_ratio_floor: 0.3,
            work_ratio_floor: 0.3,
            frequent_min_days: 3,
        }
    }
}

/// Per-cell aggregate rebuilt fresh on every run
#[derive(Debug, Clone, Default)]
struct CellCluster {
    cell_key: String,
    stats: CellStats,
    days: BTreeSet<NaiveDate>,
    centroid: RunningCentroid,
    existing_label: Option<String>,
    external_name: Option<String>,
}

/// Place inference engine
pub struct PlaceInferencer;

impl PlaceInferencer {
    /// Infer place types for the given historical rows.
    ///
    /// `timezone` is the user's IANA timezone, used to bucket hours into
    /// overnight/work/weekend locally. Rows with zero samples contribute no
    /// presence. Output is sorted by confidence descending, ties broken by
    /// total hours; at most one home and one work are emitted per run.
    pub fn infer(
        rows: &[HourlyCellRow],
        timezone: &str,
        options: &InferenceOptions,
    ) -> Result<Vec<InferredPlace>, EngineError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| EngineError::InvalidTimezone(timezone.to_string()))?;

        let clusters = build_clusters(rows, tz);
        let mut results = classify(clusters, options);

        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.stats.total_hours.cmp(&a.stats.total_hours))
        });
        Ok(results)
    }
}

fn build_clusters(rows: &[HourlyCellRow], tz: Tz) -> Vec<CellCluster> {
    let mut by_cell: HashMap<String, CellCluster> = HashMap::new();

    for row in rows {
        if row.sample_count == 0 {
            continue;
        }
        let cluster = by_cell
            .entry(row.cell_key.clone())
            .or_insert_with(|| CellCluster {
                cell_key: row.cell_key.clone(),
                ..Default::default()
            });

        let local = row.hour_start.with_timezone(&tz);
        let hour = local.hour();
        let weekday = local.weekday();
        let is_weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);

        cluster.stats.total_hours += 1;
        if hour >= 22 || hour < 6 {
            cluster.stats.overnight_hours += 1;
        }
        if !is_weekend && (9..17).contains(&hour) {
            cluster.stats.work_hours += 1;
        }
        if is_weekend {
            cluster.stats.weekend_hours += 1;
        }
        cluster.days.insert(local.date_naive());
        cluster.centroid.push(row.latitude, row.longitude);
        if cluster.existing_label.is_none() {
            cluster.existing_label = row.existing_label.clone();
        }
        if cluster.external_name.is_none() {
            cluster.external_name = row.external_name.clone();
        }
    }

    let mut clusters: Vec<CellCluster> = by_cell
        .into_values()
        .map(|mut c| {
            c.stats.distinct_days = c.days.len() as u32;
            c
        })
        .collect();
    clusters.sort_by(|a, b| {
        b.stats
            .total_hours
            .cmp(&a.stats.total_hours)
            .then_with(|| a.cell_key.cmp(&b.cell_key))
    });
    clusters
}

fn classify(clusters: Vec<CellCluster>, options: &InferenceOptions) -> Vec<InferredPlace> {
    // Slot winners are decided up front so the single-home/single-work
    // invariant holds regardless of iteration order
    let home_cell = pick_home(&clusters, options);
    let work_cell = pick_work(&clusters, options, home_cell.as_deref());

    let mut results = Vec::new();
    for cluster in clusters {
        let ratio = |count: u32| count as f64 / cluster.stats.total_hours.max(1) as f64;

        if let Some(label) = &cluster.existing_label {
            results.push(emit(
                &cluster,
                InferredPlaceType::Frequent,
                1.0,
                label.clone(),
                "Already labeled by user".to_string(),
            ));
            continue;
        }

        if home_cell.as_deref() == Some(cluster.cell_key.as_str()) {
            let overnight_ratio = ratio(cluster.stats.overnight_hours);
            let confidence = (0.6 + overnight_ratio * 0.35).min(0.95);
            let reasoning = format!(
                "{} of {} hours here were overnight ({:.0}%), across {} distinct days",
                cluster.stats.overnight_hours,
                cluster.stats.total_hours,
                overnight_ratio * 100.0,
                cluster.stats.distinct_days
            );
            results.push(emit(
                &cluster,
                InferredPlaceType::Home,
                confidence,
                "Home".to_string(),
                reasoning,
            ));
            continue;
        }

        if work_cell.as_deref() == Some(cluster.cell_key.as_str()) {
            let work_ratio = ratio(cluster.stats.work_hours);
            let confidence = (0.5 + work_ratio * 0.4).min(0.90);
            let label = cluster
                .external_name
                .clone()
                .unwrap_or_else(|| "Work".to_string());
            let reasoning = format!(
                "{} of {} hours here fell in weekday working hours ({:.0}%)",
                cluster.stats.work_hours,
                cluster.stats.total_hours,
                work_ratio * 100.0
            );
            results.push(emit(
                &cluster,
                InferredPlaceType::Work,
                confidence,
                label,
                reasoning,
            ));
            continue;
        }

        if cluster.stats.total_hours >= options.min_cluster_hours
            && cluster.stats.distinct_days >= options.frequent_min_days
        {
            let confidence = (0.35 + 0.05 * cluster.stats.distinct_days as f64).min(0.75);
            let label = cluster
                .external_name
                .clone()
                .unwrap_or_else(|| "Frequent place".to_string());
            let reasoning = format!(
                "Visited on {} distinct days for {} total hours",
                cluster.stats.distinct_days, cluster.stats.total_hours
            );
            results.push(emit(
                &cluster,
                InferredPlaceType::Frequent,
                confidence,
                label,
                reasoning,
            ));
            continue;
        }

        if cluster.stats.total_hours >= 1 {
            let label = cluster
                .external_name
                .clone()
                .unwrap_or_else(|| "Unlabeled place".to_string());
            let reasoning = format!(
                "Only {} hours of presence; label it to improve the timeline",
                cluster.stats.total_hours
            );
            results.push(emit(
                &cluster,
                InferredPlaceType::Unknown,
                0.2,
                label,
                reasoning,
            ));
        }
    }

    results
}

/// Home slot: the unlabeled cluster with the most overnight hours, subject
/// to the overnight floors. One per run.
fn pick_home(clusters: &[CellCluster], options: &InferenceOptions) -> Option<String> {
    clusters
        .iter()
        .filter(|c| c.existing_label.is_none())
        .filter(|c| c.stats.total_hours >= options.min_cluster_hours)
        .filter(|c| c.stats.overnight_hours >= options.min_overnight_hours)
        .filter(|c| {
            c.stats.overnight_hours as f64 / c.stats.total_hours.max(1) as f64
                >= options.overnight_ratio_floor
        })
        .max_by(|a, b| {
            a.stats
                .overnight_hours
                .cmp(&b.stats.overnight_hours)
                .then_with(|| a.stats.total_hours.cmp(&b.stats.total_hours))
                .then_with(|| b.cell_key.cmp(&a.cell_key))
        })
        .map(|c| c.cell_key.clone())
}

/// Work slot: among the remaining clusters, the one with the most weekday
/// working hours, subject to the work floors. One per run.
fn pick_work(
    clusters: &[CellCluster],
    options: &InferenceOptions,
    home_cell: Option<&str>,
) -> Option<String> {
    clusters
        .iter()
        .filter(|c| c.existing_label.is_none())
        .filter(|c| Some(c.cell_key.as_str()) != home_cell)
        .filter(|c| c.stats.total_hours >= options.min_cluster_hours)
        .filter(|c| c.stats.work_hours >= options.min_work_hours)
        .filter(|c| {
            c.stats.work_hours as f64 / c.stats.total_hours.max(1) as f64
                >= options.work_ratio_floor
        })
        .max_by(|a, b| {
            a.stats
                .work_hours
                .cmp(&b.stats.work_hours)
                .then_with(|| a.stats.total_hours.cmp(&b.stats.total_hours))
                .then_with(|| b.cell_key.cmp(&a.cell_key))
        })
        .map(|c| c.cell_key.clone())
}

fn emit(
    cluster: &CellCluster,
    inferred_type: InferredPlaceType,
    confidence: f64,
    suggested_label: String,
    reasoning: String,
) -> InferredPlace {
    let (latitude, longitude) = cluster.centroid.value().unwrap_or((0.0, 0.0));
    InferredPlace {
        cell_key: cluster.cell_key.clone(),
        inferred_type,
        confidence: confidence.clamp(0.0, 1.0),
        suggested_label,
        reasoning,
        latitude,
        longitude,
        stats: cluster.stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn row(cell: &str, day: u32, hour: u32) -> HourlyCellRow {
        HourlyCellRow {
            cell_key: cell.to_string(),
            hour_start: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            sample_count: 10,
            existing_label: None,
            external_name: None,
            latitude: 51.5,
            longitude: -0.1,
        }
    }

    fn overnight_rows(cell: &str, days: std::ops::Range<u32>) -> Vec<HourlyCellRow> {
        // 23:00 through 05:00 presence per day
        days.flat_map(|d| {
            let mut rows = vec![row(cell, d, 23)];
            rows.extend((0..6).map(|h| row(cell, d, h)));
            rows
        })
        .collect()
    }

    fn workday_rows(cell: &str, days: std::ops::Range<u32>) -> Vec<HourlyCellRow> {
        // 09:00-17:00 on March 2024 weekdays (Mar 4-8 are Mon-Fri)
        days.flat_map(|d| (9..17).map(move |h| row(cell, d, h))).collect()
    }

    #[test]
    fn test_empty_rows() {
        let result =
            PlaceInferencer::infer(&[], "UTC", &InferenceOptions::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_invalid_timezone() {
        let err = PlaceInferencer::infer(&[], "Not/AZone", &InferenceOptions::default());
        assert!(matches!(err, Err(EngineError::InvalidTimezone(_))));
    }

    #[test]
    fn test_home_and_work_detected() {
        let mut rows = overnight_rows("cell-home", 4..9);
        rows.extend(workday_rows("cell-work", 4..9));

        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();

        let home = result
            .iter()
            .find(|p| p.inferred_type == InferredPlaceType::Home)
            .unwrap();
        assert_eq!(home.cell_key, "cell-home");
        assert_eq!(home.suggested_label, "Home");
        assert!(home.confidence > 0.6 && home.confidence <= 0.95);

        let work = result
            .iter()
            .find(|p| p.inferred_type == InferredPlaceType::Work)
            .unwrap();
        assert_eq!(work.cell_key, "cell-work");
        assert_eq!(work.suggested_label, "Work");
        assert!(work.confidence > 0.5 && work.confidence <= 0.90);
    }

    #[test]
    fn test_single_home_slot() {
        // Two clusters qualify for home by raw thresholds; only the one
        // with strictly more overnight hours takes the slot
        let mut rows = overnight_rows("cell-a", 4..9); // 35 overnight hours
        rows.extend(overnight_rows("cell-b", 4..8)); // 28 overnight hours

        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();

        let homes: Vec<_> = result
            .iter()
            .filter(|p| p.inferred_type == InferredPlaceType::Home)
            .collect();
        assert_eq!(homes.len(), 1);
        assert_eq!(homes[0].cell_key, "cell-a");

        // The runner-up falls through to frequent/unknown evaluation
        let other = result.iter().find(|p| p.cell_key == "cell-b").unwrap();
        assert_ne!(other.inferred_type, InferredPlaceType::Home);
    }

    #[test]
    fn test_single_work_slot() {
        let mut rows = workday_rows("cell-x", 4..9);
        rows.extend(workday_rows("cell-y", 4..7));

        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();
        let works: Vec<_> = result
            .iter()
            .filter(|p| p.inferred_type == InferredPlaceType::Work)
            .collect();
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].cell_key, "cell-x");
    }

    #[test]
    fn test_user_label_emitted_verbatim_without_consuming_slot() {
        let mut labeled = overnight_rows("cell-gym", 4..9);
        for r in &mut labeled {
            r.existing_label = Some("Gym".to_string());
        }
        // A second, weaker overnight cluster should still win the home slot
        let mut rows = labeled;
        rows.extend(overnight_rows("cell-home", 4..8));

        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();

        let gym = result.iter().find(|p| p.cell_key == "cell-gym").unwrap();
        assert_eq!(gym.suggested_label, "Gym");
        assert_eq!(gym.confidence, 1.0);
        assert_eq!(gym.reasoning, "Already labeled by user");

        let home = result
            .iter()
            .find(|p| p.inferred_type == InferredPlaceType::Home)
            .unwrap();
        assert_eq!(home.cell_key, "cell-home");
    }

    #[test]
    fn test_work_label_prefers_external_name() {
        let mut rows = workday_rows("cell-work", 4..9);
        for r in &mut rows {
            r.external_name = Some("Acme HQ".to_string());
        }
        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();
        let work = result
            .iter()
            .find(|p| p.inferred_type == InferredPlaceType::Work)
            .unwrap();
        assert_eq!(work.suggested_label, "Acme HQ");
    }

    #[test]
    fn test_frequent_requires_distinct_days() {
        // Three midday visits on distinct days, not enough for work floors
        let rows = vec![row("cafe", 4, 12), row("cafe", 6, 13), row("cafe", 8, 12)];
        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].inferred_type, InferredPlaceType::Frequent);
        assert!(result[0].confidence <= 0.75);
    }

    #[test]
    fn test_sparse_cluster_reported_unknown() {
        let rows = vec![row("one-off", 5, 15)];
        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].inferred_type, InferredPlaceType::Unknown);
        assert_eq!(result[0].confidence, 0.2);
    }

    #[test]
    fn test_zero_sample_rows_dropped() {
        let mut r = row("ghost", 5, 15);
        r.sample_count = 0;
        let result =
            PlaceInferencer::infer(&[r], "UTC", &InferenceOptions::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_output_sorted_by_confidence() {
        let mut rows = overnight_rows("cell-home", 4..9);
        rows.extend(workday_rows("cell-work", 4..9));
        rows.push(row("one-off", 5, 15));

        let result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();
        for pair in result.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert!(result
            .iter()
            .all(|p| (0.0..=1.0).contains(&p.confidence)));
    }

    #[test]
    fn test_local_timezone_shifts_overnight() {
        // 06:00 UTC is 22:00 the previous day in America/Los_Angeles (PST,
        // UTC-8 in early March), so these hours count as overnight there
        let rows: Vec<_> = (4..11).map(|d| row("cell", d, 6)).collect();

        let utc_result =
            PlaceInferencer::infer(&rows, "UTC", &InferenceOptions::default()).unwrap();
        let la_result =
            PlaceInferencer::infer(&rows, "America/Los_Angeles", &InferenceOptions::default())
                .unwrap();

        assert_eq!(utc_result[0].stats.overnight_hours, 0);
        assert_eq!(la_result[0].stats.overnight_hours, 7);
    }
}
