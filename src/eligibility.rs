use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::records::GameweekRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EligibilityThresholds {
    pub min_points: i64,
    pub min_minutes: i64,
}

impl Default for EligibilityThresholds {
    fn default() -> Self {
        Self {
            min_points: 38,
            min_minutes: 525,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub records: Vec<GameweekRecord>,
    pub removed_players: usize,
    pub removed_rows: usize,
}

/// Season aggregates of a single player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeasonTotals {
    pub total_points: i64,
    pub minutes: i64,
}

pub fn season_totals(records: &[GameweekRecord]) -> HashMap<u32, SeasonTotals> {
    let mut totals: HashMap<u32, SeasonTotals> = HashMap::new();
    for rec in records {
        let entry = totals.entry(rec.element).or_default();
        entry.total_points += rec.total_points;
        entry.minutes += rec.minutes;
    }
    totals
}

/// Removes every row of players whose season points fall below
/// `min_points` or whose season minutes fall below `min_minutes`.
pub fn filter(records: Vec<GameweekRecord>, thresholds: &EligibilityThresholds) -> FilterOutcome {
    let deficit: HashSet<u32> = season_totals(&records)
        .into_iter()
        .filter(|(_, t)| {
            t.total_points < thresholds.min_points || t.minutes < thresholds.min_minutes
        })
        .map(|(element, _)| element)
        .collect();

    let before = records.len();
    let kept: Vec<GameweekRecord> = records
        .into_iter()
        .filter(|rec| !deficit.contains(&rec.element))
        .collect();

    debug!(
        removed_players = deficit.len(),
        min_points = thresholds.min_points,
        min_minutes = thresholds.min_minutes,
        "eligibility thresholds evaluated"
    );

    FilterOutcome {
        removed_rows: before - kept.len(),
        removed_players: deficit.len(),
        records: kept,
    }
}
