mod common;

use std::collections::HashSet;

use fpl_seasons::eligibility::{EligibilityThresholds, filter, season_totals};
use fpl_seasons::records::GameweekRecord;
use fpl_seasons::season::SeasonCompiler;

use common::*;

fn compiled(season: &str) -> Vec<GameweekRecord> {
    let config = config();
    let loader = loader();
    let corrections = config.correction_registry();
    SeasonCompiler::new(&loader, &config.sources, &corrections, ROUNDS)
        .compile(season)
        .unwrap()
        .records
}

#[test]
fn survivors_meet_both_thresholds_and_the_removed_miss_one() {
    let records = compiled(REGULAR);
    let totals = season_totals(&records);
    let mut points: Vec<i64> = totals.values().map(|t| t.total_points).collect();
    points.sort_unstable();
    // strictly above the lowest scorer so at least one player is removed
    let thresholds = EligibilityThresholds {
        min_points: points[0] + 1,
        min_minutes: 0,
    };

    let outcome = filter(records.clone(), &thresholds);
    assert!(outcome.removed_players >= 1);
    assert_eq!(outcome.removed_rows + outcome.records.len(), records.len());

    let kept: HashSet<u32> = outcome.records.iter().map(|r| r.element).collect();
    for (element, t) in &totals {
        let eligible =
            t.total_points >= thresholds.min_points && t.minutes >= thresholds.min_minutes;
        assert_eq!(kept.contains(element), eligible, "element {element}");
    }
    for element in &kept {
        let before = records.iter().filter(|r| r.element == *element).count();
        let after = outcome.records.iter().filter(|r| r.element == *element).count();
        assert_eq!(before, after);
    }
}

#[test]
fn minutes_threshold_applies_on_its_own() {
    let records = compiled(REGULAR);
    // everyone plays 90 a week; the double gameweek adds 30 for one forward
    let thresholds = EligibilityThresholds {
        min_points: 0,
        min_minutes: 90 * ROUNDS as i64 + 1,
    };
    let outcome = filter(records, &thresholds);
    let kept: HashSet<u32> = outcome.records.iter().map(|r| r.element).collect();
    assert_eq!(kept, HashSet::from([DOUBLE_PLAYER]));
    assert_eq!(outcome.removed_players, 3);
}

#[test]
fn zero_thresholds_keep_everything() {
    let records = compiled(POSTPONED);
    let outcome = filter(
        records.clone(),
        &EligibilityThresholds {
            min_points: 0,
            min_minutes: 0,
        },
    );
    assert_eq!(outcome.records, records);
    assert_eq!(outcome.removed_rows, 0);
}
