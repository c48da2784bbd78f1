//! Season-specific structural fixes, keyed by season label.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::records::GameweekRecord;

/// Season whose calendar was split by the mid-season postponement: the
/// upstream source numbers its last nine gameweeks 39..=47.
pub const POSTPONED_SEASON: &str = "2019-20";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// Rounds greater than `after` are renumbered `round - offset`.
    ShiftRounds { after: u32, offset: u32 },
}

impl Correction {
    pub fn apply(&self, round: u32) -> u32 {
        match *self {
            Correction::ShiftRounds { after, offset } => {
                if round > after {
                    round.saturating_sub(offset)
                } else {
                    round
                }
            }
        }
    }

    /// The raw-source round that `apply` maps onto `round`.
    pub fn source_round(&self, round: u32) -> u32 {
        match *self {
            Correction::ShiftRounds { after, offset } => {
                if round > after {
                    round + offset
                } else {
                    round
                }
            }
        }
    }
}

/// A correction bound to the season it applies to, as written in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRule {
    pub season: String,
    #[serde(flatten)]
    pub correction: Correction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionRegistry {
    rules: BTreeMap<String, Vec<Correction>>,
}

impl CorrectionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every known irregular season.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(
            POSTPONED_SEASON,
            Correction::ShiftRounds {
                after: 29,
                offset: 9,
            },
        );
        registry
    }

    pub fn from_rules(rules: &[CorrectionRule]) -> Self {
        let mut registry = Self::empty();
        for rule in rules {
            registry.register(&rule.season, rule.correction);
        }
        registry
    }

    pub fn register(&mut self, season: &str, correction: Correction) {
        self.rules
            .entry(season.to_string())
            .or_default()
            .push(correction);
    }

    pub fn rules_for(&self, season: &str) -> &[Correction] {
        self.rules.get(season).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_irregular(&self, season: &str) -> bool {
        !self.rules_for(season).is_empty()
    }

    /// Raw-source gameweek index holding canonical gameweek `round`.
    pub fn source_round(&self, season: &str, round: u32) -> u32 {
        self.rules_for(season)
            .iter()
            .rev()
            .fold(round, |acc, rule| rule.source_round(acc))
    }

    pub fn corrected_round(&self, season: &str, round: u32) -> u32 {
        self.rules_for(season)
            .iter()
            .fold(round, |acc, rule| rule.apply(acc))
    }

    /// Applies the season's rules to every record. Identity for seasons
    /// without rules.
    pub fn correct(&self, records: Vec<GameweekRecord>, season: &str) -> Vec<GameweekRecord> {
        if !self.is_irregular(season) {
            return records;
        }
        info!(season, "removing gameweek irregularities");
        records
            .into_iter()
            .map(|mut rec| {
                rec.round = self.corrected_round(season, rec.round);
                rec
            })
            .collect()
    }
}
