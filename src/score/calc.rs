//! Judgement counts to accuracy to rating.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{ScoreError, ScoreResult};

/// One to five `/`-separated counts, e.g. `950/2/0/0/1` or `2/0/1`.
const SCORE_INPUT_PATTERN: &str = r"^\s*\d+\s*(?:/\s*\d+\s*){0,4}$";

static SCORE_INPUT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(SCORE_INPUT_PATTERN));

/// Hit counts of one play.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgements {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
}

impl Judgements {
    /// From counts in the order perfect, great, good, bad, miss.
    pub fn from_counts(counts: [u32; 5]) -> Self {
        let [perfect, great, good, bad, miss] = counts;
        Self {
            perfect,
            great,
            good,
            bad,
            miss,
        }
    }

    pub fn counts(&self) -> [u32; 5] {
        [self.perfect, self.great, self.good, self.bad, self.miss]
    }

    pub fn total(&self) -> u64 {
        self.counts().iter().map(|&c| u64::from(c)).sum()
    }

    /// Points lost against an all-perfect play.
    pub fn penalty(&self) -> u64 {
        u64::from(self.great)
            + 2 * u64::from(self.good)
            + 3 * u64::from(self.bad)
            + 3 * u64::from(self.miss)
    }

    /// Expands a shorthand of 1-4 counts (great, good, bad, miss) into a
    /// full set, deriving perfect from the chart's note total.
    pub fn backfill(given: &[u32], total_notes: u32) -> ScoreResult<Self> {
        if given.is_empty() || given.len() > 4 {
            return Err(ScoreError::InvalidScoreInput(format!(
                "shorthand takes 1 to 4 counts, got {}",
                given.len()
            )));
        }

        let mut rest = [0u32; 4];
        rest[..given.len()].copy_from_slice(given);
        let [great, good, bad, miss] = rest;

        let others: u64 = rest.iter().map(|&c| u64::from(c)).sum();
        let perfect = u64::from(total_notes)
            .checked_sub(others)
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| {
                ScoreError::InvalidScoreInput(format!(
                    "{} non-perfect notes exceed the chart's {} notes",
                    others, total_notes
                ))
            })?;

        Ok(Self {
            perfect,
            great,
            good,
            bad,
            miss,
        })
    }
}

impl fmt::Display for Judgements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.perfect, self.great, self.good, self.bad, self.miss
        )
    }
}

/// `(3T - penalty) / 3T` where `T` is the total note count.
pub fn accuracy(judgements: &Judgements) -> ScoreResult<f64> {
    let total = judgements.total();
    if total == 0 {
        return Err(ScoreError::InvalidScoreInput("no notes counted".to_string()));
    }
    let max = 3.0 * total as f64;
    Ok((max - judgements.penalty() as f64) / max)
}

/// Rating modifier for an accuracy. Above 1.0 is rejected, never clamped.
pub fn rating_delta(accuracy: f64) -> ScoreResult<f64> {
    if accuracy.is_nan() || accuracy > 1.0 {
        return Err(ScoreError::InvalidScoreInput(format!(
            "accuracy {:.4} is above 100%",
            accuracy
        )));
    }

    let delta = if accuracy >= 0.99 {
        (accuracy - 0.99) * 200.0 + 2.0
    } else if accuracy >= 0.97 {
        (accuracy - 0.97) * 100.0
    } else {
        (accuracy - 0.97) * 200.0 / 3.0
    };
    Ok(delta)
}

/// `+3.65`, `-1.20`, `0.00`
pub fn delta_label(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{:.2}", delta)
    } else {
        format!("{:.2}", delta)
    }
}

/// Parses typed score input against a chart with `total_notes` notes.
///
/// Five counts are taken as-is; fewer are a shorthand for the non-perfect
/// judgements (see [`Judgements::backfill`]).
pub fn parse_score(input: &str, total_notes: u32) -> ScoreResult<Judgements> {
    let counts = split_score_input(input)
        .map_err(|e| ScoreError::InvalidScoreInput(format!("{:#}", e)))?;

    match <[u32; 5]>::try_from(counts.as_slice()) {
        Ok(all) => Ok(Judgements::from_counts(all)),
        Err(_) => Judgements::backfill(&counts, total_notes),
    }
}

/// Parses exactly five counts.
pub fn parse_full_score(input: &str) -> ScoreResult<Judgements> {
    let counts = split_score_input(input)
        .map_err(|e| ScoreError::InvalidScoreInput(format!("{:#}", e)))?;
    <[u32; 5]>::try_from(counts.as_slice())
        .map(Judgements::from_counts)
        .map_err(|_| {
            ScoreError::InvalidScoreInput(format!("expected 5 counts, got {}", counts.len()))
        })
}

fn score_input_regex() -> anyhow::Result<&'static Regex> {
    SCORE_INPUT
        .as_ref()
        .map_err(|e| anyhow::anyhow!("invalid score input pattern: {}", e))
}

fn split_score_input(input: &str) -> anyhow::Result<Vec<u32>> {
    let pattern = score_input_regex()?;
    if !pattern.is_match(input) {
        anyhow::bail!("{:?} is not of the form perfect/great/good/bad/miss", input.trim());
    }
    input
        .split('/')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| anyhow::anyhow!("{:?}: {}", part.trim(), e))
        })
        .collect()
}

/// Tier name for a final rating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    SpaceGorilla,
    Gorilla,
    Diamond,
    Platinum,
    Gold,
    Silver,
    Bronze,
    Novice,
    Troll,
}

impl Rank {
    pub fn label(self) -> &'static str {
        match self {
            Rank::SpaceGorilla => "Space Gorilla",
            Rank::Gorilla => "Gorilla",
            Rank::Diamond => "Diamond",
            Rank::Platinum => "Platinum",
            Rank::Gold => "Gold",
            Rank::Silver => "Silver",
            Rank::Bronze => "Bronze",
            Rank::Novice => "Novice",
            Rank::Troll => "Troll",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn rank_for(rating: f64) -> Rank {
    const THRESHOLDS: [(f64, Rank); 8] = [
        (36.0, Rank::SpaceGorilla),
        (34.0, Rank::Gorilla),
        (32.0, Rank::Diamond),
        (30.0, Rank::Platinum),
        (26.0, Rank::Gold),
        (21.0, Rank::Silver),
        (17.5, Rank::Bronze),
        (0.0, Rank::Novice),
    ];
    THRESHOLDS
        .iter()
        .find(|(floor, _)| rating >= *floor)
        .map(|&(_, rank)| rank)
        .unwrap_or(Rank::Troll)
}

/// Everything derived from a rating constant and a set of counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub rating_constant: f64,
    pub judgements: Judgements,
    pub accuracy: f64,
    pub delta: f64,
    pub delta_label: String,
    pub rating: f64,
    pub rank: Rank,
}

pub fn calculate(rating_constant: f64, judgements: Judgements) -> ScoreResult<Calculation> {
    let accuracy = accuracy(&judgements)?;
    let delta = rating_delta(accuracy)?;
    let rating = rating_constant + delta;

    Ok(Calculation {
        rating_constant,
        judgements,
        accuracy,
        delta,
        delta_label: delta_label(delta),
        rating,
        rank: rank_for(rating),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_score_input_regex_compiled_once() {
        let first = score_input_regex().unwrap();
        let second = score_input_regex().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(first.is_match(" 950 / 2/0 /0/1 "));
        assert!(!first.is_match("950/2/0/0/1/3"));
        assert!(!first.is_match("9a/2"));
    }

    #[test]
    fn test_all_perfect_is_full_accuracy() {
        for total in [1, 590, 1500] {
            let judgements = Judgements::from_counts([total, 0, 0, 0, 0]);
            assert_eq!(accuracy(&judgements).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_accuracy_stays_in_range() {
        for counts in [[0, 0, 0, 0, 10], [5, 5, 5, 5, 5], [0, 100, 0, 0, 0], [1000, 0, 0, 1, 0]] {
            let acc = accuracy(&Judgements::from_counts(counts)).unwrap();
            assert!((0.0..=1.0).contains(&acc), "{:?} -> {}", counts, acc);
        }
    }

    #[test]
    fn test_zero_notes_rejected() {
        assert!(matches!(
            accuracy(&Judgements::default()),
            Err(ScoreError::InvalidScoreInput(_))
        ));
    }

    #[test]
    fn test_delta_bands() {
        assert!(close(rating_delta(1.0).unwrap(), 4.0));
        assert!(close(rating_delta(0.99).unwrap(), 2.0));
        assert!(close(rating_delta(0.9899).unwrap(), 1.99));
        assert!(close(rating_delta(0.97).unwrap(), 0.0));
        assert!(close(rating_delta(0.94).unwrap(), -2.0));
    }

    #[test]
    fn test_delta_bands_meet_at_099() {
        let below = rating_delta(0.99 - 1e-9).unwrap();
        assert!(below < 2.0);
        assert!((2.0 - below).abs() < 1e-6);
    }

    #[test]
    fn test_accuracy_above_one_rejected() {
        assert!(matches!(rating_delta(1.0001), Err(ScoreError::InvalidScoreInput(_))));
        assert!(rating_delta(f64::NAN).is_err());
    }

    #[test]
    fn test_delta_label() {
        assert_eq!(delta_label(3.6502), "+3.65");
        assert_eq!(delta_label(-1.2), "-1.20");
        assert_eq!(delta_label(0.0), "0.00");
    }

    #[test]
    fn test_backfill_shorthand() {
        let judgements = Judgements::backfill(&[2, 0, 1], 1000).unwrap();
        assert_eq!(judgements.counts(), [997, 2, 0, 1, 0]);

        let judgements = Judgements::backfill(&[12], 1000).unwrap();
        assert_eq!(judgements.counts(), [988, 12, 0, 0, 0]);
    }

    #[test]
    fn test_backfill_rejects_negative_perfect() {
        assert!(matches!(
            Judgements::backfill(&[600, 500], 1000),
            Err(ScoreError::InvalidScoreInput(_))
        ));
        assert!(Judgements::backfill(&[], 1000).is_err());
        assert!(Judgements::backfill(&[1, 1, 1, 1, 1], 1000).is_err());
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("950/2/0/0/1", 0).unwrap().counts(), [950, 2, 0, 0, 1]);
        assert_eq!(parse_score(" 3 / 0 / 0 / 2 ", 1026).unwrap().counts(), [1021, 3, 0, 0, 2]);
        assert!(parse_score("1/2/3/4/5/6", 100).is_err());
        assert!(parse_score("1/x", 100).is_err());
        assert!(parse_score("", 100).is_err());
        assert!(parse_score("-1/2", 100).is_err());
    }

    #[test]
    fn test_parse_full_score() {
        assert!(parse_full_score("950/2/0/0/1").is_ok());
        assert!(matches!(
            parse_full_score("2/0/1"),
            Err(ScoreError::InvalidScoreInput(_))
        ));
    }

    #[test]
    fn test_rank_thresholds() {
        assert_eq!(rank_for(36.0), Rank::SpaceGorilla);
        assert_eq!(rank_for(35.99), Rank::Gorilla);
        assert_eq!(rank_for(17.5), Rank::Bronze);
        assert_eq!(rank_for(0.0), Rank::Novice);
        assert_eq!(rank_for(-0.01), Rank::Troll);
        assert_eq!(Rank::SpaceGorilla.to_string(), "Space Gorilla");
    }

    #[test]
    fn test_result_screen_example() {
        let calc = calculate(25.0, Judgements::from_counts([950, 2, 0, 0, 1])).unwrap();
        let expected_acc = (3.0 * 953.0 - 5.0) / (3.0 * 953.0);
        assert!(close(calc.accuracy, expected_acc));
        assert!((calc.delta - 3.65).abs() < 0.001);
        assert_eq!(calc.delta_label, "+3.65");
        assert!((calc.rating - 28.65).abs() < 0.001);
        assert_eq!(calc.rank, Rank::Gold);
    }
}
