pub mod calc;
pub mod record;
pub mod tourney;

pub use calc::{
    Calculation, Judgements, Rank, accuracy, calculate, delta_label, parse_full_score, parse_score,
    rank_for, rating_delta,
};
pub use record::{ScoreRecord, assemble_local, assemble_solo};
pub use tourney::{TourneyPlayer, TourneyScore, TourneySession, TourneyStore};

use serde::Serialize;

use crate::charts::ChartEntry;
use crate::error::ScoreResult;

/// A reading matched to a chart, with its rating worked out.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedScore {
    pub chart: ChartEntry,
    pub score: Calculation,
}

impl ResolvedScore {
    pub fn new(chart: ChartEntry, judgements: Judgements) -> ScoreResult<Self> {
        let score = calculate(chart.rating_constant, judgements)?;
        Ok(Self { chart, score })
    }
}
