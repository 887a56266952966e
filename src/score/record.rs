//! Validates classified fields into a score record.

use tracing::warn;

use super::calc::{Judgements, accuracy};
use crate::charts::Difficulty;
use crate::classify::SoloFields;
use crate::error::{ScoreError, ScoreResult};

/// A validated reading of one play.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRecord {
    pub title: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub judgements: Judgements,
    pub accuracy: f64,
}

impl ScoreRecord {
    pub fn note_count(&self) -> u32 {
        u32::try_from(self.judgements.total()).unwrap_or(u32::MAX)
    }
}

fn all_counts(fields: &SoloFields) -> Option<[u32; 5]> {
    let [p, gr, go, b, m] = fields.counts;
    Some([p?, gr?, go?, b?, m?])
}

fn checked_accuracy(judgements: &Judgements) -> ScoreResult<f64> {
    let acc = accuracy(judgements)?;
    if !(0.0..=1.0).contains(&acc) {
        return Err(ScoreError::FieldClassificationIncomplete(format!(
            "accuracy {:.4} out of range",
            acc
        )));
    }
    Ok(acc)
}

/// A full-frame solo reading: title, difficulty and all five counts are required.
pub fn assemble_solo(fields: &SoloFields) -> ScoreResult<ScoreRecord> {
    let missing = fields.missing();
    if !missing.is_empty() {
        return Err(ScoreError::FieldClassificationIncomplete(format!(
            "missing {}",
            missing.join(", ")
        )));
    }

    let difficulty_text = fields.difficulty.as_deref().unwrap_or_default();
    let difficulty = difficulty_text
        .parse::<Difficulty>()
        .map_err(ScoreError::FieldClassificationIncomplete)?;
    let counts = all_counts(fields)
        .ok_or_else(|| ScoreError::FieldClassificationIncomplete("missing counts".to_string()))?;
    let judgements = Judgements::from_counts(counts);

    Ok(ScoreRecord {
        title: fields.title.clone(),
        difficulty: Some(difficulty),
        accuracy: checked_accuracy(&judgements)?,
        judgements,
    })
}

/// A local-engine solo reading: only the counts are required.
pub fn assemble_local(fields: &SoloFields) -> ScoreResult<ScoreRecord> {
    let counts = all_counts(fields).ok_or_else(|| {
        ScoreError::FieldClassificationIncomplete("judgement counts incomplete".to_string())
    })?;
    let judgements = Judgements::from_counts(counts);

    let difficulty = fields.difficulty.as_deref().and_then(|d| match d.parse::<Difficulty>() {
        Ok(difficulty) => Some(difficulty),
        Err(e) => {
            warn!("Ignoring difficulty: {}", e);
            None
        }
    });

    Ok(ScoreRecord {
        title: fields.title.clone(),
        difficulty,
        accuracy: checked_accuracy(&judgements)?,
        judgements,
    })
}
