//! Coop result screens: five pre-cut player slots per category.

use tracing::{debug, info};

use super::line_ints;
use crate::ocr::Recognition;

/// A nickname is kept only above this confidence.
pub const NAME_MIN_CONFIDENCE: f32 = 30.0;
/// A difficulty is kept only above this confidence.
pub const DIFFICULTY_MIN_CONFIDENCE: f32 = 80.0;

/// Recognitions for every slot, left to right.
#[derive(Clone, Debug, Default)]
pub struct CoopBlocks {
    pub names: Vec<Recognition>,
    pub difficulties: Vec<Recognition>,
    pub accuracies: Vec<Recognition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoopPlayer {
    /// Slot index, 0 = leftmost
    pub slot: usize,
    pub player: Option<String>,
    pub difficulty: Option<String>,
    /// perfect, great, good, bad, miss
    pub counts: [u32; 5],
    /// Confidence of the accuracy reading
    pub confidence: f32,
}

impl CoopPlayer {
    pub fn note_count(&self) -> u32 {
        self.counts.iter().sum()
    }
}

fn confident_text(block: Option<&Recognition>, floor: f32) -> Option<String> {
    block
        .filter(|b| b.confidence > floor)
        .map(|b| b.text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// One record per slot whose accuracy block reads as exactly five numbers.
///
/// Slots whose accuracy confidence is 0 are empty and skipped.
pub fn classify_coop(blocks: &CoopBlocks) -> Vec<CoopPlayer> {
    let mut players = Vec::new();

    for (slot, accuracy) in blocks.accuracies.iter().enumerate() {
        if accuracy.confidence == 0.0 {
            debug!("Slot {}: empty", slot);
            continue;
        }

        let numbers = line_ints(&accuracy.text);
        let Ok(counts) = <[u32; 5]>::try_from(numbers.as_slice()) else {
            debug!("Slot {}: {} numbers read, skipping", slot, numbers.len());
            continue;
        };

        let player = CoopPlayer {
            slot,
            player: confident_text(blocks.names.get(slot), NAME_MIN_CONFIDENCE),
            difficulty: confident_text(blocks.difficulties.get(slot), DIFFICULTY_MIN_CONFIDENCE),
            counts,
            confidence: accuracy.confidence,
        };
        debug!(
            "Slot {}: player={:?} difficulty={:?} counts={:?}",
            slot, player.player, player.difficulty, player.counts
        );
        players.push(player);
    }

    info!("Coop: {} player records", players.len());
    players
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(text: &str, confidence: f32) -> Recognition {
        Recognition::new(text, confidence)
    }

    fn full_lobby() -> CoopBlocks {
        CoopBlocks {
            names: vec![
                rec("miku", 88.0),
                rec("rin", 25.0),
                rec("len", 70.0),
                rec("luka", 91.0),
                rec("", 0.0),
            ],
            difficulties: vec![
                rec("MASTER", 93.0),
                rec("MASTER", 85.0),
                rec("EXPERT", 60.0),
                rec("MASTER", 90.0),
                rec("", 0.0),
            ],
            accuracies: vec![
                rec("1021\n3\n0\n0\n2", 91.0),
                rec("1000\n20\n3\n1\n2", 88.0),
                rec("880\n1\n0\n0\n0", 80.0),
                rec("1020\n5\n1\n0\n0", 86.0),
                rec("", 0.0),
            ],
        }
    }

    #[test]
    fn test_zero_confidence_slot_skipped() {
        let players = classify_coop(&full_lobby());
        assert_eq!(players.len(), 4);
        assert_eq!(
            players.iter().map(|p| p.slot).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_confidence_floors() {
        let players = classify_coop(&full_lobby());
        assert_eq!(players[0].player.as_deref(), Some("miku"));
        assert_eq!(players[1].player, None);
        assert_eq!(players[2].difficulty, None);
        assert_eq!(players[2].player.as_deref(), Some("len"));
        assert_eq!(players[3].difficulty.as_deref(), Some("MASTER"));
    }

    #[test]
    fn test_requires_exactly_five_numbers() {
        let mut blocks = full_lobby();
        blocks.accuracies[1] = rec("1000\n20\n3\n1", 88.0);
        blocks.accuracies[2] = rec("880\n1\n0\n0\n0\n7", 80.0);

        let players = classify_coop(&blocks);
        assert_eq!(players.iter().map(|p| p.slot).collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(players[0].counts, [1021, 3, 0, 0, 2]);
        assert_eq!(players[0].note_count(), 1026);
    }

    #[test]
    fn test_missing_name_blocks_tolerated() {
        let blocks = CoopBlocks {
            accuracies: vec![rec("500\n0\n0\n0\n0", 90.0)],
            ..CoopBlocks::default()
        };
        let players = classify_coop(&blocks);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].player, None);
        assert_eq!(players[0].difficulty, None);
    }
}
