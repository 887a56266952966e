//! Solo result screens.
//!
//! Cloud OCR hands back a flat bag of tokens. Fields are found by position
//! with a fixed table of rules, run in three passes over the tokens:
//!
//! 1. difficulty label, judgement row labels
//! 2. title fragments, perfect count (which fixes the count column)
//! 3. the other four counts, aligned on the perfect column
//!
//! Within a pass, rules are tried in table order and the first rule that
//! consumes a token ends the search for that token.

use tracing::{debug, info};

use super::{Judgement, ROW_TOLERANCE, RowBand, leading_int, line_ints, within};
use crate::error::{ScoreError, ScoreResult};
use crate::ocr::{Recognition, RecognizedToken};

/// Labels accepted as the difficulty of the played chart.
pub const DIFFICULTY_LABELS: [&str; 6] = ["easy", "normal", "hard", "expert", "master", "append"];

/// Fraction of the frame width left of which title and difficulty are searched.
const SEARCH_WIDTH_FRACTION: f64 = 0.6;
/// Difficulty label must start above this y.
const DIFFICULTY_MAX_Y: i32 = 220;
/// Title fragments must start above this y.
const TITLE_MAX_Y: i32 = 130;
/// How far left of the difficulty label a title fragment may start.
const TITLE_ANCHOR_SLACK: i32 = 50;
/// Below this confidence the Latin reading of a JP title may replace it.
const TITLE_FALLBACK_CONFIDENCE: f32 = 50.0;

/// Raw fields read off a solo screen; any of them may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SoloFields {
    pub title: Option<String>,
    pub difficulty: Option<String>,
    /// perfect, great, good, bad, miss
    pub counts: [Option<u32>; 5],
}

impl SoloFields {
    /// Names of the fields that were not found.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_none() {
            missing.push("title");
        }
        if self.difficulty.is_none() {
            missing.push("difficulty");
        }
        for judgement in Judgement::ALL {
            if self.counts[judgement.index()].is_none() {
                missing.push(judgement.label());
            }
        }
        missing
    }
}

#[derive(Debug, Default)]
struct Scan {
    /// Tokens at or right of this x are outside the title/difficulty area
    limit_x: f64,
    anchor_x: Option<i32>,
    title_row: Option<RowBand>,
    title: Vec<String>,
    difficulty: Option<String>,
    rows: [Option<RowBand>; 5],
    counts: [Option<u32>; 5],
    perfect_x_end: Option<i32>,
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Token used; skip the remaining rules of this pass
    Consumed,
    /// Try the next rule
    Pass,
}

struct Rule {
    field: &'static str,
    when: fn(&RecognizedToken, &Scan) -> bool,
    apply: fn(&RecognizedToken, &mut Scan) -> Step,
}

const PASSES: [&[Rule]; 3] = [
    &[
        Rule {
            field: "difficulty",
            when: in_difficulty_area,
            apply: take_difficulty,
        },
        Rule {
            field: "judgement label",
            when: is_judgement_label,
            apply: take_judgement_row,
        },
    ],
    &[
        Rule {
            field: "title",
            when: in_title_area,
            apply: take_title_fragment,
        },
        Rule {
            field: "perfect",
            when: on_row::<0>,
            apply: take_perfect,
        },
    ],
    &[
        Rule {
            field: "great",
            when: in_count_column::<1>,
            apply: take_count::<1>,
        },
        Rule {
            field: "good",
            when: in_count_column::<2>,
            apply: take_count::<2>,
        },
        Rule {
            field: "bad",
            when: in_count_column::<3>,
            apply: take_count::<3>,
        },
        Rule {
            field: "miss",
            when: in_count_column::<4>,
            apply: take_count::<4>,
        },
    ],
];

fn in_difficulty_area(token: &RecognizedToken, scan: &Scan) -> bool {
    (token.bbox.left as f64) < scan.limit_x
        && token.bbox.top < DIFFICULTY_MAX_Y
        && DIFFICULTY_LABELS.contains(&token.text.trim().to_lowercase().as_str())
}

fn take_difficulty(token: &RecognizedToken, scan: &mut Scan) -> Step {
    if scan.difficulty.is_none() {
        scan.difficulty = Some(token.text.trim().to_string());
        scan.anchor_x = Some(token.bbox.left);
    }
    Step::Consumed
}

fn is_judgement_label(token: &RecognizedToken, _scan: &Scan) -> bool {
    Judgement::from_label(&token.text).is_some()
}

fn take_judgement_row(token: &RecognizedToken, scan: &mut Scan) -> Step {
    if let Some(judgement) = Judgement::from_label(&token.text) {
        scan.rows[judgement.index()] = Some(RowBand::of(&token.bbox));
    }
    Step::Consumed
}

fn in_title_area(token: &RecognizedToken, scan: &Scan) -> bool {
    let Some(anchor_x) = scan.anchor_x else {
        return false;
    };
    token.bbox.left >= anchor_x - TITLE_ANCHOR_SLACK
        && (token.bbox.left as f64) < scan.limit_x
        && token.bbox.top < TITLE_MAX_Y
}

fn take_title_fragment(token: &RecognizedToken, scan: &mut Scan) -> Step {
    let row = *scan.title_row.get_or_insert_with(|| RowBand::of(&token.bbox));
    if row.matches(&token.bbox) {
        scan.title.push(token.text.clone());
        Step::Consumed
    } else {
        Step::Pass
    }
}

fn on_row<const J: usize>(token: &RecognizedToken, scan: &Scan) -> bool {
    scan.rows[J].is_some_and(|row| row.matches(&token.bbox))
}

fn take_perfect(token: &RecognizedToken, scan: &mut Scan) -> Step {
    take_count::<0>(token, scan)
}

fn in_count_column<const J: usize>(token: &RecognizedToken, scan: &Scan) -> bool {
    scan.perfect_x_end
        .is_some_and(|x_end| within(token.bbox.right, x_end, ROW_TOLERANCE))
        && on_row::<J>(token, scan)
}

fn take_count<const J: usize>(token: &RecognizedToken, scan: &mut Scan) -> Step {
    if scan.counts[J].is_some() {
        return Step::Pass;
    }
    let Some(value) = leading_int(&token.text) else {
        return Step::Pass;
    };
    scan.counts[J] = Some(value);
    if J == 0 {
        scan.perfect_x_end = Some(token.bbox.right);
    }
    Step::Consumed
}

/// Reads title, difficulty and the five counts from full-frame tokens.
///
/// The first token must be the whole-frame box; it only sets the search width.
pub fn classify_solo(tokens: &[RecognizedToken]) -> SoloFields {
    let Some((frame, tokens)) = tokens.split_first() else {
        return SoloFields::default();
    };

    let mut scan = Scan {
        limit_x: frame.bbox.right as f64 * SEARCH_WIDTH_FRACTION,
        ..Scan::default()
    };

    for rules in PASSES {
        for token in tokens {
            for rule in rules {
                if !(rule.when)(token, &scan) {
                    continue;
                }
                if (rule.apply)(token, &mut scan) == Step::Consumed {
                    debug!("{}: {:?} at {:?}", rule.field, token.text, token.bbox);
                    break;
                }
            }
        }
    }

    let title = scan.title.join(" ");
    let fields = SoloFields {
        title: (!title.trim().is_empty()).then_some(title),
        difficulty: scan.difficulty,
        counts: scan.counts,
    };
    info!(
        "Solo fields: title={:?} difficulty={:?} counts={:?}",
        fields.title, fields.difficulty, fields.counts
    );
    fields
}

/// Builds solo fields from the local engines' readings of the title and accuracy regions.
///
/// `fallback` is the Latin reading of a JP title. It replaces the primary
/// reading when that one is unsure and the fallback is surer. The accuracy
/// reading must yield exactly five numbers.
pub fn read_local_solo(
    title: &Recognition,
    fallback: Option<&Recognition>,
    digits: &Recognition,
) -> ScoreResult<SoloFields> {
    let chosen = match fallback {
        Some(latin)
            if title.confidence < TITLE_FALLBACK_CONFIDENCE && latin.confidence > title.confidence =>
        {
            debug!(
                "Using Latin title reading ({:.0} > {:.0})",
                latin.confidence, title.confidence
            );
            latin
        }
        _ => title,
    };
    let title = chosen.text.trim();

    let numbers = line_ints(&digits.text);
    info!("Local solo: {:?} {:?} (conf {:.0})", title, numbers, digits.confidence);

    let counts: [u32; 5] = numbers.as_slice().try_into().map_err(|_| {
        ScoreError::FieldClassificationIncomplete(format!(
            "expected 5 judgement counts, read {}",
            numbers.len()
        ))
    })?;

    Ok(SoloFields {
        title: (!title.is_empty()).then(|| title.to_string()),
        difficulty: None,
        counts: counts.map(Some),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;

    fn token(text: &str, left: i32, top: i32, right: i32, bottom: i32) -> RecognizedToken {
        RecognizedToken::new(text, BoundingBox::new(left, top, right, bottom))
    }

    /// A 1600x900 EN result screen: title "Verd ele", EXPERT, 950/2/0/0/1.
    fn result_screen() -> Vec<RecognizedToken> {
        vec![
            token("whole frame", 0, 0, 1600, 900),
            token("EXPERT", 200, 150, 330, 185),
            token("Verd", 210, 70, 300, 110),
            token("ele", 310, 72, 370, 112),
            token("PERFECT", 700, 400, 820, 430),
            token("950", 1000, 400, 1080, 430),
            token("GREAT", 700, 450, 800, 480),
            token("2", 1060, 450, 1080, 480),
            token("GOOD", 700, 500, 790, 530),
            token("0", 1062, 500, 1081, 530),
            token("BAD", 700, 550, 770, 580),
            token("0", 1061, 550, 1079, 580),
            token("MISS", 700, 600, 780, 630),
            token("1", 1063, 600, 1078, 630),
        ]
    }

    #[test]
    fn test_reads_full_result_screen() {
        let fields = classify_solo(&result_screen());
        assert_eq!(fields.title.as_deref(), Some("Verd ele"));
        assert_eq!(fields.difficulty.as_deref(), Some("EXPERT"));
        assert_eq!(fields.counts, [Some(950), Some(2), Some(0), Some(0), Some(1)]);
        assert!(fields.missing().is_empty());
    }

    #[test]
    fn test_token_order_does_not_matter() {
        let mut tokens = result_screen();
        tokens[1..].reverse();
        let fields = classify_solo(&tokens);
        assert_eq!(fields.counts, [Some(950), Some(2), Some(0), Some(0), Some(1)]);
        assert_eq!(fields.difficulty.as_deref(), Some("EXPERT"));
    }

    #[test]
    fn test_counts_outside_perfect_column_ignored() {
        let mut tokens = result_screen();
        // Combo column further right on the great row
        tokens.push(token("812", 1300, 450, 1400, 480));
        tokens.retain(|t| !(t.text == "2" && t.bbox.left == 1060));
        let fields = classify_solo(&tokens);
        assert_eq!(fields.counts[1], None);
        assert_eq!(fields.missing(), vec!["great"]);
    }

    #[test]
    fn test_title_off_row_excluded() {
        let mut tokens = result_screen();
        tokens.push(token("Lv.31", 220, 100, 300, 128));
        let fields = classify_solo(&tokens);
        assert_eq!(fields.title.as_deref(), Some("Verd ele"));
    }

    #[test]
    fn test_no_difficulty_means_no_title() {
        let tokens: Vec<_> = result_screen()
            .into_iter()
            .filter(|t| t.text != "EXPERT")
            .collect();
        let fields = classify_solo(&tokens);
        assert_eq!(fields.title, None);
        assert_eq!(fields.difficulty, None);
        assert_eq!(fields.missing(), vec!["title", "difficulty"]);
    }

    #[test]
    fn test_difficulty_right_of_limit_ignored() {
        let tokens = vec![
            token("frame", 0, 0, 1000, 600),
            token("MASTER", 700, 20, 800, 50),
        ];
        assert_eq!(classify_solo(&tokens).difficulty, None);
    }

    #[test]
    fn test_append_label_is_a_difficulty() {
        let mut tokens = result_screen();
        tokens[1].text = "APPEND".to_string();
        let fields = classify_solo(&tokens);
        assert_eq!(fields.difficulty.as_deref(), Some("APPEND"));
        assert_eq!(fields.title.as_deref(), Some("Verd ele"));

        tokens[1].text = "EXTRA".to_string();
        let fields = classify_solo(&tokens);
        assert_eq!(fields.difficulty, None);
        assert_eq!(fields.title, None);
    }

    #[test]
    fn test_empty_tokens() {
        let fields = classify_solo(&[]);
        assert_eq!(fields, SoloFields::default());
        assert_eq!(fields.missing().len(), 7);
    }

    #[test]
    fn test_local_prefers_confident_latin_title() {
        let jp = Recognition::new("ヴエルデ", 31.0);
        let latin = Recognition::new("Verdele", 64.0);
        let digits = Recognition::new("950\n2\n0\n0\n1\n", 90.0);

        let fields = read_local_solo(&jp, Some(&latin), &digits).unwrap();
        assert_eq!(fields.title.as_deref(), Some("Verdele"));
        assert_eq!(fields.counts, [Some(950), Some(2), Some(0), Some(0), Some(1)]);
        assert_eq!(fields.difficulty, None);
    }

    #[test]
    fn test_local_keeps_confident_primary_title() {
        let jp = Recognition::new("天ノ弱", 72.0);
        let latin = Recognition::new("KR", 80.0);
        let digits = Recognition::new("1021\n3\n0\n0\n2", 90.0);

        let fields = read_local_solo(&jp, Some(&latin), &digits).unwrap();
        assert_eq!(fields.title.as_deref(), Some("天ノ弱"));
    }

    #[test]
    fn test_local_requires_five_counts() {
        let title = Recognition::new("Tell Your World", 85.0);
        let digits = Recognition::new("950\n2\n0\n1", 90.0);
        let err = read_local_solo(&title, None, &digits).unwrap_err();
        assert!(matches!(err, ScoreError::FieldClassificationIncomplete(_)));
    }
}
