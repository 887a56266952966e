//! End-to-end reading of a screenshot, plus manual score entry.
//!
//! Steps run strictly in order for one image: fetch, decode, layout,
//! regions, recognition, fields, record, chart, rating. Every failure is
//! local to the image that raised it; the engine pool and the chart
//! cache stay usable.

use image::RgbImage;
use reqwest::blocking::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::charts::{self, ChartEntry, ChartQuery, ChartSource, Difficulty};
use crate::classify::{self, CoopBlocks, CoopPlayer, SoloFields};
use crate::config::AppConfig;
use crate::error::{ScoreError, ScoreResult};
use crate::ocr::{EngineFactory, EngineKind, EnginePool, RecognizedToken, TesseractFactory, VisionClient};
use crate::score::{self, Calculation, ResolvedScore, ScoreRecord};
use crate::screenshot::{self, ExtractOptions, ImageVariant, Regions};

/// Result of reading one solo screenshot.
#[derive(Clone, Debug, PartialEq)]
pub enum ScreenshotOutcome {
    Resolved(ResolvedScore),
    /// Fields were read but no chart matched; accuracy and counts still stand
    Unresolved(ScoreRecord),
}

/// One player of a coop screenshot.
#[derive(Clone, Debug, PartialEq)]
pub struct CoopPlayerScore {
    pub player: CoopPlayer,
    pub accuracy: Option<f64>,
    /// `None` when this player's reading matched no chart
    pub resolved: Option<ResolvedScore>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoopOutcome {
    /// `None` when no common song was found
    pub song: Option<String>,
    pub players: Vec<CoopPlayerScore>,
}

/// Either kind of local reading, depending on the detected layout.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalOutcome {
    Solo(ScreenshotOutcome),
    Coop(CoopOutcome),
}

pub struct ScorePipeline {
    config: AppConfig,
    client: Client,
    pool: EnginePool,
    charts: Box<dyn ChartSource>,
    vision: Option<VisionClient>,
}

impl ScorePipeline {
    /// Builds the pipeline with Tesseract engines and, if an API key is set, cloud OCR.
    pub fn new(config: AppConfig, charts: Box<dyn ChartSource>) -> ScoreResult<Self> {
        let client = screenshot::http_client(config.http_timeout())?;
        let vision = match config.api_key() {
            Some(key) => Some(VisionClient::new(client.clone(), key)),
            None => {
                info!("No API key in {}; cloud OCR disabled", config.api_key_env);
                None
            }
        };
        let factory = TesseractFactory::new(&config);
        Ok(Self::with_parts(config, client, Box::new(factory), charts, vision))
    }

    pub fn with_parts(
        config: AppConfig,
        client: Client,
        factory: Box<dyn EngineFactory>,
        charts: Box<dyn ChartSource>,
        vision: Option<VisionClient>,
    ) -> Self {
        let pool = EnginePool::new(factory, config.engine_recycle_quota);
        Self {
            config,
            client,
            pool,
            charts,
            vision,
        }
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    /// Current chart snapshot for `server`.
    pub fn charts(&self, server: Option<&str>) -> Arc<[ChartEntry]> {
        self.charts.charts(server)
    }

    fn load_image(&self, source: &str) -> ScoreResult<(Vec<u8>, RgbImage)> {
        let bytes = screenshot::load_source(&self.client, source)?;
        let img = screenshot::decode(&bytes)?;
        Ok((bytes, img))
    }

    /// Reads a solo screenshot through cloud OCR.
    pub fn read_solo_cloud(&self, source: &str, server: Option<&str>) -> ScoreResult<ScreenshotOutcome> {
        let vision = self
            .vision
            .as_ref()
            .ok_or_else(|| ScoreError::OcrEngine(format!("cloud OCR needs {}", self.config.api_key_env)))?;

        let (bytes, _img) = self.load_image(source)?;
        let tokens = vision.detect_text(&bytes)?;
        self.process_solo_tokens(&tokens, server)
    }

    /// Classifies full-frame tokens and resolves the chart.
    pub fn process_solo_tokens(&self, tokens: &[RecognizedToken], server: Option<&str>) -> ScoreResult<ScreenshotOutcome> {
        let fields = classify::classify_solo(tokens);
        let record = score::assemble_solo(&fields)?;
        self.resolve_solo(record, server, &[])
    }

    /// Reads a screenshot with the local engines, solo or coop depending on its layout.
    pub fn read_local(&self, source: &str, server: Option<&str>, hints: &[String]) -> ScoreResult<LocalOutcome> {
        let (_, img) = self.load_image(source)?;
        self.process_local(&img, server, hints)
    }

    pub fn read_solo_local(&self, source: &str, server: Option<&str>, hints: &[String]) -> ScoreResult<ScreenshotOutcome> {
        match self.read_local(source, server, hints)? {
            LocalOutcome::Solo(outcome) => Ok(outcome),
            LocalOutcome::Coop(_) => Err(ScoreError::FieldClassificationIncomplete(
                "expected a solo result screen, got a coop one".to_string(),
            )),
        }
    }

    pub fn read_coop(&self, source: &str, server: Option<&str>, hints: &[String]) -> ScoreResult<CoopOutcome> {
        match self.read_local(source, server, hints)? {
            LocalOutcome::Coop(outcome) => Ok(outcome),
            LocalOutcome::Solo(_) => Err(ScoreError::FieldClassificationIncomplete(
                "expected a coop result screen, got a solo one".to_string(),
            )),
        }
    }

    /// Runs layout detection, extraction and local recognition on a decoded image.
    pub fn process_local(&self, img: &RgbImage, server: Option<&str>, hints: &[String]) -> ScoreResult<LocalOutcome> {
        let variant = screenshot::classify(img, &self.config.variant_signatures)?;
        let extraction = screenshot::extract(img, variant, &ExtractOptions::from(&self.config))?;

        match extraction.regions {
            Regions::Solo { title, accuracy } => {
                let fields = {
                    let mut engines = self.pool.acquire()?;
                    let primary = match variant {
                        ImageVariant::SoloEn => EngineKind::Latin,
                        _ => EngineKind::Japanese,
                    };
                    let title_reading = engines.recognize(primary, &title)?;
                    let fallback = if variant == ImageVariant::SoloJp {
                        Some(engines.recognize(EngineKind::Latin, &title)?)
                    } else {
                        None
                    };
                    let digits = engines.recognize(EngineKind::Digits, &accuracy)?;
                    classify::read_local_solo(&title_reading, fallback.as_ref(), &digits)?
                };
                self.process_local_solo(&fields, server, hints).map(LocalOutcome::Solo)
            }
            Regions::Coop {
                names,
                difficulties,
                accuracies,
            } => {
                let blocks = {
                    let mut engines = self.pool.acquire()?;
                    CoopBlocks {
                        names: names
                            .iter()
                            .map(|slot| engines.recognize(EngineKind::Latin, slot))
                            .collect::<ScoreResult<_>>()?,
                        difficulties: difficulties
                            .iter()
                            .map(|slot| engines.recognize(EngineKind::Latin, slot))
                            .collect::<ScoreResult<_>>()?,
                        accuracies: accuracies
                            .iter()
                            .map(|slot| engines.recognize(EngineKind::Digits, slot))
                            .collect::<ScoreResult<_>>()?,
                    }
                };
                self.process_coop(&blocks, server, hints).map(LocalOutcome::Coop)
            }
        }
    }

    /// Resolves a local solo reading. A missing chart gives a partial result.
    pub fn process_local_solo(&self, fields: &SoloFields, server: Option<&str>, hints: &[String]) -> ScoreResult<ScreenshotOutcome> {
        let record = score::assemble_local(fields)?;
        let hints = self.candidate_names(server, hints);
        self.resolve_solo(record, server, &hints)
    }

    /// Caller hints, else the song list of the running assignment.
    fn candidate_names(&self, server: Option<&str>, hints: &[String]) -> Vec<String> {
        if !hints.is_empty() {
            return hints.to_vec();
        }
        let assignment = self.charts.assignment(server);
        if !assignment.is_empty() {
            debug!("Using assignment songs as hints: {:?}", assignment);
        }
        assignment
    }

    fn resolve_solo(&self, record: ScoreRecord, server: Option<&str>, hints: &[String]) -> ScoreResult<ScreenshotOutcome> {
        let snapshot = self.charts.charts(server);
        let query = ChartQuery {
            title: record.title.as_deref(),
            difficulty: record.difficulty,
            note_count: Some(record.note_count()),
            hints,
        };

        match charts::resolve(&snapshot, &query) {
            Ok(chart) => {
                let resolved = ResolvedScore::new(chart, record.judgements)?;
                info!(
                    "{} [{}]: {:.2} ({})",
                    resolved.chart.name, resolved.chart.difficulty, resolved.score.rating, resolved.score.delta_label
                );
                Ok(ScreenshotOutcome::Resolved(resolved))
            }
            Err(ScoreError::ChartNotFound) => {
                warn!("No chart for {:?} ({} notes)", record.title, record.note_count());
                Ok(ScreenshotOutcome::Unresolved(record))
            }
            Err(e) => Err(e),
        }
    }

    /// Builds player records from coop blocks and resolves their shared chart.
    pub fn process_coop(&self, blocks: &CoopBlocks, server: Option<&str>, hints: &[String]) -> ScoreResult<CoopOutcome> {
        let players = classify::classify_coop(blocks);
        let keys: Vec<(Option<Difficulty>, u32)> = players
            .iter()
            .map(|p| {
                let difficulty = p.difficulty.as_deref().and_then(|d| match d.parse::<Difficulty>() {
                    Ok(difficulty) => Some(difficulty),
                    Err(e) => {
                        warn!("Slot {}: {}, matching on note count only", p.slot, e);
                        None
                    }
                });
                (difficulty, p.note_count())
            })
            .collect();

        let hints = self.candidate_names(server, hints);
        let snapshot = self.charts.charts(server);
        let resolution = match charts::resolve_coop(&snapshot, &keys, &hints) {
            Ok(resolution) => Some(resolution),
            Err(ScoreError::ChartNotFound) => {
                warn!("No common chart for {} coop players", players.len());
                None
            }
            Err(e) => return Err(e),
        };

        let mut scores = Vec::with_capacity(players.len());
        for (index, player) in players.into_iter().enumerate() {
            let judgements = score::Judgements::from_counts(player.counts);
            let accuracy = score::accuracy(&judgements).ok();
            let chart = resolution
                .as_ref()
                .and_then(|r| r.charts.get(index).cloned().flatten());
            let resolved = match chart {
                Some(chart) => match ResolvedScore::new(chart, judgements) {
                    Ok(resolved) => Some(resolved),
                    Err(e) => {
                        warn!("Slot {}: {}", player.slot, e);
                        None
                    }
                },
                None => None,
            };
            scores.push(CoopPlayerScore {
                player,
                accuracy,
                resolved,
            });
        }

        Ok(CoopOutcome {
            song: resolution.map(|r| r.song),
            players: scores,
        })
    }

    /// Scores typed input against a named chart.
    ///
    /// `score` is `perfect/great/good/bad/miss` or a 1-4 count shorthand.
    pub fn calculate_manual(
        &self,
        server: Option<&str>,
        song: &str,
        difficulty: Difficulty,
        score: &str,
    ) -> ScoreResult<ResolvedScore> {
        calculate_manual(&self.charts.charts(server), song, difficulty, score)
    }
}

pub fn calculate_manual(charts: &[ChartEntry], song: &str, difficulty: Difficulty, score: &str) -> ScoreResult<ResolvedScore> {
    let chart = charts::find(charts, song.trim(), difficulty)
        .cloned()
        .ok_or(ScoreError::ChartNotFound)?;
    let judgements = score::parse_score(score, chart.total_notes)?;
    ResolvedScore::new(chart, judgements)
}

/// Scores five counts against an arbitrary rating constant.
pub fn calculate_custom(rating_constant: f64, score: &str) -> ScoreResult<Calculation> {
    let judgements = score::parse_full_score(score)?;
    score::calculate(rating_constant, judgements)
}
