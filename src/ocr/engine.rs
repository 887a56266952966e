use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

use super::setup::{ensure_language, find_tesseract_executable};
use super::{EngineFactory, EngineKind, Recognition, RecognitionEngine};
use crate::config::AppConfig;

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Command-line settings for one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    pub language: &'static str,
    pub page_segmentation: u32,
    pub whitelist: Option<&'static str>,
    pub dpi: u32,
}

impl EngineParams {
    pub fn for_kind(kind: EngineKind, dpi: u32) -> Self {
        match kind {
            EngineKind::Latin => Self {
                language: "eng",
                page_segmentation: 3,
                whitelist: None,
                dpi,
            },
            EngineKind::Japanese => Self {
                language: "jpn",
                // automatic segmentation without OSD
                page_segmentation: 2,
                whitelist: None,
                dpi,
            },
            EngineKind::Digits => Self {
                language: "eng",
                page_segmentation: 3,
                whitelist: Some("0123456789"),
                dpi,
            },
        }
    }
}

/// A configured Tesseract instance with its own scratch directory.
pub struct TesseractEngine {
    kind: EngineKind,
    executable: PathBuf,
    tessdata: PathBuf,
    params: EngineParams,
    scratch: TempDir,
    jobs: u64,
}

impl TesseractEngine {
    pub fn start(kind: EngineKind, executable: PathBuf, tessdata: PathBuf, params: EngineParams) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("score-reader-{}-", kind.label()))
            .tempdir()
            .context("failed to create engine scratch directory")?;

        info!(
            "Started {} engine (lang={}, psm={}, tessdata={})",
            kind.label(),
            params.language,
            params.page_segmentation,
            tessdata.display()
        );

        Ok(Self {
            kind,
            executable,
            tessdata,
            params,
            scratch,
            jobs: 0,
        })
    }

    fn scratch_input(&self) -> PathBuf {
        self.scratch.path().join("input.png")
    }
}

impl RecognitionEngine for TesseractEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn recognize(&mut self, img: &GrayImage) -> Result<Recognition> {
        let input = self.scratch_input();
        img.save(&input)
            .with_context(|| format!("failed to write {}", input.display()))?;

        let tsv = run_tesseract_tsv(&self.executable, &self.tessdata, &input, &self.params)?;
        let lines = parse_tsv_output(&tsv)?;
        self.jobs += 1;

        let recognition = recognition_from_lines(&lines);
        debug!(
            "{} engine job {}: {:?} (conf {:.0})",
            self.kind.label(),
            self.jobs,
            recognition.text,
            recognition.confidence
        );
        Ok(recognition)
    }

    fn shutdown(self: Box<Self>) -> Result<()> {
        let TesseractEngine { kind, scratch, jobs, .. } = *self;
        let path = scratch.path().to_path_buf();
        scratch
            .close()
            .with_context(|| format!("failed to remove {}", path.display()))?;
        info!("Stopped {} engine after {} jobs", kind.label(), jobs);
        Ok(())
    }
}

fn run_tesseract_tsv(executable: &Path, tessdata: &Path, input: &Path, params: &EngineParams) -> Result<String> {
    let mut command = Command::new(executable);
    command
        .arg(input)
        .arg("stdout")
        .arg("--tessdata-dir")
        .arg(tessdata)
        .arg("-l")
        .arg(params.language)
        .arg("--psm")
        .arg(params.page_segmentation.to_string())
        .arg("--dpi")
        .arg(params.dpi.to_string());
    if let Some(whitelist) = params.whitelist {
        command.arg("-c").arg(format!("tessedit_char_whitelist={}", whitelist));
    }
    command.arg("tsv");

    let output = command
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Joins lines with `\n`; confidence is the mean over all words, 0 when nothing was read.
pub fn recognition_from_lines(lines: &[OcrLine]) -> Recognition {
    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let (sum, count) = lines
        .iter()
        .flat_map(|l| l.words.iter())
        .fold((0.0f32, 0usize), |(sum, count), w| (sum + w.confidence, count + 1));
    let confidence = if count > 0 { sum / count as f32 } else { 0.0 };

    Recognition { text, confidence }
}

/// Parses Tesseract TSV output into structured OcrLine data
pub fn parse_tsv_output(tsv: &str) -> Result<Vec<OcrLine>> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let block_num: i32 = fields[2].parse().unwrap_or(-1);
        let par_num: i32 = fields[3].parse().unwrap_or(-1);
        let line_num: i32 = fields[4].parse().unwrap_or(-1);
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (block_num, par_num, line_num);
        if current_key.is_some() && current_key != Some(key) {
            flush_line(&mut current_words, &mut lines);
        }
        current_key = Some(key);

        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }

    // Don't forget the last line
    flush_line(&mut current_words, &mut lines);

    Ok(lines)
}

fn flush_line(words: &mut Vec<OcrWord>, lines: &mut Vec<OcrLine>) {
    if words.is_empty() {
        return;
    }
    let avg_conf = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    let line_text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(OcrLine {
        text: line_text,
        words: std::mem::take(words),
        confidence: avg_conf,
    });
}

/// Starts Tesseract engines, locating the executable and models on every start.
pub struct TesseractFactory {
    executable: Option<PathBuf>,
    tessdata: Option<PathBuf>,
    dpi: u32,
}

impl TesseractFactory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            executable: config.tesseract_path.clone(),
            tessdata: config.tessdata_path.clone(),
            dpi: config.tesseract_dpi,
        }
    }
}

impl EngineFactory for TesseractFactory {
    fn start(&self, kind: EngineKind) -> Result<Box<dyn RecognitionEngine>> {
        let params = EngineParams::for_kind(kind, self.dpi);
        let executable = find_tesseract_executable(self.executable.as_deref())?;
        let tessdata = ensure_language(self.tessdata.as_deref(), params.language)?;
        let engine = TesseractEngine::start(kind, executable, tessdata, params)?;
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word(block: i32, line: i32, conf: f32, text: &str) -> String {
        format!("5\t1\t{}\t1\t{}\t1\t0\t0\t10\t10\t{}\t{}", block, line, conf, text)
    }

    #[test]
    fn test_parse_tsv_groups_lines() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t600\t400\t-1\t".to_string(),
            word(1, 1, 96.0, "1021"),
            word(1, 2, 90.0, "3"),
            word(1, 3, 88.0, "0"),
            word(1, 4, 91.0, "0"),
            word(1, 5, 95.0, "2"),
        ]
        .join("\n");

        let lines = parse_tsv_output(&tsv).unwrap();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].text, "1021");
        assert_eq!(lines[4].text, "2");
    }

    #[test]
    fn test_parse_tsv_joins_words_on_same_line() {
        let tsv = [
            HEADER.to_string(),
            word(1, 1, 80.0, "Tell"),
            word(1, 1, 60.0, "Your"),
            word(1, 1, 70.0, "World"),
        ]
        .join("\n");

        let lines = parse_tsv_output(&tsv).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Tell Your World");
        assert!((lines[0].confidence - 70.0).abs() < 1e-3);
    }

    #[test]
    fn test_parse_tsv_same_line_number_in_new_block_splits() {
        let tsv = [HEADER.to_string(), word(1, 1, 80.0, "a"), word(2, 1, 80.0, "b")].join("\n");
        let lines = parse_tsv_output(&tsv).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_recognition_from_lines() {
        let tsv = [
            HEADER.to_string(),
            word(1, 1, 90.0, "950"),
            word(1, 2, 80.0, "2"),
        ]
        .join("\n");
        let recognition = recognition_from_lines(&parse_tsv_output(&tsv).unwrap());
        assert_eq!(recognition.text, "950\n2");
        assert!((recognition.confidence - 85.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_output_has_zero_confidence() {
        let recognition = recognition_from_lines(&parse_tsv_output(HEADER).unwrap());
        assert_eq!(recognition.text, "");
        assert_eq!(recognition.confidence, 0.0);
    }

    #[test]
    fn test_page_segmentation_per_engine() {
        assert_eq!(EngineParams::for_kind(EngineKind::Latin, 71).page_segmentation, 3);
        assert_eq!(EngineParams::for_kind(EngineKind::Japanese, 71).page_segmentation, 2);
        assert_eq!(EngineParams::for_kind(EngineKind::Digits, 71).page_segmentation, 3);
    }

    #[test]
    fn test_digits_engine_whitelist() {
        let params = EngineParams::for_kind(EngineKind::Digits, 71);
        assert_eq!(params.whitelist, Some("0123456789"));
        assert_eq!(EngineParams::for_kind(EngineKind::Japanese, 71).language, "jpn");
    }
}
