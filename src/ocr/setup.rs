use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::info;

use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

/// Finds the Tesseract executable: configured path, our local dir, PATH, then common paths.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("configured Tesseract not found at {}", path.display()));
    }

    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in COMMON_EXECUTABLES {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

fn has_language(dir: &Path, lang: &str) -> bool {
    dir.join(format!("{}.traineddata", lang)).exists()
}

/// Finds a tessdata directory containing `<lang>.traineddata`.
pub fn find_tessdata_dir(configured: Option<&Path>, lang: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = configured {
        candidates.push(path.to_path_buf());
    }
    candidates.push(get_tesseract_dir().join("tessdata"));
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }
    candidates.extend(COMMON_TESSDATA.iter().map(PathBuf::from));

    candidates.into_iter().find(|dir| has_language(dir, lang))
}

/// Returns a tessdata directory with `lang` available, downloading the model if necessary.
pub fn ensure_language(configured: Option<&Path>, lang: &str) -> Result<PathBuf> {
    if let Some(dir) = find_tessdata_dir(configured, lang) {
        return Ok(dir);
    }

    let local = get_tesseract_dir().join("tessdata");
    info!("{}.traineddata not found, downloading into {}", lang, local.display());
    fs::create_dir_all(&local)
        .with_context(|| format!("failed to create {}", local.display()))?;
    download_tessdata(&local, lang)?;
    Ok(local)
}

/// Downloads one trained-data model from the upstream repository
fn download_tessdata(tessdata_dir: &Path, lang: &str) -> Result<()> {
    let url = format!("{}/{}.traineddata", TESSDATA_REPO, lang);
    let path = tessdata_dir.join(format!("{}.traineddata", lang));

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "sekai-score-reader")
        .send()
        .with_context(|| format!("failed to download {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}.traineddata: HTTP {}",
            lang,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    // Renamed into place only once fully written
    let partial = tessdata_dir.join(format!("{}.traineddata.part", lang));
    let mut file = fs::File::create(&partial)?;
    file.write_all(&bytes)?;
    fs::rename(&partial, &path)?;

    info!("Downloaded {}.traineddata ({} bytes)", lang, bytes.len());

    Ok(())
}
