//! Getting screenshot bytes and decoding them.

use image::RgbImage;
use reqwest::blocking::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ScoreError, ScoreResult};

/// Builds the blocking HTTP client shared by every outbound request.
pub fn http_client(timeout: Duration) -> ScoreResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent("sekai-score-reader")
        .build()
        .map_err(|e| ScoreError::ImageFetch(format!("failed to build HTTP client: {}", e)))
}

pub fn is_url(source: &str) -> bool {
    let lower = source.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads an image from a URL or a local path.
pub fn load_source(client: &Client, source: &str) -> ScoreResult<Vec<u8>> {
    let source = source.trim();
    if is_url(source) {
        fetch_url(client, source)
    } else {
        std::fs::read(Path::new(source))
            .map_err(|e| ScoreError::ImageFetch(format!("failed to read {}: {}", source, e)))
    }
}

fn fetch_url(client: &Client, url: &str) -> ScoreResult<Vec<u8>> {
    info!("Fetching image: {}", url);

    let response = client.get(url).send().map_err(|e| {
        if e.is_timeout() {
            ScoreError::ImageFetch(format!("timed out fetching {}", url))
        } else {
            ScoreError::ImageFetch(format!("request to {} failed: {}", url, e))
        }
    })?;

    if !response.status().is_success() {
        return Err(ScoreError::ImageFetch(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let bytes = response
        .bytes()
        .map_err(|e| ScoreError::ImageFetch(format!("failed to read body of {}: {}", url, e)))?;
    debug!("Fetched {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Decodes any supported format into RGB, dropping alpha.
pub fn decode(bytes: &[u8]) -> ScoreResult<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ScoreError::MalformedImage(e.to_string()))?
        .to_rgb8();

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ScoreError::RegionExtraction(format!(
            "image has zero dimension ({}x{})",
            width, height
        )));
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://cdn.example.com/a.png"));
        assert!(is_url("  HTTP://example.com/a.png"));
        assert!(!is_url("/tmp/a.png"));
        assert!(!is_url("screenshots/a.png"));
    }

    #[test]
    fn test_decode_drops_alpha() {
        let img: RgbaImage = ImageBuffer::from_pixel(4, 3, Rgba([10, 20, 30, 0]));
        let decoded = decode(&png_bytes(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        assert!(matches!(decode(b"not an image"), Err(ScoreError::MalformedImage(_))));
    }

    #[test]
    fn test_load_source_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let img: RgbaImage = ImageBuffer::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        std::fs::write(&path, png_bytes(&img)).unwrap();

        let client = http_client(Duration::from_secs(1)).unwrap();
        let bytes = load_source(&client, path.to_str().unwrap()).unwrap();
        assert_eq!(decode(&bytes).unwrap().get_pixel(1, 1).0, [1, 2, 3]);
    }

    #[test]
    fn test_load_source_missing_file() {
        let client = http_client(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            load_source(&client, "/definitely/not/here.png"),
            Err(ScoreError::ImageFetch(_))
        ));
    }
}
