//! Optical character recognition for images embedded in documents.
//!
//! The ingestion pipeline only sees [`OcrEngine`]. The shipped engine shells
//! out to the `tesseract` command-line tool; [`DisabledOcr`] rejects every
//! image so that image-only documents fail extraction instead of being
//! recorded with no content.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use crate::config::OcrConfig;

/// Recognizes text in a single encoded image (PNG, JPEG, TIFF, ...).
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, image: &[u8]) -> Result<String>;
}

/// Runs `tesseract <image> stdout -l <language>`.
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            language: config.language.clone(),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &[u8]) -> Result<String> {
        let mut file = tempfile::NamedTempFile::new()
            .with_context(|| "Failed to create temporary image file")?;
        file.write_all(image)
            .with_context(|| "Failed to write temporary image file")?;
        file.flush()?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .with_context(|| {
                format!(
                    "Failed to execute '{}'. Is tesseract installed?",
                    self.binary.display()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn name(&self) -> &str {
        "disabled"
    }

    fn recognize(&self, _image: &[u8]) -> Result<String> {
        bail!("OCR is disabled. Set [ocr] engine = \"tesseract\" in config.")
    }
}

/// Builds the engine named by `ocr.engine`.
pub fn create_engine(config: &OcrConfig) -> Result<Box<dyn OcrEngine>> {
    match config.engine.as_str() {
        "tesseract" => Ok(Box::new(TesseractEngine::new(config))),
        "disabled" => Ok(Box::new(DisabledOcr)),
        other => bail!("Unknown ocr engine: '{}'", other),
    }
}
