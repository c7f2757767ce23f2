//! Universal text extraction.
//!
//! [`OcrService::extract`] classifies a file and routes it to the PDF, image
//! or plain-text path. It never fails: every error is folded into an
//! [`ExtractionResult`] with an error tag, a localized message as its text and
//! a confidence of zero.

pub mod engine;
pub mod file_type;
mod handwriting;
pub mod pdf;
mod preprocess;
mod raster;
mod text_file;

pub use engine::{EngineState, RecognitionEngine, ThresholdPair, build_engine};
pub use file_type::{FileKind, classify};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::OcrConfig;
use crate::error::{ExtractionError, ExtractionErrorKind, format_error_chain_ref};
use crate::i18n::I18n;

/// Requested handling of raster images
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TextMode {
    /// Decide per image with the sharpness heuristic
    #[default]
    Auto,
    Printed,
    Handwritten,
}

/// What the extractor ended up doing with the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DetectedType {
    Pdf,
    Text,
    Printed,
    Handwritten,
    Error,
}

impl From<TextMode> for DetectedType {
    fn from(mode: TextMode) -> Self {
        match mode {
            TextMode::Handwritten => DetectedType::Handwritten,
            TextMode::Printed | TextMode::Auto => DetectedType::Printed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
    #[serde(rename = "type")]
    pub detected_type: DetectedType,
    pub file_type: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExtractionErrorKind>,
}

impl ExtractionResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Owns the recognition engine and the localization used for placeholder
/// text
pub struct OcrService {
    engine: EngineState,
    i18n: Arc<I18n>,
    locale: String,
}

impl OcrService {
    pub fn new(engine: EngineState, i18n: Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            engine,
            i18n,
            locale: locale.into(),
        }
    }

    pub fn engine(&self) -> &EngineState {
        &self.engine
    }

    /// Extract text from a file on disk. Blocking; run it off the async
    /// executor.
    pub fn extract(&self, path: &Path, mode: TextMode, config: &OcrConfig) -> ExtractionResult {
        let file_type = classify(path);
        debug!(path = %path.display(), file_type = %file_type, "Classified file");

        match self.try_extract(path, file_type, mode, config) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    file_type = %file_type,
                    error = %format_error_chain_ref(&e),
                    "Extraction failed"
                );
                self.error_result(file_type, &e)
            }
        }
    }

    fn try_extract(
        &self,
        path: &Path,
        file_type: FileKind,
        mode: TextMode,
        config: &OcrConfig,
    ) -> Result<ExtractionResult, ExtractionError> {
        if !path.is_file() {
            return Err(ExtractionError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        match file_type {
            FileKind::Pdf => {
                let pdf =
                    pdf::extract_pdf_file(path, &self.engine, config, &self.i18n, &self.locale)?;
                debug!(
                    pages = pdf.pages,
                    recognized_pages = pdf.recognized_pages,
                    "PDF text assembled"
                );
                let text = if pdf.text.trim().is_empty() {
                    self.i18n.get(&self.locale, "ocr-pdf-empty", None)
                } else {
                    pdf.text
                };
                Ok(ExtractionResult {
                    text,
                    confidence: pdf.confidence,
                    detected_type: DetectedType::Pdf,
                    file_type,
                    error: None,
                })
            }
            FileKind::Text => {
                let content = text_file::read_text_file(path)?;
                let text = if content.trim().is_empty() {
                    self.i18n.get(&self.locale, "ocr-text-empty", None)
                } else {
                    content
                };
                Ok(ExtractionResult {
                    text,
                    confidence: 1.0,
                    detected_type: DetectedType::Text,
                    file_type,
                    error: None,
                })
            }
            FileKind::Image => {
                // Checked before decoding so an unavailable engine is reported
                // as such even for images that would fail to decode
                let engine = self.engine.engine()?;
                let image = raster::load_image(path)?;
                let recognized = raster::recognize_image(engine.as_ref(), &image, mode, config)?;
                let text = if recognized.text.is_empty() {
                    self.i18n.get(&self.locale, "ocr-image-empty", None)
                } else {
                    recognized.text
                };
                Ok(ExtractionResult {
                    text,
                    confidence: recognized.confidence,
                    detected_type: recognized.mode.into(),
                    file_type,
                    error: None,
                })
            }
            FileKind::Unknown => Err(ExtractionError::UnsupportedFormat),
        }
    }

    fn error_result(&self, file_type: FileKind, error: &ExtractionError) -> ExtractionResult {
        let kind = error.kind();
        let text = match kind {
            ExtractionErrorKind::FileNotFound => {
                self.i18n.get(&self.locale, "ocr-error-file-not-found", None)
            }
            ExtractionErrorKind::UnsupportedFormat => {
                self.i18n.get(&self.locale, "ocr-error-unsupported", None)
            }
            ExtractionErrorKind::EngineUnavailable => {
                self.i18n.get(&self.locale, "ocr-error-engine-unavailable", None)
            }
            ExtractionErrorKind::DecodeFailure | ExtractionErrorKind::EngineException => {
                self.i18n.format(
                    &self.locale,
                    "ocr-error-generic",
                    &[("message", &format_error_chain_ref(error))],
                )
            }
        };

        ExtractionResult {
            text,
            confidence: 0.0,
            detected_type: DetectedType::Error,
            file_type,
            error: Some(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::testing::{FailingEngine, RecordingEngine};
    use image::{GrayImage, Luma};
    use std::str::FromStr;

    fn service(engine: EngineState) -> OcrService {
        OcrService::new(engine, Arc::new(I18n::new("fa")), "fa")
    }

    fn unavailable() -> EngineState {
        EngineState::Unavailable {
            reason: "not installed".to_string(),
        }
    }

    fn write_png(dir: &Path, name: &str, image: &GrayImage) -> std::path::PathBuf {
        let path = dir.join(name);
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn test_text_file_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.txt");
        let content = "بسمه تعالی\n  شماره: ۱۴۰۲/۱۲\n";
        std::fs::write(&path, content).unwrap();

        let result = service(unavailable()).extract(&path, TextMode::Auto, &OcrConfig::default());

        assert_eq!(result.text, content);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.detected_type, DetectedType::Text);
        assert_eq!(result.file_type, FileKind::Text);
        assert!(!result.is_error());
    }

    #[test]
    fn test_blank_text_file_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n\t").unwrap();

        let result = service(unavailable()).extract(&path, TextMode::Auto, &OcrConfig::default());
        assert_eq!(result.text, "📝 فایل متنی خالی است");
        assert!(!result.is_error());
    }

    #[test]
    fn test_missing_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = service(unavailable());

        let missing = ocr.extract(
            &dir.path().join("gone.txt"),
            TextMode::Auto,
            &OcrConfig::default(),
        );
        assert_eq!(missing.error, Some(ExtractionErrorKind::FileNotFound));
        assert_eq!(missing.detected_type, DetectedType::Error);
        assert_eq!(missing.confidence, 0.0);

        let archive = dir.path().join("bundle.zip");
        std::fs::write(&archive, [0x50, 0x4B, 0x03, 0x04, 0x00, 0x00]).unwrap();
        let unsupported = ocr.extract(&archive, TextMode::Auto, &OcrConfig::default());
        assert_eq!(unsupported.error, Some(ExtractionErrorKind::UnsupportedFormat));
        assert_eq!(unsupported.file_type, FileKind::Unknown);
        assert_eq!(unsupported.text, "❌ فرمت فایل پشتیبانی نمی‌شود");
    }

    #[test]
    fn test_image_without_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "scan.png", &GrayImage::from_pixel(8, 8, Luma([0])));

        let result = service(unavailable()).extract(&path, TextMode::Auto, &OcrConfig::default());
        assert_eq!(result.error, Some(ExtractionErrorKind::EngineUnavailable));
        assert_eq!(result.file_type, FileKind::Image);
        assert_eq!(result.text, "❌ موتور OCR در دسترس نیست");
    }

    #[test]
    fn test_image_recognition() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(
            dir.path(),
            "form.png",
            &GrayImage::from_pixel(32, 32, Luma([240])),
        );
        let recorder = RecordingEngine::new(&[("نام", 0.9), ("خانوادگی", 0.7)]);

        let result = service(EngineState::Ready(recorder.clone())).extract(
            &path,
            TextMode::Auto,
            &OcrConfig::default(),
        );

        assert_eq!(result.text, "نام خانوادگی");
        assert_eq!(result.detected_type, DetectedType::Handwritten);
        assert!((result.confidence - 0.8).abs() < 1e-6);
        assert_eq!(recorder.call_count(), 1);
    }

    #[test]
    fn test_image_with_no_words_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "blank.png", &GrayImage::from_pixel(8, 8, Luma([255])));

        let result = service(EngineState::Ready(RecordingEngine::new(&[]))).extract(
            &path,
            TextMode::Printed,
            &OcrConfig::default(),
        );
        assert_eq!(result.text, "📝 متنی در تصویر یافت نشد");
        assert_eq!(result.detected_type, DetectedType::Printed);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_error());
    }

    #[test]
    fn test_engine_exception_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "x.png", &GrayImage::from_pixel(8, 8, Luma([1])));

        let result = service(EngineState::Ready(Arc::new(FailingEngine))).extract(
            &path,
            TextMode::Auto,
            &OcrConfig::default(),
        );
        assert_eq!(result.error, Some(ExtractionErrorKind::EngineException));
        assert!(result.text.contains("model crashed"));
    }

    #[test]
    fn test_corrupt_pdf_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not really a pdf").unwrap();

        let result = service(unavailable()).extract(&path, TextMode::Auto, &OcrConfig::default());
        assert_eq!(result.file_type, FileKind::Pdf);
        assert_eq!(result.confidence, 0.0);
        // Without libpdfium nothing can be parsed, which is not the file's fault
        let expected = match pdf::create_pdfium() {
            Ok(_) => ExtractionErrorKind::DecodeFailure,
            Err(_) => ExtractionErrorKind::EngineUnavailable,
        };
        assert_eq!(result.error, Some(expected));
    }

    #[test]
    fn test_pdf_without_library_is_engine_unavailable() {
        if pdf::create_pdfium().is_ok() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.pdf");
        std::fs::write(
            &path,
            b"%PDF-1.4\n1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
              2 0 obj<</Type/Pages/Kids[]/Count 0>>endobj\n\
              trailer<</Root 1 0 R>>\n%%EOF\n",
        )
        .unwrap();

        let result = service(unavailable()).extract(&path, TextMode::Auto, &OcrConfig::default());
        assert_eq!(result.error, Some(ExtractionErrorKind::EngineUnavailable));
        assert_eq!(result.text, "❌ موتور OCR در دسترس نیست");
    }

    #[test]
    fn test_text_starting_with_bm_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        let content = "BMI report for staff\nسلام\n";
        std::fs::write(&path, content).unwrap();

        let result = service(unavailable()).extract(&path, TextMode::Auto, &OcrConfig::default());
        assert_eq!(result.file_type, FileKind::Text);
        assert_eq!(result.text, content);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_confidence_always_in_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("a.txt");
        std::fs::write(&txt, "x").unwrap();
        let png = write_png(dir.path(), "b.png", &GrayImage::from_pixel(4, 4, Luma([9])));
        let bin = dir.path().join("c.bin");
        std::fs::write(&bin, [0u8, 1, 2]).unwrap();

        let engines = [
            unavailable(),
            EngineState::Ready(RecordingEngine::new(&[("over", 1.5), ("ok", 0.5)])),
            EngineState::Ready(Arc::new(FailingEngine)),
        ];
        for engine in engines {
            let ocr = service(engine);
            for path in [&txt, &png, &bin] {
                let result = ocr.extract(path, TextMode::Auto, &OcrConfig::default());
                assert!(
                    (0.0..=1.0).contains(&result.confidence),
                    "{} -> {}",
                    path.display(),
                    result.confidence
                );
            }
        }
    }

    #[test]
    fn test_text_mode_parsing() {
        assert_eq!(TextMode::from_str("handwritten").unwrap(), TextMode::Handwritten);
        assert!(TextMode::from_str("cursive").is_err());
        assert_eq!(DetectedType::from(TextMode::Printed).as_ref(), "printed");
    }
}
