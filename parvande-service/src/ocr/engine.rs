//! Text recognition engine seam.
//!
//! The service owns exactly one engine, built at startup. Building may fail
//! (missing native library, missing language data, feature disabled), in
//! which case the service keeps running with an unavailable engine and every
//! extraction that needs recognition reports `engine_unavailable`.

use image::GrayImage;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{EngineConfig, OcrConfig};
use crate::error::ExtractionError;

/// Detection sensitivity: spans scoring at or below `text_threshold` are
/// discarded from the output; `low_text` is the floor below which the engine
/// does not report a span at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdPair {
    pub text_threshold: f32,
    pub low_text: f32,
}

impl ThresholdPair {
    pub fn printed(config: &OcrConfig) -> Self {
        Self {
            text_threshold: config.printed_text_threshold,
            low_text: config.printed_low_text,
        }
    }

    pub fn handwritten(config: &OcrConfig) -> Self {
        Self {
            text_threshold: config.handwritten_text_threshold,
            low_text: config.handwritten_low_text,
        }
    }
}

/// One recognized run of text with its confidence in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSpan {
    pub text: String,
    pub confidence: f32,
}

pub trait RecognitionEngine: Send + Sync {
    /// Short backend name for logs and the queue status endpoint
    fn name(&self) -> &str;

    fn recognize(
        &self,
        image: &GrayImage,
        thresholds: &ThresholdPair,
    ) -> Result<Vec<RecognizedSpan>, ExtractionError>;
}

/// Result of engine construction
#[derive(Clone)]
pub enum EngineState {
    Ready(Arc<dyn RecognitionEngine>),
    Unavailable { reason: String },
}

impl EngineState {
    pub fn engine(&self) -> Result<&Arc<dyn RecognitionEngine>, ExtractionError> {
        match self {
            EngineState::Ready(engine) => Ok(engine),
            EngineState::Unavailable { reason } => Err(ExtractionError::EngineUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, EngineState::Ready(_))
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            EngineState::Ready(_) => None,
            EngineState::Unavailable { reason } => Some(reason),
        }
    }
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Ready(engine) => f.debug_tuple("Ready").field(&engine.name()).finish(),
            EngineState::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Build the configured engine
#[cfg(feature = "tesseract")]
pub fn build_engine(config: &EngineConfig) -> EngineState {
    match tesseract_backend::TesseractEngine::new(config) {
        Ok(engine) => EngineState::Ready(Arc::new(engine)),
        Err(e) => EngineState::Unavailable {
            reason: e.to_string(),
        },
    }
}

/// Build the configured engine
#[cfg(not(feature = "tesseract"))]
pub fn build_engine(_config: &EngineConfig) -> EngineState {
    EngineState::Unavailable {
        reason: "built without the `tesseract` feature; rebuild with `--features tesseract` \
                 to recognize images and scanned PDF pages"
            .to_string(),
    }
}

/// Parse Tesseract TSV output into word spans.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. Only word rows (level 5) carry text;
/// confidence is a percentage and rows below `low_text` are dropped.
pub fn parse_tsv(tsv: &str, low_text: f32) -> Vec<RecognizedSpan> {
    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let conf: f32 = cols[10].trim().parse().ok()?;
            if conf < 0.0 {
                return None;
            }
            let confidence = (conf / 100.0).clamp(0.0, 1.0);
            if confidence < low_text {
                return None;
            }
            Some(RecognizedSpan {
                text: cols[11].to_string(),
                confidence,
            })
        })
        .collect()
}

#[cfg(feature = "tesseract")]
mod tesseract_backend {
    use image::{GrayImage, ImageFormat};
    use std::io::Cursor;
    use tesseract::Tesseract;

    use super::{RecognitionEngine, RecognizedSpan, ThresholdPair, parse_tsv};
    use crate::config::EngineConfig;
    use crate::error::ExtractionError;

    pub struct TesseractEngine {
        data_path: Option<String>,
        languages: String,
    }

    impl TesseractEngine {
        /// Initializes once to verify the library and language data are
        /// present. Recognition itself uses a fresh handle per call because
        /// the handle is not `Sync`.
        pub fn new(config: &EngineConfig) -> Result<Self, ExtractionError> {
            let data_path = config
                .data_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned());

            Tesseract::new(data_path.as_deref(), Some(&config.languages)).map_err(|e| {
                ExtractionError::EngineUnavailable {
                    reason: format!(
                        "failed to initialize Tesseract with '{}': {}",
                        config.languages, e
                    ),
                }
            })?;

            Ok(Self {
                data_path,
                languages: config.languages.clone(),
            })
        }
    }

    impl RecognitionEngine for TesseractEngine {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn recognize(
            &self,
            image: &GrayImage,
            thresholds: &ThresholdPair,
        ) -> Result<Vec<RecognizedSpan>, ExtractionError> {
            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| ExtractionError::Engine {
                    message: format!("failed to encode page image: {}", e),
                })?;

            let engine_err = |e: &dyn std::fmt::Display| ExtractionError::Engine {
                message: e.to_string(),
            };

            let mut tess = Tesseract::new(self.data_path.as_deref(), Some(&self.languages))
                .map_err(|e| engine_err(&e))?
                .set_image_from_mem(&png)
                .map_err(|e| engine_err(&e))?
                .recognize()
                .map_err(|e| engine_err(&e))?;

            let tsv = tess.get_tsv_text(0).map_err(|e| engine_err(&e))?;
            Ok(parse_tsv(&tsv, thresholds.low_text))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Engine double returning fixed spans and recording the thresholds it
    /// was called with
    pub struct RecordingEngine {
        spans: Vec<RecognizedSpan>,
        pub calls: Mutex<Vec<ThresholdPair>>,
    }

    impl RecordingEngine {
        pub fn new(spans: &[(&str, f32)]) -> Arc<Self> {
            Arc::new(Self {
                spans: spans
                    .iter()
                    .map(|(text, confidence)| RecognizedSpan {
                        text: text.to_string(),
                        confidence: *confidence,
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl RecognitionEngine for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }

        fn recognize(
            &self,
            _image: &GrayImage,
            thresholds: &ThresholdPair,
        ) -> Result<Vec<RecognizedSpan>, ExtractionError> {
            self.calls.lock().unwrap().push(*thresholds);
            Ok(self.spans.clone())
        }
    }

    /// Engine double that always fails
    pub struct FailingEngine;

    impl RecognitionEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        fn recognize(
            &self,
            _image: &GrayImage,
            _thresholds: &ThresholdPair,
        ) -> Result<Vec<RecognizedSpan>, ExtractionError> {
            Err(ExtractionError::Engine {
                message: "model crashed".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
4\t1\t1\t1\t1\t0\t10\t10\t200\t30\t-1\t\n\
5\t1\t1\t1\t1\t1\t10\t10\t80\t30\t91.5\tسلام\n\
5\t1\t1\t1\t1\t2\t95\t10\t60\t30\t45\tدنیا\n\
5\t1\t1\t1\t1\t3\t160\t10\t40\t30\t5.0\t~\n";

    #[test]
    fn test_parse_tsv_keeps_words_above_low_text() {
        let spans = parse_tsv(TSV, 0.1);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "سلام");
        assert!((spans[0].confidence - 0.915).abs() < 1e-6);
        assert!((spans[1].confidence - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_parse_tsv_low_text_floor() {
        assert_eq!(parse_tsv(TSV, 0.5).len(), 1);
        assert_eq!(parse_tsv(TSV, 0.0).len(), 3);
        assert!(parse_tsv("", 0.0).is_empty());
    }

    #[test]
    fn test_threshold_pairs_from_config() {
        let config = OcrConfig::default();
        assert_eq!(
            ThresholdPair::handwritten(&config),
            ThresholdPair {
                text_threshold: 0.2,
                low_text: 0.1
            }
        );
        assert_eq!(ThresholdPair::printed(&config).text_threshold, 0.4);
    }

    #[test]
    #[cfg(not(feature = "tesseract"))]
    fn test_engine_unavailable_without_feature() {
        let state = build_engine(&EngineConfig::default());
        assert!(!state.is_available());
        assert!(
            state
                .unavailable_reason()
                .is_some_and(|reason| reason.contains("--features tesseract"))
        );
        assert!(matches!(
            state.engine(),
            Err(ExtractionError::EngineUnavailable { .. })
        ));
    }
}
