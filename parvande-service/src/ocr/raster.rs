//! Raster image extraction: heuristic mode selection, preprocessing and
//! recognition.

use image::{DynamicImage, ImageReader};
use std::path::Path;
use tracing::debug;

use super::TextMode;
use super::engine::{RecognitionEngine, RecognizedSpan, ThresholdPair};
use super::handwriting;
use super::preprocess::preprocess;
use crate::config::OcrConfig;
use crate::error::ExtractionError;

/// Recognized image text. `text` is empty when no span survived filtering.
#[derive(Debug, Clone)]
pub struct ImageText {
    pub text: String,
    pub confidence: f64,
    /// The resolved mode, never [`TextMode::Auto`]
    pub mode: TextMode,
}

pub fn load_image(path: &Path) -> Result<DynamicImage, ExtractionError> {
    ImageReader::open(path)
        .map_err(ExtractionError::Io)?
        .with_guessed_format()
        .map_err(ExtractionError::Io)?
        .decode()
        .map_err(|e| ExtractionError::Decode {
            what: "image",
            message: e.to_string(),
        })
}

/// Pick printed or handwritten for `Auto`, keep explicit modes as given
pub fn resolve_mode(image: &DynamicImage, requested: TextMode, config: &OcrConfig) -> TextMode {
    match requested {
        TextMode::Auto => {
            let gray = image.to_luma8();
            let variance = handwriting::laplacian_variance(&gray);
            let mode = if variance < config.handwriting_variance_threshold {
                TextMode::Handwritten
            } else {
                TextMode::Printed
            };
            debug!(variance, ?mode, "Resolved text mode");
            mode
        }
        explicit => explicit,
    }
}

pub fn thresholds_for(mode: TextMode, config: &OcrConfig) -> ThresholdPair {
    match mode {
        TextMode::Handwritten => ThresholdPair::handwritten(config),
        TextMode::Printed | TextMode::Auto => ThresholdPair::printed(config),
    }
}

pub fn recognize_image(
    engine: &dyn RecognitionEngine,
    image: &DynamicImage,
    requested: TextMode,
    config: &OcrConfig,
) -> Result<ImageText, ExtractionError> {
    let mode = resolve_mode(image, requested, config);
    let thresholds = thresholds_for(mode, config);
    let prepared = preprocess(image, config);

    let spans = engine.recognize(&prepared, &thresholds)?;
    let (text, confidence) = join_spans(&spans, thresholds.text_threshold);

    Ok(ImageText {
        text,
        confidence,
        mode,
    })
}

/// Keep spans scoring strictly above `text_threshold` with non-blank text,
/// join them with single spaces and average their confidences.
pub fn join_spans(spans: &[RecognizedSpan], text_threshold: f32) -> (String, f64) {
    let kept: Vec<&RecognizedSpan> = spans
        .iter()
        .filter(|s| s.confidence > text_threshold && !s.text.trim().is_empty())
        .collect();

    if kept.is_empty() {
        return (String::new(), 0.0);
    }

    let text = kept
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let mean = kept.iter().map(|s| s.confidence as f64).sum::<f64>() / kept.len() as f64;

    (text, mean.clamp(0.0, 1.0))
}
