use arc_swap::ArcSwap;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;
use crate::error::ServiceResult;

// ==================== Static Configuration (startup-only) ====================

/// Static configuration that cannot be changed at runtime
/// These settings affect server binding or require restart to change
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Locale used for extraction placeholders and API error messages
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Run the OCR queue worker inside the server process
    #[serde(default = "default_run_worker")]
    pub run_worker: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Recognition engine configuration. The engine is constructed once at startup.
///
/// Only used when the crate is built with the `tesseract` feature, which needs
/// libtesseract and leptonica at build time. A default build has no engine:
/// embedded PDF text and plain text files are still extracted, while images
/// and pages without a text layer come back as `engine_unavailable`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Tesseract language string, e.g. `fas+eng`
    #[serde(default = "default_languages")]
    pub languages: String,

    /// Directory containing `*.traineddata`; the Tesseract default when unset
    #[serde(default)]
    pub data_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            data_path: None,
        }
    }
}

// ==================== Dynamic Configuration (hot-reloadable) ====================

/// Dynamic configuration that can be updated at runtime via API
/// DB values override config file/env defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            ocr: OcrConfig::default(),
            limits: default_limits(),
        }
    }
}

/// Queue worker timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Sleep between polls of the pending queue
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Sleep after a loop-level failure (e.g. the database is unreachable)
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

/// OCR tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Laplacian variance below which an image is treated as handwriting.
    /// Uncalibrated; tune per scanner.
    #[serde(default = "default_handwriting_variance_threshold")]
    pub handwriting_variance_threshold: f64,

    #[serde(default = "default_printed_text_threshold")]
    pub printed_text_threshold: f32,

    #[serde(default = "default_printed_low_text")]
    pub printed_low_text: f32,

    #[serde(default = "default_handwritten_text_threshold")]
    pub handwritten_text_threshold: f32,

    #[serde(default = "default_handwritten_low_text")]
    pub handwritten_low_text: f32,

    /// CLAHE clip limit (multiples of the uniform bin height)
    #[serde(default = "default_clahe_clip_limit")]
    pub clahe_clip_limit: f32,

    /// CLAHE tiles per axis
    #[serde(default = "default_clahe_tile_grid")]
    pub clahe_tile_grid: u32,

    /// Median filter radius (1 = 3x3 window)
    #[serde(default = "default_median_radius")]
    pub median_radius: u32,

    /// Resolution used when rendering PDF pages that have no embedded text
    #[serde(default = "default_pdf_render_dpi")]
    pub pdf_render_dpi: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            handwriting_variance_threshold: default_handwriting_variance_threshold(),
            printed_text_threshold: default_printed_text_threshold(),
            printed_low_text: default_printed_low_text(),
            handwritten_text_threshold: default_handwritten_text_threshold(),
            handwritten_low_text: default_handwritten_low_text(),
            clahe_clip_limit: default_clahe_clip_limit(),
            clahe_tile_grid: default_clahe_tile_grid(),
            median_radius: default_median_radius(),
            pdf_render_dpi: default_pdf_render_dpi(),
        }
    }
}

/// Size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_document_size")]
    pub max_document_size_bytes: u64,
}

// ==================== DynamicConfig Settings Keys ====================

/// All valid setting keys for DynamicConfig
pub const VALID_SETTING_KEYS: &[&str] = &[
    "worker.poll_interval_secs",
    "worker.error_backoff_secs",
    "ocr.handwriting_variance_threshold",
    "ocr.printed_text_threshold",
    "ocr.printed_low_text",
    "ocr.handwritten_text_threshold",
    "ocr.handwritten_low_text",
    "ocr.clahe_clip_limit",
    "ocr.clahe_tile_grid",
    "ocr.median_radius",
    "ocr.pdf_render_dpi",
    "limits.max_document_size_bytes",
];

impl DynamicConfig {
    /// Get all valid setting keys
    pub fn valid_keys() -> HashSet<&'static str> {
        VALID_SETTING_KEYS.iter().copied().collect()
    }

    /// Convert config to key-value map for API response
    pub fn to_key_value_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        // Worker settings
        map.insert(
            "worker.poll_interval_secs".to_string(),
            serde_json::json!(self.worker.poll_interval_secs),
        );
        map.insert(
            "worker.error_backoff_secs".to_string(),
            serde_json::json!(self.worker.error_backoff_secs),
        );

        // OCR settings
        map.insert(
            "ocr.handwriting_variance_threshold".to_string(),
            serde_json::json!(self.ocr.handwriting_variance_threshold),
        );
        map.insert(
            "ocr.printed_text_threshold".to_string(),
            serde_json::json!(self.ocr.printed_text_threshold),
        );
        map.insert(
            "ocr.printed_low_text".to_string(),
            serde_json::json!(self.ocr.printed_low_text),
        );
        map.insert(
            "ocr.handwritten_text_threshold".to_string(),
            serde_json::json!(self.ocr.handwritten_text_threshold),
        );
        map.insert(
            "ocr.handwritten_low_text".to_string(),
            serde_json::json!(self.ocr.handwritten_low_text),
        );
        map.insert(
            "ocr.clahe_clip_limit".to_string(),
            serde_json::json!(self.ocr.clahe_clip_limit),
        );
        map.insert(
            "ocr.clahe_tile_grid".to_string(),
            serde_json::json!(self.ocr.clahe_tile_grid),
        );
        map.insert(
            "ocr.median_radius".to_string(),
            serde_json::json!(self.ocr.median_radius),
        );
        map.insert(
            "ocr.pdf_render_dpi".to_string(),
            serde_json::json!(self.ocr.pdf_render_dpi),
        );

        // Limits settings
        map.insert(
            "limits.max_document_size_bytes".to_string(),
            serde_json::json!(self.limits.max_document_size_bytes),
        );

        map
    }

    /// Apply DB settings as overrides to this config
    pub fn merge_from_db(&mut self, db_settings: &HashMap<String, serde_json::Value>) {
        for (key, value) in db_settings {
            self.apply_setting(key, value);
        }
    }

    /// Apply a single setting value
    fn apply_setting(&mut self, key: &str, value: &serde_json::Value) {
        match key {
            // Worker settings
            "worker.poll_interval_secs" => {
                if let Some(v) = value.as_u64() {
                    self.worker.poll_interval_secs = v;
                }
            }
            "worker.error_backoff_secs" => {
                if let Some(v) = value.as_u64() {
                    self.worker.error_backoff_secs = v;
                }
            }

            // OCR settings
            "ocr.handwriting_variance_threshold" => {
                if let Some(v) = value.as_f64() {
                    self.ocr.handwriting_variance_threshold = v;
                }
            }
            "ocr.printed_text_threshold" => {
                if let Some(v) = value.as_f64() {
                    self.ocr.printed_text_threshold = v as f32;
                }
            }
            "ocr.printed_low_text" => {
                if let Some(v) = value.as_f64() {
                    self.ocr.printed_low_text = v as f32;
                }
            }
            "ocr.handwritten_text_threshold" => {
                if let Some(v) = value.as_f64() {
                    self.ocr.handwritten_text_threshold = v as f32;
                }
            }
            "ocr.handwritten_low_text" => {
                if let Some(v) = value.as_f64() {
                    self.ocr.handwritten_low_text = v as f32;
                }
            }
            "ocr.clahe_clip_limit" => {
                if let Some(v) = value.as_f64() {
                    self.ocr.clahe_clip_limit = v as f32;
                }
            }
            "ocr.clahe_tile_grid" => {
                if let Some(v) = value.as_u64() {
                    self.ocr.clahe_tile_grid = v as u32;
                }
            }
            "ocr.median_radius" => {
                if let Some(v) = value.as_u64() {
                    self.ocr.median_radius = v as u32;
                }
            }
            "ocr.pdf_render_dpi" => {
                if let Some(v) = value.as_f64() {
                    self.ocr.pdf_render_dpi = v as f32;
                }
            }

            // Limits settings
            "limits.max_document_size_bytes" => {
                if let Some(v) = value.as_u64() {
                    self.limits.max_document_size_bytes = v;
                }
            }

            _ => {
                tracing::warn!(key = %key, "Unknown setting key in merge_from_db");
            }
        }
    }
}

// ==================== RuntimeConfig (combines static + dynamic) ====================

/// Runtime configuration manager
/// Combines static config (startup-only) with dynamic config (hot-reloadable via ArcSwap)
pub struct RuntimeConfig {
    /// Static configuration (never changes after startup)
    pub static_config: StaticConfig,
    /// Dynamic configuration (can be hot-reloaded)
    dynamic: ArcSwap<DynamicConfig>,
}

impl RuntimeConfig {
    /// Build from already-resolved parts
    pub fn new(static_config: StaticConfig, dynamic: DynamicConfig) -> Self {
        Self {
            static_config,
            dynamic: ArcSwap::from_pointee(dynamic),
        }
    }

    /// Get current dynamic config snapshot (lock-free read)
    pub fn dynamic(&self) -> arc_swap::Guard<Arc<DynamicConfig>> {
        self.dynamic.load()
    }

    /// Update dynamic config (atomic swap)
    pub fn update_dynamic(&self, new_config: DynamicConfig) {
        self.dynamic.store(Arc::new(new_config));
    }

    /// Load dynamic config from file/env and apply DB overrides
    pub fn load(static_config: StaticConfig, db: &Database) -> ServiceResult<Self> {
        let mut dynamic = load_dynamic_config()?;
        let db_settings = db.get_all_settings()?;
        dynamic.merge_from_db(&db_settings);

        Ok(Self::new(static_config, dynamic))
    }

    /// Rebuild dynamic config from file/env defaults + DB and swap atomically
    pub fn reload_from_db(&self, db: &Database) -> ServiceResult<()> {
        let mut dynamic = load_dynamic_config()?;
        let db_settings = db.get_all_settings()?;
        dynamic.merge_from_db(&db_settings);
        self.update_dynamic(dynamic);
        Ok(())
    }
}

// ==================== Config Loading Functions ====================

fn config_sources() -> ServiceResult<Config> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("PARVANDE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| crate::error::ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })
}

/// Load static configuration from file and env vars
pub fn load_static_config() -> ServiceResult<StaticConfig> {
    config_sources()?
        .try_deserialize()
        .map_err(|e| crate::error::ServiceError::Config {
            message: format!("Failed to deserialize static config: {}", e),
        })
}

/// Load dynamic configuration from file and env vars (without DB overrides)
fn load_dynamic_config() -> ServiceResult<DynamicConfig> {
    config_sources()?
        .try_deserialize()
        .map_err(|e| crate::error::ServiceError::Config {
            message: format!("Failed to deserialize dynamic config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
        locale: default_locale(),
        run_worker: default_run_worker(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_locale() -> String {
    "fa".to_string()
}

fn default_run_worker() -> bool {
    true
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_languages() -> String {
    "fas+eng".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_error_backoff_secs() -> u64 {
    30
}

fn default_handwriting_variance_threshold() -> f64 {
    100.0
}

fn default_printed_text_threshold() -> f32 {
    0.4
}

fn default_printed_low_text() -> f32 {
    0.3
}

fn default_handwritten_text_threshold() -> f32 {
    0.2
}

fn default_handwritten_low_text() -> f32 {
    0.1
}

fn default_clahe_clip_limit() -> f32 {
    2.0
}

fn default_clahe_tile_grid() -> u32 {
    8
}

fn default_median_radius() -> u32 {
    1
}

fn default_pdf_render_dpi() -> f32 {
    150.0
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_document_size_bytes: default_max_document_size(),
    }
}

fn default_max_document_size() -> u64 {
    52_428_800 // 50MB
}

#[cfg(test)]
pub(crate) fn test_static_config(data_dir: PathBuf) -> StaticConfig {
    StaticConfig {
        server: default_server(),
        storage: StorageConfig { data_dir },
        engine: EngineConfig::default(),
    }
}
