use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Internationalization service using Fluent (thread-safe)
pub struct I18n {
    bundles: RwLock<HashMap<String, FluentBundle<FluentResource>>>,
    default_locale: String,
}

impl I18n {
    /// Create a new i18n service with embedded Persian and English translations
    pub fn new(default_locale: &str) -> Self {
        let i18n = Self {
            bundles: RwLock::new(HashMap::new()),
            default_locale: default_locale.to_string(),
        };

        for (locale, content) in [("fa", FA_TRANSLATIONS), ("en", EN_TRANSLATIONS)] {
            if let Err(e) = i18n.add_locale(locale, content) {
                warn!(locale = %locale, error = %e, "Failed to load embedded translations");
            }
        }

        i18n
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Add a locale with translations
    pub fn add_locale(&self, locale: &str, content: &str) -> Result<(), String> {
        let lang_id: LanguageIdentifier = locale
            .parse()
            .map_err(|e| format!("Invalid locale '{}': {}", locale, e))?;

        let resource = FluentResource::try_new(content.to_string())
            .map_err(|(_, errors)| format!("Failed to parse Fluent resource: {:?}", errors))?;

        let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
        // Page headers and messages are stored verbatim, so no bidi isolation marks
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| format!("Failed to add resource to bundle: {:?}", errors))?;

        let mut bundles = self.bundles.write().unwrap();
        bundles.insert(locale.to_string(), bundle);

        debug!(locale = %locale, "Loaded translations");

        Ok(())
    }

    /// Get a translated message
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        // Try requested locale, fall back to default, fall back to key
        self.try_get(locale, key, args)
            .or_else(|| self.try_get(&self.default_locale, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    /// Try to get a translation from a specific locale
    fn try_get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundles = self.bundles.read().unwrap();
        let bundle = bundles.get(locale)?;
        let message = bundle.get_message(key)?;
        let pattern = message.value()?;

        let mut errors = vec![];
        let result = bundle.format_pattern(pattern, args, &mut errors);

        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }

        Some(result.to_string())
    }

    /// Get a translated message with arguments
    pub fn format(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (k, v) in args {
            fluent_args.set(*k, *v);
        }
        self.get(locale, key, Some(&fluent_args))
    }
}

const FA_TRANSLATIONS: &str = r#"
# Parvande - Persian translations

# Errors
error-person-not-found = شخص یافت نشد: { $id }
error-folder-not-found = پوشه یافت نشد: { $id }
error-document-not-found = سند یافت نشد: { $id }
error-file-too-large = حجم فایل بیش از حد مجاز است ({ $size } بایت، حداکثر { $max } بایت)
error-internal = خطای داخلی رخ داد

# Extraction
ocr-page-header = --- صفحه { $page } ---
ocr-page-header-ocr = --- صفحه { $page } (OCR) ---
ocr-page-no-text = متنی یافت نشد
ocr-pdf-empty = 📝 متنی در PDF یافت نشد
ocr-text-empty = 📝 فایل متنی خالی است
ocr-image-empty = 📝 متنی در تصویر یافت نشد
ocr-error-unsupported = ❌ فرمت فایل پشتیبانی نمی‌شود
ocr-error-engine-unavailable = ❌ موتور OCR در دسترس نیست
ocr-error-file-not-found = ❌ فایل یافت نشد
ocr-error-generic = ❌ خطا: { $message }

# Health
health-status-healthy = سرویس سالم است
health-status-degraded = سرویس با محدودیت فعال است: { $reason }
"#;

const EN_TRANSLATIONS: &str = r#"
# Parvande - English translations

# Errors
error-person-not-found = Person not found: { $id }
error-folder-not-found = Folder not found: { $id }
error-document-not-found = Document not found: { $id }
error-file-too-large = File too large ({ $size } bytes, max { $max } bytes)
error-internal = An internal error occurred

# Extraction
ocr-page-header = --- Page { $page } ---
ocr-page-header-ocr = --- Page { $page } (OCR) ---
ocr-page-no-text = No text found
ocr-pdf-empty = 📝 No text found in PDF
ocr-text-empty = 📝 Text file is empty
ocr-image-empty = 📝 No text found in image
ocr-error-unsupported = ❌ Unsupported file format
ocr-error-engine-unavailable = ❌ OCR engine is not available
ocr-error-file-not-found = ❌ File not found
ocr-error-generic = ❌ Error: { $message }

# Health
health-status-healthy = Service is healthy
health-status-degraded = Service is degraded: { $reason }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persian_default() {
        let i18n = I18n::new("fa");
        assert_eq!(
            i18n.format("fa", "ocr-page-header", &[("page", "3")]),
            "--- صفحه 3 ---"
        );
    }

    #[test]
    fn test_english_locale() {
        let i18n = I18n::new("fa");
        assert_eq!(
            i18n.format("en", "ocr-page-header-ocr", &[("page", "1")]),
            "--- Page 1 (OCR) ---"
        );
    }

    #[test]
    fn test_unknown_locale_falls_back_to_default() {
        let i18n = I18n::new("en");
        assert_eq!(i18n.get("de", "ocr-page-no-text", None), "No text found");
    }

    #[test]
    fn test_missing_key_returns_key() {
        let i18n = I18n::new("fa");
        assert_eq!(i18n.get("fa", "no-such-key", None), "no-such-key");
    }
}
