//! Plain text decoding. UTF-8 first, Windows-1256 (Arabic/Persian Windows
//! code page) when the content is not valid UTF-8.

use encoding_rs::WINDOWS_1256;
use std::path::Path;

use crate::error::ExtractionError;

pub fn read_text_file(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(ExtractionError::Io)?;
    decode(&bytes)
}

pub fn decode(bytes: &[u8]) -> Result<String, ExtractionError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    let (text, had_errors) = WINDOWS_1256.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(ExtractionError::Decode {
            what: "text file",
            message: "content is neither UTF-8 nor Windows-1256".to_string(),
        });
    }

    Ok(text.into_owned())
}
