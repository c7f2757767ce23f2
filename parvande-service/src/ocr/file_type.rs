//! File type classification by content sniffing with an extension fallback.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Broad file category used to route extraction
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::AsRefStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Text,
    Unknown,
}

/// How many leading bytes are inspected
const SNIFF_LEN: usize = 8192;

#[derive(Debug, Clone, Copy)]
enum MagicByte {
    Exact(u8),
    Any,
}

impl MagicByte {
    fn matches(self, byte: u8) -> bool {
        match self {
            MagicByte::Exact(b) => b == byte,
            MagicByte::Any => true,
        }
    }
}

struct MagicPattern {
    offset: usize,
    bytes: &'static [MagicByte],
    kind: FileKind,
    /// Extra header check for signatures too short to trust on their own
    header: Option<fn(&[u8]) -> bool>,
}

impl MagicPattern {
    fn matches(&self, buf: &[u8]) -> bool {
        let end = self.offset + self.bytes.len();
        if buf.len() < end {
            return false;
        }
        self.bytes
            .iter()
            .zip(&buf[self.offset..end])
            .all(|(pattern, byte)| pattern.matches(*byte))
            && self.header.is_none_or(|check| check(buf))
    }
}

/// Known BITMAPINFOHEADER family sizes (core, v1 to v5, OS/2 v2)
const BMP_DIB_HEADER_SIZES: &[u32] = &[12, 16, 40, 52, 56, 64, 108, 124];

/// `BM` alone is ordinary text. A real bitmap has zeroed reserved words at
/// 6..10 and a known DIB header size at 14.
fn bmp_header(buf: &[u8]) -> bool {
    let Some(header) = buf.get(..18) else {
        return false;
    };
    let dib_size = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
    header[6..10].iter().all(|&b| b == 0) && BMP_DIB_HEADER_SIZES.contains(&dib_size)
}

use MagicByte::{Any, Exact};

const MAGIC_PATTERNS: &[MagicPattern] = &[
    // %PDF-
    MagicPattern {
        offset: 0,
        bytes: &[Exact(0x25), Exact(0x50), Exact(0x44), Exact(0x46), Exact(0x2D)],
        kind: FileKind::Pdf,
        header: None,
    },
    // PNG
    MagicPattern {
        offset: 0,
        bytes: &[
            Exact(0x89),
            Exact(0x50),
            Exact(0x4E),
            Exact(0x47),
            Exact(0x0D),
            Exact(0x0A),
            Exact(0x1A),
            Exact(0x0A),
        ],
        kind: FileKind::Image,
        header: None,
    },
    // JPEG
    MagicPattern {
        offset: 0,
        bytes: &[Exact(0xFF), Exact(0xD8), Exact(0xFF)],
        kind: FileKind::Image,
        header: None,
    },
    // GIF8
    MagicPattern {
        offset: 0,
        bytes: &[Exact(0x47), Exact(0x49), Exact(0x46), Exact(0x38)],
        kind: FileKind::Image,
        header: None,
    },
    // BM
    MagicPattern {
        offset: 0,
        bytes: &[Exact(0x42), Exact(0x4D)],
        kind: FileKind::Image,
        header: Some(bmp_header),
    },
    // TIFF little endian
    MagicPattern {
        offset: 0,
        bytes: &[Exact(0x49), Exact(0x49), Exact(0x2A), Exact(0x00)],
        kind: FileKind::Image,
        header: None,
    },
    // TIFF big endian
    MagicPattern {
        offset: 0,
        bytes: &[Exact(0x4D), Exact(0x4D), Exact(0x00), Exact(0x2A)],
        kind: FileKind::Image,
        header: None,
    },
    // RIFF....WEBP
    MagicPattern {
        offset: 0,
        bytes: &[
            Exact(0x52),
            Exact(0x49),
            Exact(0x46),
            Exact(0x46),
            Any,
            Any,
            Any,
            Any,
            Exact(0x57),
            Exact(0x45),
            Exact(0x42),
            Exact(0x50),
        ],
        kind: FileKind::Image,
        header: None,
    },
];

/// Classify a file. Never fails: unreadable or unrecognized files fall back
/// to their extension and end up as [`FileKind::Unknown`] if that does not
/// match either.
pub fn classify(path: &Path) -> FileKind {
    match read_head(path) {
        Some(head) if !head.is_empty() => {
            sniff(&head).unwrap_or_else(|| classify_by_extension(path))
        }
        _ => classify_by_extension(path),
    }
}

fn read_head(path: &Path) -> Option<Vec<u8>> {
    let file = std::fs::File::open(path).ok()?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).ok()?;
    Some(head)
}

/// Content-based detection. `None` means inconclusive.
fn sniff(head: &[u8]) -> Option<FileKind> {
    if let Some(pattern) = MAGIC_PATTERNS.iter().find(|p| p.matches(head)) {
        return Some(pattern.kind);
    }

    if looks_like_text(head) {
        return Some(FileKind::Text);
    }

    None
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }

    match std::str::from_utf8(head) {
        Ok(_) => true,
        // Multibyte sequence cut off by the sniff window
        Err(e) if e.error_len().is_none() => true,
        // Not UTF-8: accept legacy single-byte encodings as long as there are
        // no control characters besides ordinary whitespace
        Err(_) => head
            .iter()
            .all(|&b| b >= 0x20 || matches!(b, b'\t' | b'\n' | b'\r' | 0x0C)),
    }
}

/// Extension-only classification
pub fn classify_by_extension(path: &Path) -> FileKind {
    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
    else {
        return FileKind::Unknown;
    };

    match ext.as_str() {
        "pdf" => FileKind::Pdf,
        "jpg" | "jpeg" | "png" | "bmp" | "tiff" | "tif" => FileKind::Image,
        "txt" | "text" => FileKind::Text,
        _ => FileKind::Unknown,
    }
}
