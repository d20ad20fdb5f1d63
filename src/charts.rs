//! Chart images delivered as `data:` URLs
//!
//! The server embeds rendered charts inline as base64 data URLs. This module
//! decodes them for display summaries and writes them out as image files.

use base64::Engine;
use std::path::{Path, PathBuf};

use crate::render::Region;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("not a data URL")]
    NotDataUrl,
    #[error("only base64 data URLs are supported")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A decoded `data:<media>;base64,<payload>` URL
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// File extension for the media type
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/svg+xml" => "svg",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

pub fn parse_data_url(url: &str) -> Result<DataUrl, ChartError> {
    let rest = url.strip_prefix("data:").ok_or(ChartError::NotDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(ChartError::NotDataUrl)?;

    let mut params = meta.split(';');
    let media_type = params.next().unwrap_or_default().trim().to_lowercase();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(ChartError::NotBase64);
    }

    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;

    Ok(DataUrl {
        media_type: if media_type.is_empty() {
            "text/plain".to_string()
        } else {
            media_type
        },
        bytes,
    })
}

/// Short human-readable description of an image source
pub fn describe(src: &str) -> String {
    if !src.starts_with("data:") {
        return src.to_string();
    }

    match parse_data_url(src) {
        Ok(data) => format!("{} ({})", data.media_type, format_bytes(data.bytes.len() as u64)),
        Err(e) => format!("unreadable data URL ({})", e),
    }
}

/// Write every data-URL chart in `region` to `dir` as `<SYMBOL>-<n>.<ext>`.
///
/// Returns the paths written, in display order. Charts referenced by plain
/// URL are skipped.
pub fn save_charts(region: &Region, dir: &Path, symbol: &str) -> Result<Vec<PathBuf>, ChartError> {
    let mut written = Vec::new();

    let charts: Vec<&str> = region.images().collect();
    if charts.is_empty() {
        return Ok(written);
    }

    std::fs::create_dir_all(dir).map_err(|source| ChartError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = file_stem(symbol);
    for (i, src) in charts.iter().enumerate() {
        let data = match parse_data_url(src) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Skipping chart {}: {}", i + 1, e);
                continue;
            }
        };

        let path = dir.join(format!("{}-{}.{}", stem, i + 1, data.extension()));
        std::fs::write(&path, &data.bytes).map_err(|source| ChartError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("Saved chart to {}", path.display());
        written.push(path);
    }

    Ok(written)
}

/// Keep only characters that are safe in a file name
fn file_stem(symbol: &str) -> String {
    let stem: String = symbol
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect::<String>()
        .to_uppercase();

    if stem.is_empty() {
        "chart".to_string()
    } else {
        stem
    }
}

/// Format bytes to human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;

    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render, SubmissionResult};

    // "hello" in base64
    const HELLO_PNG: &str = "data:image/png;base64,aGVsbG8=";

    #[test]
    fn test_parse_data_url() {
        let data = parse_data_url(HELLO_PNG).unwrap();
        assert_eq!(data.media_type, "image/png");
        assert_eq!(data.bytes, b"hello");
        assert_eq!(data.extension(), "png");
    }

    #[test]
    fn test_parse_rejects_other_urls() {
        assert!(matches!(
            parse_data_url("https://example.com/a.png"),
            Err(ChartError::NotDataUrl)
        ));
        assert!(matches!(
            parse_data_url("data:text/plain,hello"),
            Err(ChartError::NotBase64)
        ));
        assert!(matches!(
            parse_data_url("data:image/png;base64,@@@"),
            Err(ChartError::Decode(_))
        ));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(HELLO_PNG), "image/png (5 B)");
        assert_eq!(describe("/static/a.png"), "/static/a.png");
    }

    #[test]
    fn test_save_charts_writes_data_urls_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut region = Region::new();
        render(
            &mut region,
            &SubmissionResult::Success {
                stats: None,
                images: vec![
                    HELLO_PNG.to_string(),
                    "https://example.com/skip.png".to_string(),
                    "data:image/jpeg;base64,d29ybGQ=".to_string(),
                ],
            },
        );

        let target = dir.path().join("out");
        let written = save_charts(&region, &target, " aapl ").unwrap();

        assert_eq!(
            written,
            vec![target.join("AAPL-1.png"), target.join("AAPL-3.jpg")]
        );
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"hello");
        assert_eq!(std::fs::read(&written[1]).unwrap(), b"world");
    }

    #[test]
    fn test_save_charts_empty_region() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never-created");
        let written = save_charts(&Region::new(), &target, "AAPL").unwrap();
        assert!(written.is_empty());
        assert!(!target.exists());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MiB");
    }
}
