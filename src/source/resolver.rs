//! Source resolution for PDF data

use crate::error::{Error, Result};
use crate::pdf::ensure_pdf_header;
use crate::source::CacheManager;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolved PDF data
pub struct ResolvedPdf {
    pub data: Arc<Vec<u8>>,
    pub source_name: String,
    /// Transcript memoized by an earlier load of the same cached document
    pub transcript: Option<Arc<str>>,
}

/// Resolve a file path to PDF data
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;
    ensure_pdf_header(&data)?;

    Ok(ResolvedPdf {
        data: Arc::new(data),
        source_name: path.display().to_string(),
        transcript: None,
    })
}

/// Resolve base64 encoded data to PDF data
pub fn resolve_base64(base64_data: &str) -> Result<ResolvedPdf> {
    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data.trim())?;
    ensure_pdf_header(&data).map_err(|_| Error::InvalidPdf {
        reason: "Decoded data is not a valid PDF file".to_string(),
    })?;

    Ok(ResolvedPdf {
        data: Arc::new(data),
        source_name: "<base64>".to_string(),
        transcript: None,
    })
}

/// Resolve a cache key to PDF data
pub async fn resolve_cache(
    cache_key: &str,
    cache: &Arc<RwLock<CacheManager>>,
) -> Result<ResolvedPdf> {
    let cache_guard = cache.read().await;
    let entry = cache_guard
        .get(cache_key)
        .ok_or_else(|| Error::CacheKeyNotFound {
            key: cache_key.to_string(),
        })?;

    Ok(ResolvedPdf {
        data: entry.data,
        source_name: format!("<cache:{}>", cache_key),
        transcript: entry.transcript,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_base64_invalid() {
        // Valid base64 but not PDF
        let result = resolve_base64("SGVsbG8gV29ybGQ="); // "Hello World"
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_resolve_base64_invalid_base64() {
        let result = resolve_base64("not valid base64!!!");
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_resolve_base64_pdf() {
        // "%PDF-1.4"
        let resolved = resolve_base64("JVBERi0xLjQ=").unwrap();
        assert_eq!(resolved.data.as_slice(), b"%PDF-1.4");
        assert_eq!(resolved.source_name, "<base64>");
    }

    #[test]
    fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf");
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_resolve_path_rejects_non_pdf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plain text").unwrap();
        let result = resolve_path(file.path());
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_resolve_cache_carries_transcript() {
        let cache = Arc::new(RwLock::new(CacheManager::new(4, 1024)));
        tokio_test::block_on(async {
            {
                let guard = cache.read().await;
                guard.put("k".to_string(), b"%PDF-1.4".to_vec());
                guard.set_transcript("k", "text\n");
            }
            let resolved = resolve_cache("k", &cache).await.unwrap();
            assert_eq!(resolved.transcript.as_deref(), Some("text\n"));
            assert!(matches!(
                resolve_cache("missing", &cache).await,
                Err(Error::CacheKeyNotFound { .. })
            ));
        });
    }
}
