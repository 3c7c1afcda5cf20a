//! MCP Server implementation using rmcp

use crate::annotation::StaticAnnotationOverlay;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::export::export_document;
use crate::geometry::{Orientation, PageSize};
use crate::highlight::HighlightRegion;
use crate::pdf::{create_pdfium, PdfDocumentSource, PdfiumAssembler, PdfiumDocument};
use crate::pipeline::RenderSession;
use crate::raster::encode_png;
use crate::source::{resolve_base64, resolve_cache, resolve_path, CacheManager, ResolvedPdf};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where a tool reads its PDF from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// Reference to a PDF loaded earlier
    CacheRef {
        /// Cache key returned by `load_pdf`
        cache_key: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        let string_field = |name: &str| -> std::result::Result<Option<String>, D::Error> {
            match obj.get(name) {
                None => Ok(None),
                Some(v) => v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| {
                    serde::de::Error::custom(format!("\"{}\" must be a string", name))
                }),
            }
        };

        if let Some(path) = string_field("path")? {
            return Ok(PdfSource::Path { path });
        }
        if let Some(base64) = string_field("base64")? {
            return Ok(PdfSource::Base64 { base64 });
        }
        if let Some(cache_key) = string_field("cache_key")? {
            return Ok(PdfSource::CacheRef { cache_key });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got keys: {:?}",
            keys
        )))
    }
}

/// PDF highlight MCP server
#[derive(Clone)]
pub struct PdfServer {
    cache: Arc<RwLock<CacheManager>>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Annotation overlay with its label font, loaded once
    annotations: StaticAnnotationOverlay,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Request/Response types for load_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoadPdfParams {
    /// PDF to load
    pub source: PdfSource,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Return the document transcript (default: true)
    #[serde(default = "default_true")]
    pub include_transcript: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct LoadPdfResult {
    pub source: String,
    /// Key to pass as `{"cache_key": ...}` to the other tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub page_count: u32,
    /// Size of page 1 in PDF points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<PageSize>,
    /// Orientation of the exported document, taken from page 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    /// Text of every page, items joined by spaces, one line per page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for render_page
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenderPageParams {
    /// PDF to render
    pub source: PdfSource,
    /// Page number (1-indexed)
    pub page: u32,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Also return the page with highlights baked in
    #[serde(default)]
    pub include_flattened: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RenderPageResult {
    pub source: String,
    /// Page number (1-indexed)
    pub page: u32,
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// PDF-point to pixel scale used for the render
    pub scale: f64,
    /// Base64-encoded PNG of the page with static annotations drawn on it
    pub image_base64: String,
    /// MIME type (always "image/png")
    pub mime_type: String,
    /// Highlight boxes in surface pixels, meant to be stacked over the image
    pub highlights: Vec<HighlightRegion>,
    /// Base64-encoded PNG with the highlights baked in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flattened_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for download_highlighted_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DownloadHighlightedPdfParams {
    /// PDF to export
    pub source: PdfSource,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Output file path (default: highlighted_document.pdf)
    #[serde(default)]
    pub output_path: Option<String>,
    /// Also return the exported document as base64
    #[serde(default)]
    pub include_base64: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DownloadHighlightedPdfResult {
    pub source: String,
    /// Path the document was written to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    pub page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    /// Size of the exported document in bytes
    pub size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct LoadOutcome {
    page_count: u32,
    first_page: Option<PageSize>,
    transcript: String,
}

struct RenderOutcome {
    result: RenderPageResult,
    transcript: String,
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Pdfium {
        reason: format!("Task join error: {}", e),
    }
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new PdfServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let cache = CacheManager::new(config.cache_max_entries, config.cache_max_bytes);
        let annotations = StaticAnnotationOverlay::new(config.highlight.annotations.clone());
        Self {
            cache: Arc::new(RwLock::new(cache)),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            annotations,
        }
    }

    /// Load a PDF and report its layout and text
    #[tool(
        description = "Load a PDF for highlighting. Returns the page count, the size and orientation of page 1, the full text transcript, and a cache_key for render_page and download_highlighted_pdf.

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn load_pdf(&self, Parameters(params): Parameters<LoadPdfParams>) -> String {
        let result = self.process_load_pdf(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "load_pdf failed");
            LoadPdfResult {
                source: Self::source_name(&params.source),
                cache_key: None,
                page_count: 0,
                first_page: None,
                orientation: None,
                transcript: None,
                error: Some(e.client_message()),
            }
        });
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }

    /// Render one page with keyword highlights and static annotations
    #[tool(
        description = "Render one page (1-indexed) of a PDF. Returns a PNG of the page with the static red rectangles and label drawn on it, plus the keyword highlight boxes in pixel coordinates as a separate overlay. Set include_flattened to also get a PNG with the highlights baked in.

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn render_page(&self, Parameters(params): Parameters<RenderPageParams>) -> String {
        let result = self.process_render_page(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, page = params.page, "render_page failed");
            RenderPageResult {
                source: Self::source_name(&params.source),
                page: params.page,
                width: 0,
                height: 0,
                scale: self.config.highlight.scale,
                image_base64: String::new(),
                mime_type: "image/png".to_string(),
                highlights: Vec::new(),
                flattened_base64: None,
                error: Some(e.client_message()),
            }
        });
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }

    /// Export every page, highlights included, as an image-only PDF
    #[tool(
        description = "Export the whole PDF with keyword highlights and static annotations flattened into one full-page image per page. Writes highlighted_document.pdf (or output_path). Text in the output is not selectable.

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn download_highlighted_pdf(
        &self,
        Parameters(params): Parameters<DownloadHighlightedPdfParams>,
    ) -> String {
        let result = self
            .process_download_highlighted_pdf(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "download_highlighted_pdf failed");
                DownloadHighlightedPdfResult {
                    source: Self::source_name(&params.source),
                    output_path: None,
                    page_count: 0,
                    orientation: None,
                    size_bytes: 0,
                    data_base64: None,
                    error: Some(e.client_message()),
                }
            });
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }
}

impl PdfServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }

    async fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                let allowed = self.validate_path_access(path)?;
                resolve_path(allowed)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64),
            PdfSource::CacheRef { cache_key } => resolve_cache(cache_key, &self.cache).await,
        }
    }

    /// Remember a transcript for a cached document
    async fn remember_transcript(&self, source: &PdfSource, transcript: &str) {
        if let PdfSource::CacheRef { cache_key } = source {
            let cache_guard = self.cache.read().await;
            if cache_guard.set_transcript(cache_key, transcript) {
                tracing::debug!(cache_key = %cache_key, "transcript cached");
            }
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = match path_obj.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let canonical_parent =
            std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;

        let canonical_target =
            canonical_parent.join(path_obj.file_name().unwrap_or(std::ffi::OsStr::new("")));

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical_target.starts_with(&canonical_dir) {
                    return Ok(canonical_target);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Write the exported document, with sandbox validation.
    fn write_output(&self, path_str: &str, data: &[u8]) -> crate::error::Result<String> {
        self.validate_output_path_access(path_str)?;

        let path = Path::new(path_str);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::ExportIo {
                    reason: format!("Failed to create {}: {}", parent.display(), e),
                })?;
            }
        }

        std::fs::write(path, data).map_err(|e| Error::ExportIo {
            reason: format!("Failed to write {}: {}", path.display(), e),
        })?;
        Ok(path_str.to_string())
    }

    pub async fn process_load_pdf(
        &self,
        params: &LoadPdfParams,
    ) -> crate::error::Result<LoadPdfResult> {
        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.source_name.clone();

        let data = Arc::clone(&resolved.data);
        let password = params.password.clone();
        let cached_transcript = resolved.transcript.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let pdfium = create_pdfium()?;
            let document = PdfiumDocument::load(&pdfium, &data, password.as_deref())?;
            let page_count = document.page_count();
            let first_page = if page_count > 0 {
                Some(document.page_size(1)?)
            } else {
                None
            };
            let transcript = match cached_transcript {
                Some(text) => text.to_string(),
                None => crate::text::extract_transcript(&document)?,
            };
            Ok::<_, Error>(LoadOutcome {
                page_count,
                first_page,
                transcript,
            })
        })
        .await
        .map_err(join_error)??;

        // Loaded documents stay addressable by key
        let cache_key = match &params.source {
            PdfSource::CacheRef { cache_key } => Some(cache_key.clone()),
            _ => {
                let cache_guard = self.cache.write().await;
                let key = cache_guard.generate_unique_key();
                let stored = cache_guard.put(key.clone(), Arc::clone(&resolved.data));
                stored.then_some(key)
            }
        };
        if let Some(key) = &cache_key {
            self.cache.read().await.set_transcript(key, &outcome.transcript);
        }

        tracing::info!(
            source = %source_name,
            pages = outcome.page_count,
            "PDF loaded"
        );

        Ok(LoadPdfResult {
            source: source_name,
            cache_key,
            page_count: outcome.page_count,
            first_page: outcome.first_page,
            orientation: outcome.first_page.map(|size| size.orientation()),
            transcript: params.include_transcript.then_some(outcome.transcript),
            error: None,
        })
    }

    pub async fn process_render_page(
        &self,
        params: &RenderPageParams,
    ) -> crate::error::Result<RenderPageResult> {
        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.source_name.clone();

        let data = resolved.data;
        let cached_transcript = resolved.transcript;
        let password = params.password.clone();
        let page = params.page;
        let include_flattened = params.include_flattened;
        let config = Arc::clone(&self.config);
        let annotations = self.annotations.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let pdfium = create_pdfium()?;
            let document = PdfiumDocument::load(&pdfium, &data, password.as_deref())?;
            let mut session =
                RenderSession::with_annotations(&document, &config.highlight, annotations)?
                    .with_max_image_pixels(config.max_image_pixels);
            if let Some(text) = cached_transcript {
                session.seed_transcript(text.to_string());
            }

            session.render_page(page)?;
            let composited = session.composited().ok_or_else(|| Error::Render {
                page,
                reason: "page did not reach the composited stage".to_string(),
            })?;

            let engine = base64::engine::general_purpose::STANDARD;
            let image_base64 = engine.encode(encode_png(composited.surface.image())?);
            let flattened_base64 = if include_flattened {
                Some(engine.encode(encode_png(&composited.flatten())?))
            } else {
                None
            };

            let result = RenderPageResult {
                source: source_name,
                page,
                width: composited.surface.width(),
                height: composited.surface.height(),
                scale: composited.viewport.scale(),
                image_base64,
                mime_type: "image/png".to_string(),
                highlights: composited.highlights.to_vec(),
                flattened_base64,
                error: None,
            };
            let transcript = session.transcript()?.to_string();
            Ok::<_, Error>(RenderOutcome { result, transcript })
        })
        .await
        .map_err(join_error)??;

        self.remember_transcript(&params.source, &outcome.transcript)
            .await;
        Ok(outcome.result)
    }

    pub async fn process_download_highlighted_pdf(
        &self,
        params: &DownloadHighlightedPdfParams,
    ) -> crate::error::Result<DownloadHighlightedPdfResult> {
        let output_path = params
            .output_path
            .clone()
            .unwrap_or_else(|| self.config.output_file.clone());
        // Fail before rendering anything when the target is off limits
        self.validate_output_path_access(&output_path)?;

        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.source_name.clone();

        let data = resolved.data;
        let cached_transcript = resolved.transcript;
        let password = params.password.clone();
        let config = Arc::clone(&self.config);
        let annotations = self.annotations.clone();

        let (exported, transcript) = tokio::task::spawn_blocking(move || {
            let pdfium = create_pdfium()?;
            let document = PdfiumDocument::load(&pdfium, &data, password.as_deref())?;
            let mut session =
                RenderSession::with_annotations(&document, &config.highlight, annotations)?
                    .with_max_image_pixels(config.max_image_pixels);
            if let Some(text) = cached_transcript {
                session.seed_transcript(text.to_string());
            }

            let exported = export_document(&mut session, |orientation, first_page| {
                PdfiumAssembler::new(&pdfium, orientation, first_page)
            })?;
            let transcript = session.transcript()?.to_string();
            Ok::<_, Error>((exported, transcript))
        })
        .await
        .map_err(join_error)??;

        self.remember_transcript(&params.source, &transcript).await;

        let written = self.write_output(&output_path, &exported.bytes)?;
        tracing::info!(
            source = %source_name,
            path = %written,
            pages = exported.page_count,
            bytes = exported.bytes.len(),
            "highlighted PDF written"
        );

        let data_base64 = params
            .include_base64
            .then(|| base64::engine::general_purpose::STANDARD.encode(&exported.bytes));

        Ok(DownloadHighlightedPdfResult {
            source: source_name,
            output_path: Some(written),
            page_count: exported.page_count,
            orientation: Some(exported.orientation),
            size_bytes: exported.bytes.len(),
            data_base64,
            error: None,
        })
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF highlight server: load a PDF, render pages with keyword highlights and \
                 static rectangle annotations, and export the highlighted document as PDF."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with the default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let server = PdfServer::with_config(config);

    tracing::info!("PDF highlight server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
