//! PDF Highlight Server Library
//!
//! Renders PDF pages with keyword highlights and fixed rectangle annotations,
//! and exports the highlighted document as an image-only PDF. Exposed over MCP
//! with these tools:
//! - `load_pdf`: Load a PDF, report its layout and text transcript
//! - `render_page`: Render one page with highlights and annotations
//! - `download_highlighted_pdf`: Export every page with highlights flattened in

pub mod annotation;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod highlight;
pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod server;
pub mod source;
pub mod text;

pub use config::{HighlightConfig, ServerConfig};
pub use error::{Error, Result};
pub use export::{export_document, ExportedDocument};
pub use pipeline::{RenderSession, RenderStage};
pub use server::{run_server, run_server_with_config, PdfServer, PdfSource};
