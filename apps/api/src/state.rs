use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::extraction::TextExtractor;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is read-only; requests share no mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Pluggable text extractor. Default: PdfTextExtractor.
    pub extractor: Arc<dyn TextExtractor>,
    /// Pluggable analyzer. Default: LlmAnalyzer.
    pub analyzer: Arc<dyn Analyzer>,
}
