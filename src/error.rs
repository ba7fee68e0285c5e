//! Error types for conversion operations

use std::fmt;

/// Errors that can occur while converting between Markdown and HTML
///
/// HTML to Markdown conversion is total and never produces one of these;
/// only the Markdown renderer's HTML writer can fail.
#[derive(Debug)]
pub enum ConversionError {
    /// The Markdown renderer failed to serialize its HTML output
    RenderError(String),
    /// Rendered output was not valid UTF-8
    EncodingError(String),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::RenderError(msg) => write!(f, "Render error: {}", msg),
            ConversionError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
        }
    }
}

impl std::error::Error for ConversionError {}
