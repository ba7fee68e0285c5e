//! Markdown to HTML rendering using comrak
//!
//! Record text is authored as Markdown and stored as HTML. The renderer uses
//! a fixed extension set chosen for that content:
//!
//! - **Hard breaks**: a bare newline inside a paragraph becomes `<br />`
//! - **Fenced code**: fenced blocks are emitted verbatim, no inline parsing
//! - **Tables**: GFM pipe tables
//! - **Raw HTML**: markup already present in the text is passed through
//!
//! # State
//!
//! Every call parses into a fresh comrak arena built from plain options, so
//! no heading ids, footnote registries or list numbering survive from one
//! call to the next. A `MarkdownRenderer` holds only its options and can be
//! shared between threads without synchronization.
//!
//! The renderer knows nothing about entity mentions; callers protect them
//! first (see [`crate::mention`]).

use comrak::{Arena, Options, format_html, parse_document};

use crate::error::ConversionError;

/// Markdown rendering options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Render bare newlines as `<br />`
    pub hard_breaks: bool,
    /// Enable GFM pipe tables
    pub tables: bool,
    /// Pass raw HTML in the source through unchanged
    pub raw_html: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            hard_breaks: true,
            tables: true,
            raw_html: true,
        }
    }
}

/// Markdown to HTML renderer
///
/// # Examples
///
/// ```rust
/// use entity_mention_converter::renderer::MarkdownRenderer;
///
/// let renderer = MarkdownRenderer::new();
/// let html = renderer.render("# Title\n\nBody").expect("render failed");
/// assert!(html.contains("<h1>Title</h1>"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: RenderOptions,
}

impl MarkdownRenderer {
    /// Create a renderer with the default extension set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a renderer with custom options
    pub fn with_options(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Options this renderer was built with
    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Render Markdown to HTML
    ///
    /// Empty input yields empty output. The trailing newline comrak appends
    /// after the last block is dropped.
    ///
    /// # Errors
    ///
    /// - `ConversionError::RenderError`: comrak's HTML writer failed
    /// - `ConversionError::EncodingError`: the writer produced invalid UTF-8
    pub fn render(&self, markdown: &str) -> Result<String, ConversionError> {
        if markdown.is_empty() {
            return Ok(String::new());
        }

        let options = self.comrak_options();
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &options);

        let mut buffer = Vec::with_capacity(markdown.len() * 2);
        format_html(root, &options, &mut buffer)
            .map_err(|e| ConversionError::RenderError(e.to_string()))?;

        let mut html = String::from_utf8(buffer).map_err(|e| {
            ConversionError::EncodingError(format!(
                "Invalid UTF-8 in rendered HTML at byte position {}",
                e.utf8_error().valid_up_to()
            ))
        })?;

        let trimmed_len = html.trim_end_matches('\n').len();
        html.truncate(trimmed_len);

        tracing::trace!(
            input_len = markdown.len(),
            output_len = html.len(),
            "rendered markdown"
        );

        Ok(html)
    }

    fn comrak_options(&self) -> Options<'static> {
        let mut options = Options::default();
        options.render.hardbreaks = self.options.hard_breaks;
        options.render.unsafe_ = self.options.raw_html;
        options.extension.table = self.options.tables;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(markdown: &str) -> String {
        MarkdownRenderer::new()
            .render(markdown)
            .expect("Render failed")
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(render(""), "");
    }

    #[test]
    fn test_heading_and_paragraph() {
        let html = render("# Title\n\nSome text.");
        assert_eq!(html, "<h1>Title</h1>\n<p>Some text.</p>");
    }

    #[test]
    fn test_newline_becomes_line_break() {
        let html = render("first\nsecond");
        assert!(html.contains("first<br />"), "got: {}", html);
        assert!(html.contains("second"));
    }

    #[test]
    fn test_hard_breaks_can_be_disabled() {
        let renderer = MarkdownRenderer::with_options(RenderOptions {
            hard_breaks: false,
            ..Default::default()
        });
        assert!(!renderer.options().hard_breaks);
        assert!(renderer.options().tables);
        let html = renderer.render("first\nsecond").expect("Render failed");
        assert!(!html.contains("<br"));
    }

    #[test]
    fn test_fenced_code_is_not_processed() {
        let html = render("```\n**not bold** _x_\n```");
        assert!(html.contains("<pre><code>**not bold** _x_"), "got: {}", html);
        assert!(!html.contains("<strong>"));
    }

    #[test]
    fn test_fenced_code_language() {
        let html = render("```rust\nfn main() {}\n```");
        assert!(html.contains("class=\"language-rust\""), "got: {}", html);
    }

    #[test]
    fn test_pipe_table() {
        let html = render("| A | B |\n| --- | --- |\n| 1 | 2 |");
        assert!(html.contains("<table>"), "got: {}", html);
        assert!(html.contains("<th>A</th>"));
        assert!(html.contains("<td>2</td>"));
    }

    #[test]
    fn test_lists() {
        let html = render("- a\n- b\n\n1. x\n2. y");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>a</li>"));
        assert!(html.contains("<ol>"));
        assert!(html.contains("<li>y</li>"));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = render("<div class=\"note\">kept</div>");
        assert!(html.contains("<div class=\"note\">kept</div>"), "got: {}", html);
    }

    #[test]
    fn test_calls_do_not_share_state() {
        let renderer = MarkdownRenderer::new();
        let first = renderer.render("1. a\n2. b").expect("Render failed");
        let _ = renderer.render("# Other\n\n5. z").expect("Render failed");
        let again = renderer.render("1. a\n2. b").expect("Render failed");
        assert_eq!(first, again);
    }

    #[test]
    fn test_renderer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MarkdownRenderer>();
    }
}
