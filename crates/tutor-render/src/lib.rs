//! tutor-render – turns streamed model output into sanitized HTML.
//!
//! Pipeline:
//! 1. [`normalize`] rewrites nonstandard math delimiters and doubled
//!    backslashes emitted by some model variants.
//! 2. [`markdown`] parses the text with `pulldown-cmark` and swaps math spans
//!    (and `$`-wrapped code spans) for typeset HTML.
//! 3. [`math`] delegates formulas to KaTeX.  A formula that fails to parse
//!    becomes an inline error marker; rendering itself never fails.
//!
//! Rendering is a pure function of the input text: the same input always
//! yields byte-identical HTML.

pub mod error;
pub mod markdown;
pub mod math;
pub mod normalize;

pub use error::RenderError;
pub use markdown::Renderer;
pub use math::{Katex, MathEngine, escape_html};

/// Render `raw` with the default KaTeX-backed [`Renderer`].
pub fn render(raw: &str) -> String {
    Renderer::new(Katex).render(raw)
}
