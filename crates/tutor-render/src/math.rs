//! Formula typesetting.

use crate::error::RenderError;

/// Typesets a single formula.
///
/// Implementations must be deterministic: the same formula and mode always
/// produce the same HTML.
pub trait MathEngine {
    fn typeset(&self, formula: &str, display: bool) -> Result<String, RenderError>;
}

/// KaTeX via the `katex` crate.
///
/// The JavaScript context behind it is created lazily once per thread and
/// reused for every formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct Katex;

impl MathEngine for Katex {
    fn typeset(&self, formula: &str, display: bool) -> Result<String, RenderError> {
        let opts = katex::Opts::builder()
            .display_mode(display)
            .throw_on_error(true)
            .build()
            .map_err(|e| RenderError::Engine(e.to_string()))?;

        katex::render_with_opts(formula, &opts).map_err(|e| match e {
            katex::Error::JsExecError(message) => RenderError::Formula {
                message: unwrap_js_string(message),
            },
            other => RenderError::Engine(other.to_string()),
        })
    }
}

/// The JS bridge reports thrown values in `Debug` form: `String("ParseError: …")`.
fn unwrap_js_string(raw: String) -> String {
    let Some(inner) = raw
        .strip_prefix("String(\"")
        .and_then(|rest| rest.strip_suffix("\")"))
    else {
        return raw;
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Typeset `formula`, falling back to a visible error marker.
///
/// `source` is the formula as written, delimiters included; it is shown
/// (escaped) inside the marker.  Both forms are `<span>`s so display math can
/// sit inside a paragraph; the page styles `.math-display` as a block.
pub(crate) fn typeset_or_mark<E: MathEngine>(
    engine: &E,
    formula: &str,
    source: &str,
    display: bool,
) -> String {
    match engine.typeset(formula, display) {
        Ok(html) if display => format!("<span class=\"math-display\">{html}</span>"),
        Ok(html) => html,
        Err(e) => {
            let display_mode = display;
            tracing::debug!(error = %e, display_mode, "formula rejected by math engine");
            let class = if display { "math-error math-display" } else { "math-error" };
            format!(
                "<span class=\"{class}\" title=\"{}\">数式エラー: {}</span>",
                escape_html(&e.to_string()),
                escape_html(source),
            )
        }
    }
}

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
