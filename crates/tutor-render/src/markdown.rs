//! Markdown → HTML with math substitution and sanitisation.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

use crate::math::{MathEngine, typeset_or_mark};
use crate::normalize::normalize;

/// URL schemes that must never reach an `href` / `src`.
const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Renders normalised markdown with a [`MathEngine`].
#[derive(Debug, Clone, Default)]
pub struct Renderer<E> {
    engine: E,
}

impl<E: MathEngine> Renderer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Convert `raw` model output into an HTML fragment.  Never fails.
    pub fn render(&self, raw: &str) -> String {
        let source = normalize(raw);
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_MATH);

        let events = Parser::new_ext(&source, options).map(|event| self.rewrite(event));

        let mut out = String::with_capacity(source.len() * 2);
        html::push_html(&mut out, events);
        out
    }

    fn rewrite<'a>(&self, event: Event<'a>) -> Event<'a> {
        match event {
            Event::InlineMath(formula) => self.math(&formula, &format!("${formula}$"), false),
            Event::DisplayMath(formula) => self.math(&formula, &format!("$${formula}$$"), true),
            Event::Code(code) => self.code_span(code),
            // Raw HTML in model output is shown, not interpreted.
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            other => other,
        }
    }

    /// `` `$$…$$` `` is display math, `` `$…$` `` inline math, anything else
    /// stays a code span.
    fn code_span<'a>(&self, code: CowStr<'a>) -> Event<'a> {
        let text: &str = &code;
        if let Some(inner) = text
            .strip_prefix("$$")
            .and_then(|t| t.strip_suffix("$$"))
            .filter(|inner| !inner.is_empty())
        {
            return self.math(inner, text, true);
        }
        if let Some(inner) = text
            .strip_prefix('$')
            .and_then(|t| t.strip_suffix('$'))
            .filter(|inner| !inner.is_empty())
        {
            return self.math(inner, text, false);
        }
        Event::Code(code)
    }

    fn math<'a>(&self, formula: &str, source: &str, display: bool) -> Event<'a> {
        let html = typeset_or_mark(&self.engine, formula, source, display);
        Event::InlineHtml(CowStr::from(html))
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let lowered = url.trim_start().to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}
