//! Standalone HTML transcript of a conversation.

use std::fmt::Write as _;
use std::path::Path;

use tutor_render::{escape_html, render};
use tutor_types::{ChatMessage, Role};

const KATEX_CSS: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/katex.min.css";

/// Questions are shown verbatim; answers go through the Markdown/LaTeX renderer.
pub fn to_html(history: &[ChatMessage]) -> String {
    let mut out = String::new();
    out.push_str("<!doctype html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<link rel=\"stylesheet\" href=\"{KATEX_CSS}\">");
    out.push_str(
        "<style>.user{white-space:pre-wrap;background:#eef4ff}\
         .math-error{color:#b00020;font-family:monospace}\
         .math-display{display:block}</style>\n",
    );
    out.push_str("</head>\n<body>\n");

    for message in history {
        let body = match message.role {
            Role::User => escape_html(&message.content),
            Role::Assistant => render(&message.content),
        };
        let _ = writeln!(out, "<div class=\"{}\">{}</div>", message.role, body);
    }

    out.push_str("</body>\n</html>\n");
    out
}

pub fn write(path: &Path, history: &[ChatMessage]) -> std::io::Result<()> {
    std::fs::write(path, to_html(history))
}
