//! System instruction template.
//!
//! The instruction is configuration data: a `minijinja` template with a
//! version tag, rendered once at startup.  Swapping the prompt means pointing
//! `TUTOR_PROMPT_FILE` at another template, never touching relay code.
//!
//! A template declares its version in a leading comment:
//!
//! ```text
//! {# version: v2 #}
//! ```
//!
//! and must print the `end_marker` variable, which is the literal line the
//! model emits when it has finished.

use std::path::Path;

use minijinja::{Environment, context};
use thiserror::Error;

pub const DEFAULT_END_MARKER: &str = "--- end ---";

const BUILTIN_NAME: &str = "todai-tutor";
const BUILTIN_SOURCE: &str = include_str!("../assets/prompts/todai-tutor.md.j2");

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("rendered prompt {name}@{version} never prints the end marker {marker:?}")]
    MissingEndMarker {
        name: String,
        version: String,
        marker: String,
    },
}

/// A named, versioned prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    version: String,
    source: String,
}

impl PromptTemplate {
    /// The template compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_source(BUILTIN_NAME, BUILTIN_SOURCE)
    }

    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let version = declared_version(&source).unwrap_or("unversioned").to_owned();
        Self {
            name: name.into(),
            version,
            source,
        }
    }

    /// Load a template from disk; its name is the file stem.
    pub fn from_file(path: &Path) -> Result<Self, PromptError> {
        let source = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_owned());
        Ok(Self::from_source(name, source))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Render the instruction text for `end_marker`.
    pub fn render(&self, end_marker: &str) -> Result<String, PromptError> {
        let mut env = Environment::new();
        env.add_template("system", &self.source)?;
        let text = env
            .get_template("system")?
            .render(context! { end_marker => end_marker })?;

        if !text.lines().any(|line| line.trim() == end_marker) {
            return Err(PromptError::MissingEndMarker {
                name: self.name.clone(),
                version: self.version.clone(),
                marker: end_marker.to_owned(),
            });
        }
        Ok(text.trim().to_owned())
    }
}

fn declared_version(source: &str) -> Option<&str> {
    let first = source.lines().next()?.trim();
    first
        .strip_prefix("{#")?
        .strip_suffix("#}")?
        .trim()
        .strip_prefix("version:")
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
