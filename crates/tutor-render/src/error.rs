use thiserror::Error;

/// Errors raised by a [`crate::MathEngine`].
///
/// These never leave the crate: [`crate::Renderer`] turns them into an inline
/// error marker.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The formula could not be typeset (syntax error, unknown command, …).
    #[error("formula error: {message}")]
    Formula { message: String },

    /// The math engine itself could not be set up.
    #[error("math engine unavailable: {0}")]
    Engine(String),
}
