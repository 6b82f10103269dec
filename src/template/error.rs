//! Template error types

use std::fmt;

/// Errors that can occur while rendering a backup path template
#[derive(Debug)]
pub enum TemplateError {
    /// Template failed to parse or render (includes strict undefined lookups)
    Render(minijinja::Error),
    /// The resource could not be turned into a rendering context
    Context(String),
}

impl TemplateError {
    /// Whether the failure was a reference to a value the context lacks
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Render(e) if e.kind() == minijinja::ErrorKind::UndefinedError)
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Context(msg) => write!(f, "template context error: {}", msg),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            Self::Context(_) => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err)
    }
}
