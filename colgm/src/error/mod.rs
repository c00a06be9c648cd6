//! Error types and reporting
//!
//! Lowering assumes a semantically valid MIR input, so almost everything
//! here is an internal error: a MIR shape the engine cannot handle. Those
//! are collected per node and surfaced together once every function has
//! been attempted.

use crate::span::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compile error
#[derive(Debug, Error)]
pub enum CompileError {
    /// Unhandled MIR shape found while lowering
    #[error("internal error at {file}:{span}: {message}")]
    Internal {
        message: String,
        span: Span,
        file: String,
    },

    #[error("IO error: {message}")]
    Io { message: String },

    /// MIR or symbol table could not be decoded
    #[error("input error: {message}")]
    Input { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// One or more internal errors, no module was produced
    #[error("lowering failed with {} internal error(s)", errors.len())]
    Lowering { errors: Vec<CompileError> },
}

impl CompileError {
    pub fn internal(message: impl Into<String>, span: Span) -> Self {
        Self::Internal {
            message: message.into(),
            span,
            file: String::new(),
        }
    }

    /// Internal error located in a specific source file
    pub fn internal_in(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            span,
            file: file.into(),
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn input_error(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Internal { span, .. } => Some(*span),
            Self::Io { .. }
            | Self::Input { .. }
            | Self::Config { .. }
            | Self::Format(_)
            | Self::Lowering { .. } => None,
        }
    }

    /// Source file the error points into, empty when unknown
    pub fn file(&self) -> &str {
        match self {
            Self::Internal { file, .. } => file,
            _ => "",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Internal { message, .. } => message.clone(),
            Self::Io { message } => message.clone(),
            Self::Input { message } => message.clone(),
            Self::Config { message } => message.clone(),
            Self::Format(e) => e.to_string(),
            Self::Lowering { errors } => {
                format!("{} internal error(s)", errors.len())
            }
        }
    }

    /// Flatten an aggregated lowering error into its parts
    pub fn into_errors(self) -> Vec<CompileError> {
        match self {
            Self::Lowering { errors } => errors,
            other => vec![other],
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CompileError {
    fn from(e: serde_json::Error) -> Self {
        Self::input_error(e.to_string())
    }
}

impl From<toml::de::Error> for CompileError {
    fn from(e: toml::de::Error) -> Self {
        Self::config_error(e.to_string())
    }
}

/// Report error with ariadne
///
/// `source` is the text of `filename` when it could be read; spanned
/// errors without a source fall back to a plain report.
pub fn report_error(filename: &str, source: Option<&str>, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        CompileError::Internal { .. } => "Internal",
        CompileError::Io { .. } => "IO",
        CompileError::Input { .. } => "Input",
        CompileError::Config { .. } => "Config",
        CompileError::Format(_) => "Format",
        CompileError::Lowering { .. } => "Lowering",
    };

    let printed = match (error.span(), source) {
        (Some(span), Some(source)) => Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .eprint((filename, Source::from(source))),
        _ => Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {error}"))
            .finish()
            .eprint((filename, Source::from(source.unwrap_or("")))),
    };

    if printed.is_err() {
        eprintln!("error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_carries_span() {
        let err = CompileError::internal("bad shape", Span::at(4, 9, 2, 3));
        assert_eq!(err.span(), Some(Span::at(4, 9, 2, 3)));
        assert_eq!(err.message(), "bad shape");
        assert_eq!(err.file(), "");
    }

    #[test]
    fn test_internal_error_display() {
        let err = CompileError::internal_in("bad shape", Span::at(0, 1, 7, 1), "main.colgm");
        assert_eq!(err.to_string(), "internal error at main.colgm:7:1: bad shape");
    }

    #[test]
    fn test_lowering_error_flattens() {
        let err = CompileError::Lowering {
            errors: vec![
                CompileError::internal("a", Span::default()),
                CompileError::internal("b", Span::default()),
            ],
        };
        assert_eq!(err.to_string(), "lowering failed with 2 internal error(s)");
        assert_eq!(err.span(), None);
        assert_eq!(err.into_errors().len(), 2);
    }

    #[test]
    fn test_json_error_converts_to_input() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: CompileError = json_err.into();
        assert!(matches!(err, CompileError::Input { .. }));
    }
}
