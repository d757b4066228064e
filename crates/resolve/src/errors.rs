//! Error types for the def-map builder
//!
//! Only two things abort a build: corrupt input that violates a
//! structural invariant, and cancellation. Everything else is a soft
//! failure recorded in the map itself (unresolved imports, missed
//! files).

use codespan::Span;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use opal_hir::FileId;
use std::fmt;

/// Result type for def-map construction.
pub type DefMapResult<T> = Result<T, DefMapError>;

/// A hard error raised while building a crate def-map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefMapError {
    pub kind: DefMapErrorKind,
    pub span: Option<Span>,
    pub file_id: Option<FileId>,
}

impl DefMapError {
    pub fn new(kind: DefMapErrorKind) -> Self {
        Self {
            kind,
            span: None,
            file_id: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_file(mut self, file_id: FileId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    /// Convert to a diagnostic for reporting.
    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let mut diagnostic = Diagnostic::error()
            .with_message(self.kind.message())
            .with_code(self.kind.code());

        if let (Some(file_id), Some(span)) = (self.file_id, self.span) {
            diagnostic = diagnostic.with_labels(vec![
                Label::primary(file_id, span).with_message(self.kind.label_message()),
            ]);
        }

        if let Some(note) = self.kind.note() {
            diagnostic = diagnostic.with_notes(vec![note]);
        }

        diagnostic
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, DefMapErrorKind::Cancelled)
    }
}

/// Specific kinds of hard errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefMapErrorKind {
    /// Glob propagation recursed past the hard depth cap.
    GlobImportDepthExceeded { module: String, depth: usize },

    /// A binding claimed to be a module or enum but did not cast to one.
    BadModOrEnumTarget { path: String },

    /// A child module whose name has no binding in the parent.
    DetachedChildModule { parent: String, child: String },

    /// The host asked the build to stop; partial state is discarded.
    Cancelled,
}

impl DefMapErrorKind {
    /// Error code for categorization.
    pub fn code(&self) -> String {
        match self {
            Self::GlobImportDepthExceeded { .. } => "E0101".to_string(),
            Self::BadModOrEnumTarget { .. } => "E0102".to_string(),
            Self::DetachedChildModule { .. } => "E0103".to_string(),
            Self::Cancelled => "E0104".to_string(),
        }
    }

    /// Primary error message.
    pub fn message(&self) -> String {
        match self {
            Self::GlobImportDepthExceeded { module, depth } => {
                format!(
                    "Glob import propagation exceeded depth {} at module `{}`",
                    depth, module
                )
            }
            Self::BadModOrEnumTarget { path } => {
                format!("`{}` is recorded as a module or enum but resolves to neither", path)
            }
            Self::DetachedChildModule { parent, child } => {
                format!(
                    "Child module `{}` of `{}` has no binding in its parent",
                    child, parent
                )
            }
            Self::Cancelled => "Def-map build cancelled".to_string(),
        }
    }

    /// Label message for the primary span.
    pub fn label_message(&self) -> String {
        match self {
            Self::GlobImportDepthExceeded { .. } => "glob import cycle starts here".to_string(),
            Self::BadModOrEnumTarget { .. } => "not a module or enum".to_string(),
            Self::DetachedChildModule { .. } => "detached child module".to_string(),
            Self::Cancelled => "build cancelled".to_string(),
        }
    }

    /// Additional note for the error.
    pub fn note(&self) -> Option<String> {
        match self {
            Self::GlobImportDepthExceeded { .. } => Some(
                "a chain of `use path::*` re-exports is deeper than the resolver allows"
                    .to_string(),
            ),
            Self::BadModOrEnumTarget { .. } | Self::DetachedChildModule { .. } => {
                Some("the module tree handed to the resolver is corrupt".to_string())
            }
            Self::Cancelled => None,
        }
    }
}

impl fmt::Display for DefMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.kind.message())
    }
}

impl std::error::Error for DefMapError {}

/// Helper constructors.
impl DefMapError {
    pub fn glob_depth_exceeded(module: impl Into<String>, depth: usize) -> Self {
        Self::new(DefMapErrorKind::GlobImportDepthExceeded {
            module: module.into(),
            depth,
        })
    }

    pub fn bad_mod_or_enum_target(path: impl Into<String>) -> Self {
        Self::new(DefMapErrorKind::BadModOrEnumTarget { path: path.into() })
    }

    pub fn detached_child_module(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self::new(DefMapErrorKind::DetachedChildModule {
            parent: parent.into(),
            child: child.into(),
        })
    }

    pub fn cancelled() -> Self {
        Self::new(DefMapErrorKind::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = DefMapError::glob_depth_exceeded("crate::a", 100);
        assert!(matches!(
            error.kind,
            DefMapErrorKind::GlobImportDepthExceeded { .. }
        ));
        assert_eq!(error.kind.code(), "E0101");
    }

    #[test]
    fn test_error_with_span() {
        let span = Span::new(0, 10);
        let error = DefMapError::cancelled().with_span(span);
        assert_eq!(error.span, Some(span));
        assert!(error.is_cancelled());
    }

    #[test]
    fn test_diagnostic_conversion() {
        let error = DefMapError::bad_mod_or_enum_target("crate::x")
            .with_file(FileId::new(0))
            .with_span(Span::new(3, 7));
        let diagnostic = error.to_diagnostic();
        assert_eq!(
            diagnostic.severity,
            codespan_reporting::diagnostic::Severity::Error
        );
        assert_eq!(diagnostic.labels.len(), 1);
        assert_eq!(diagnostic.notes.len(), 1);
    }

    #[test]
    fn test_error_messages() {
        let error = DefMapError::detached_child_module("crate", "a");
        let message = error.kind.message();
        assert!(message.contains("a"));
        assert!(message.contains("no binding"));
    }
}
