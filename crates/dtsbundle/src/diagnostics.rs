//! Diagnostics and the typed failure surface of a bundling run.
//!
//! Every fatal outcome of [`crate::bundle`] is one of the three
//! [`BundleError`] variants; diagnostics that do not abort the run are
//! still logged so callers can debug partially healthy inputs.

use std::{error::Error, fmt, io};

/// A single compiler-style diagnostic with optional file and position
/// context. Positions are stored zero-based and rendered one-based, the
/// way editors and compilers print them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Normalized file name the diagnostic refers to, if any
    pub file: Option<String>,
    /// Zero-based (line, character) within that file
    pub position: Option<(u32, u32)>,
    /// Human-readable description of the problem
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic anchored at a position within a file.
    pub fn at(file: impl Into<String>, line: u32, character: u32, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            position: Some((line, character)),
            message: message.into(),
        }
    }

    /// Diagnostic that concerns a file as a whole.
    pub fn file_level(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            position: None,
            message: message.into(),
        }
    }

    /// Diagnostic with no file association, e.g. a configuration problem.
    pub fn global(message: impl Into<String>) -> Self {
        Self {
            file: None,
            position: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.position) {
            (Some(file), Some((line, character))) => {
                write!(f, "{}({},{}): {}", file, line + 1, character + 1, self.message)
            }
            (Some(file), None) => write!(f, "{}: {}", file, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Fatal outcomes of a bundling run.
///
/// A run resolves or fails exactly once; none of these are retried, and a
/// failed run's output file is removed rather than left half-written.
#[derive(Debug)]
pub enum BundleError {
    /// The program-wide compilation pass found errors before any output
    /// was produced. Carries every diagnostic collected during that pass.
    CompilationFailed(Vec<Diagnostic>),
    /// A single file's narrowed declaration emission was skipped or
    /// reported diagnostics; no further files are processed.
    EmitterError {
        /// Normalized name of the failing file
        file: String,
        /// All diagnostics reported for that file
        diagnostics: Vec<Diagnostic>,
    },
    /// The output destination reported an I/O failure.
    WriteError(io::Error),
}

impl BundleError {
    /// Diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::CompilationFailed(diagnostics) | Self::EmitterError { diagnostics, .. } => diagnostics,
            Self::WriteError(_) => &[],
        }
    }
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompilationFailed(diagnostics) => {
                write!(f, "source files contained errors")?;
                for diagnostic in diagnostics {
                    write!(f, "\n{diagnostic}")?;
                }
                Ok(())
            }
            Self::EmitterError { file, diagnostics } => {
                write!(f, "declaration generation failed for {file}")?;
                for diagnostic in diagnostics {
                    write!(f, "\n{diagnostic}")?;
                }
                Ok(())
            }
            Self::WriteError(err) => write!(f, "failed to write bundle output: {err}"),
        }
    }
}

impl Error for BundleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::WriteError(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_render_one_based() {
        let diagnostic = Diagnostic::at("/src/a.d.ts", 0, 4, "unterminated string literal");
        assert_eq!(diagnostic.to_string(), "/src/a.d.ts(1,5): unterminated string literal");
    }

    #[test]
    fn file_level_diagnostic_omits_position() {
        let diagnostic = Diagnostic::file_level("/src/a.d.ts", "cannot read file");
        assert_eq!(diagnostic.to_string(), "/src/a.d.ts: cannot read file");
    }

    #[test]
    fn emitter_error_lists_diagnostics() {
        let err = BundleError::EmitterError {
            file: "/src/a.d.ts".into(),
            diagnostics: vec![Diagnostic::at("/src/a.d.ts", 2, 0, "'}' expected")],
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("declaration generation failed for /src/a.d.ts"));
        assert!(rendered.contains("(3,1): '}' expected"));
    }
}
