use std::path::PathBuf;

use thiserror::Error;

/// A source file that does not match the grammar.
///
/// Parsing stops at the first defect; `message` quotes the offending line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error at line {line}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Failures while inlining `task("file")` references.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Task file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// `chain` lists every file from the outermost include down to the
    /// repeated one.
    #[error("Circular task file reference detected: {file} ({})", format_chain(.chain))]
    Circular { file: String, chain: Vec<PathBuf> },

    #[error("Failed to read task file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("In task file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Everything that can abort compiling or installing a command file.
#[derive(Error, Debug)]
pub enum StimError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input file must have .{expected} extension: {}", .path.display())]
    Extension { path: PathBuf, expected: String },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

impl StimError {
    pub fn exit_code(&self) -> u8 {
        match self {
            StimError::Parse(_) | StimError::Resolve(ResolveError::Parse { .. }) => 2,
            StimError::Resolve(_) => 3,
            StimError::Io(_)
            | StimError::Json(_)
            | StimError::Extension { .. }
            | StimError::NoHomeDir => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Invalid ask statement: ask()", 3);
        assert_eq!(err.to_string(), "Parse error at line 3: Invalid ask statement: ask()");
    }

    #[test]
    fn test_circular_display_includes_chain() {
        let err = ResolveError::Circular {
            file: "a.stim".into(),
            chain: vec![PathBuf::from("/w/a.stim"), PathBuf::from("/w/b.stim"), PathBuf::from("/w/a.stim")],
        };
        assert_eq!(
            err.to_string(),
            "Circular task file reference detected: a.stim (/w/a.stim -> /w/b.stim -> /w/a.stim)"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(StimError::from(ParseError::new("x", 1)).exit_code(), 2);
        let resolve = ResolveError::NotFound { path: PathBuf::from("x.stim") };
        assert_eq!(StimError::from(resolve).exit_code(), 3);
        let nested = ResolveError::Parse { path: PathBuf::from("x.stim"), source: ParseError::new("x", 1) };
        assert_eq!(StimError::from(nested).exit_code(), 2);
        assert_eq!(StimError::NoHomeDir.exit_code(), 1);
    }
}
