// THEORY:
// Every fatal failure of a comparison run belongs to exactly one phase of the
// pipeline (arguments, loading, alignment, differencing, output). Callers such
// as CI scripts only see the process exit status, so each phase owns a stable,
// distinct exit code. Best-effort stages (OCR, template matching) never produce
// a `ComparisonError`; they degrade to a log record and a shorter report.

use std::path::PathBuf;
use thiserror::Error;

/// Which of the two input images an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Baseline,
    Current,
}

impl std::fmt::Display for ImageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageRole::Baseline => write!(f, "baseline"),
            ImageRole::Current => write!(f, "current"),
        }
    }
}

/// The fatal errors a comparison run can end with.
#[derive(Error, Debug)]
pub enum ComparisonError {
    /// Wrong arguments or an invalid configuration value.
    #[error("usage: {message}")]
    Usage { message: String },

    /// The input path does not exist or is not a regular file.
    #[error("{role} image not found: {}", path.display())]
    NotFound { role: ImageRole, path: PathBuf },

    /// The input file exists but could not be decoded as an image.
    #[error("failed to load {role} image {}", path.display())]
    Decode {
        role: ImageRole,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The current image could not be brought to the baseline's dimensions.
    #[error("failed to resize images: {message}")]
    Resize { message: String },

    /// The difference signal could not be computed.
    #[error("error computing diff: {message}")]
    Difference { message: String },

    /// The output directory could not be created.
    #[error("failed to create output directory {}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The diff image could not be encoded.
    #[error("failed to encode diff image {}", path.display())]
    DiffEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The diff image could not be written to disk.
    #[error("failed to write diff image {}", path.display())]
    DiffWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text report could not be written to disk.
    #[error("failed to write report {}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ComparisonError {
    pub fn usage(message: impl Into<String>) -> Self {
        ComparisonError::Usage {
            message: message.into(),
        }
    }

    pub fn difference(message: impl Into<String>) -> Self {
        ComparisonError::Difference {
            message: message.into(),
        }
    }

    /// The process exit code reserved for this failure phase.
    ///
    /// 0 and 1 belong to the pass/fail verdict, so every error lands in 2..=12.
    pub fn exit_code(&self) -> u8 {
        match self {
            ComparisonError::Usage { .. } => 2,
            ComparisonError::NotFound {
                role: ImageRole::Baseline,
                ..
            } => 3,
            ComparisonError::NotFound {
                role: ImageRole::Current,
                ..
            } => 4,
            ComparisonError::Decode {
                role: ImageRole::Baseline,
                ..
            } => 5,
            ComparisonError::Decode {
                role: ImageRole::Current,
                ..
            } => 6,
            ComparisonError::Resize { .. } => 7,
            ComparisonError::Difference { .. } => 8,
            ComparisonError::OutputDirectory { .. } => 9,
            ComparisonError::DiffEncode { .. } => 10,
            ComparisonError::DiffWrite { .. } => 11,
            ComparisonError::ReportWrite { .. } => 12,
        }
    }
}

pub type Result<T> = std::result::Result<T, ComparisonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_phase_has_a_distinct_code() {
        let io = || std::io::Error::other("boom");
        let img = || image::ImageError::IoError(std::io::Error::other("boom"));
        let path = PathBuf::from("x.png");
        let errors = vec![
            ComparisonError::usage("missing args"),
            ComparisonError::NotFound {
                role: ImageRole::Baseline,
                path: path.clone(),
            },
            ComparisonError::NotFound {
                role: ImageRole::Current,
                path: path.clone(),
            },
            ComparisonError::Decode {
                role: ImageRole::Baseline,
                path: path.clone(),
                source: img(),
            },
            ComparisonError::Decode {
                role: ImageRole::Current,
                path: path.clone(),
                source: img(),
            },
            ComparisonError::Resize {
                message: "zero".into(),
            },
            ComparisonError::difference("too small"),
            ComparisonError::OutputDirectory {
                path: path.clone(),
                source: io(),
            },
            ComparisonError::DiffEncode {
                path: path.clone(),
                source: img(),
            },
            ComparisonError::DiffWrite {
                path: path.clone(),
                source: io(),
            },
            ComparisonError::ReportWrite { path, source: io() },
        ];

        let codes: HashSet<u8> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| (2..=12).contains(c)));
    }

    #[test]
    fn not_found_message_names_role_and_path() {
        let err = ComparisonError::NotFound {
            role: ImageRole::Current,
            path: PathBuf::from("shots/current.png"),
        };
        assert_eq!(err.to_string(), "current image not found: shots/current.png");
    }
}
