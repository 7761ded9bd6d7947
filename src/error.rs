//! Error types with fix suggestions
//!
//! Error code ranges:
//! - DL-001-009: Linker errors
//! - DL-010-019: Configuration errors
//! - DL-020-039: Job library errors
//! - DL-090-099: IO/render errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DoclinkError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum DoclinkError {
    // ─────────────────────────────────────────────────────────────
    // Linker errors (DL-001 to DL-009)
    // ─────────────────────────────────────────────────────────────
    #[error("DL-001: Cannot read '{path}': {source}")]
    PathNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("DL-002: Failed to parse '{path}': {details}")]
    ParseError { path: String, details: String },

    #[error("DL-003: Cyclic import: {chain}")]
    CyclicImport { chain: String },

    #[error("DL-004: Import nesting exceeds {max_depth} levels at '{path}'")]
    ImportDepthExceeded { path: String, max_depth: usize },

    #[error("DL-005: Import reference must be a file path, found {found}")]
    InvalidImportReference { found: &'static str },

    // ─────────────────────────────────────────────────────────────
    // Configuration errors (DL-010 to DL-019)
    // ─────────────────────────────────────────────────────────────
    #[error("DL-010: Configuration error: {reason}")]
    Config { reason: String },

    // ─────────────────────────────────────────────────────────────
    // Job library errors (DL-020 to DL-039)
    // ─────────────────────────────────────────────────────────────
    #[error("DL-020: Invalid tool config: {reason}")]
    InvalidToolConfig { reason: String },

    #[error("DL-021: Tool has no input named '{id}'")]
    UnknownInput { id: String },

    #[error("DL-022: Required input '{id}' has no value")]
    MissingInput { id: String },

    #[error("DL-023: Input '{id}' expects {expected}, got {found}")]
    InputTypeMismatch {
        id: String,
        expected: String,
        found: String,
    },

    #[error("DL-024: Cannot resolve parameter reference '{reference}'")]
    UnresolvedReference { reference: String },

    #[error("DL-025: Invalid output glob '{pattern}': {details}")]
    InvalidGlob { pattern: String, details: String },

    #[error("DL-026: Job directory '{path}' does not exist")]
    JobDirNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // IO / render errors (DL-090 to DL-099)
    // ─────────────────────────────────────────────────────────────
    #[error("DL-090: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DL-091: Failed to render document: {details}")]
    Render { details: String },
}

impl FixSuggestion for DoclinkError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DoclinkError::PathNotFound { .. } => {
                Some("Check the import path; relative paths resolve against the importing file's directory")
            }
            DoclinkError::ParseError { .. } => Some("Check YAML/JSON syntax: indentation and quoting"),
            DoclinkError::CyclicImport { .. } => Some("Remove one of the imports that closes the loop"),
            DoclinkError::ImportDepthExceeded { .. } => {
                Some("Flatten the import chain or raise link.max_depth")
            }
            DoclinkError::InvalidImportReference { .. } => {
                Some("Use a string path: {import: path/to/file.yaml}")
            }
            DoclinkError::Config { .. } => Some("Check the TOML config file and DOCLINK_* variables"),
            DoclinkError::InvalidToolConfig { .. } => {
                Some("Check baseCommand, inputs and outputs in the tool config")
            }
            DoclinkError::UnknownInput { .. } => {
                Some("Input ids are matched after stripping the 'step.' namespace prefix")
            }
            DoclinkError::MissingInput { .. } => Some("Provide a value or declare a default"),
            DoclinkError::InputTypeMismatch { .. } => Some("Send a value matching the declared input type"),
            DoclinkError::UnresolvedReference { .. } => {
                Some("Use $(inputs.<id>), $(inputs.<id>.path) or $(runtime.cores|ram|outdir|tmpdir)")
            }
            DoclinkError::InvalidGlob { .. } => Some("Fix the outputBinding.glob pattern"),
            DoclinkError::JobDirNotFound { .. } => Some("Pass the directory the job ran in as job_dir"),
            DoclinkError::Io(_) => Some("Check file path and permissions"),
            DoclinkError::Render { .. } => None,
        }
    }
}
