//! Error types for type derivation, value conversion and transcoding.
//!
//! Every conversion error carries the [`Path`] where it occurred.

use std::path::PathBuf;

use thiserror::Error;

use crate::path::{Path, Step};

/// Errors loading documents and payloads.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("fragment not found: {fragment}")]
    FragmentNotFound { fragment: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors deriving a type from a schema document.
#[derive(Debug, Error)]
pub enum FoundryError {
    #[error("recursion limit reached at {path:?}: schema is too deep or self-referential")]
    RecursionLimit { path: String },

    #[error("unresolvable reference \"{reference}\" at {path:?}")]
    UnresolvableRef { path: String, reference: String },

    #[error("invalid schema at {path:?}: {message}")]
    InvalidSchema { path: String, message: String },

    #[error("unsupported composition at {path:?}: {message}")]
    UnsupportedComposition { path: String, message: String },

    #[error("no definition found for {gvk}")]
    UnknownKind { gvk: String },

    #[error("no definition named \"{id}\"")]
    UnknownDefinition { id: String },

    #[error("invalid group/version/kind \"{value}\": expected [group/]version/kind")]
    InvalidGvk { value: String },
}

impl FoundryError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }

    pub(crate) fn recursion_limit(path: &Path) -> Self {
        FoundryError::RecursionLimit {
            path: path.to_string(),
        }
    }

    pub(crate) fn invalid_schema(path: &Path, message: impl Into<String>) -> Self {
        FoundryError::InvalidSchema {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Path-carrying errors from the foundry are built bottom-up: the failing
/// call reports a path relative to its node and each caller prepends its
/// own step.
#[derive(Debug)]
pub(crate) struct Located {
    pub path: Path,
    pub kind: LocatedKind,
}

#[derive(Debug)]
pub(crate) enum LocatedKind {
    RecursionLimit,
    UnresolvableRef(String),
    InvalidSchema(String),
    UnsupportedComposition(String),
}

impl Located {
    pub fn new(kind: LocatedKind) -> Self {
        Self {
            path: Path::root(),
            kind,
        }
    }

    pub fn under(mut self, step: Step) -> Self {
        self.path.prepend(step);
        self
    }
}

impl From<Located> for FoundryError {
    fn from(err: Located) -> Self {
        let path = err.path;
        match err.kind {
            LocatedKind::RecursionLimit => FoundryError::recursion_limit(&path),
            LocatedKind::UnresolvableRef(reference) => FoundryError::UnresolvableRef {
                path: path.to_string(),
                reference,
            },
            LocatedKind::InvalidSchema(message) => FoundryError::invalid_schema(&path, message),
            LocatedKind::UnsupportedComposition(message) => FoundryError::UnsupportedComposition {
                path: path.to_string(),
                message,
            },
        }
    }
}

/// Errors morphing a value from one type to another.
#[derive(Debug, Error)]
pub enum MorphError {
    #[error("cannot morph {from} into {to} at {path:?}")]
    Unsupported {
        path: String,
        from: String,
        to: String,
    },

    #[error("incompatible tuple arity at {path:?}: expected {expected} element(s), got {actual}")]
    IncompatibleArity {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot parse {value:?} as {to} at {path:?}")]
    Parse {
        path: String,
        value: String,
        to: &'static str,
    },

    #[error("attribute {name:?} at {path:?} is not declared by the target type")]
    UndeclaredAttribute { path: String, name: String },

    #[error("unknown {from} value cannot change kind to {to} at {path:?}")]
    UnknownKindChange {
        path: String,
        from: &'static str,
        to: &'static str,
    },
}

impl MorphError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors decoding a payload into a typed value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected {expected} at {path:?}, got {actual}")]
    Mismatch {
        path: String,
        expected: String,
        actual: &'static str,
    },

    #[error("cannot parse {value:?} as {to} at {path:?}")]
    Parse {
        path: String,
        value: String,
        to: &'static str,
    },

    #[error("incompatible tuple arity at {path:?}: expected {expected} element(s), got {actual}")]
    IncompatibleArity {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("attribute {name:?} at {path:?} is not declared by the target type")]
    UndeclaredAttribute { path: String, name: String },
}

impl DecodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors encoding a typed value into a payload.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unknown value at {path:?} cannot be encoded")]
    Unknown { path: String },
}

impl EncodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
