use std::fmt;

use thiserror::Error;

/// Errors raised by the module system. Everything except [`ModuleError::DuplicateModule`]
/// halts the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("Cannot declare module '{name}': {reason}")]
    DuplicateModule { name: String, reason: DuplicateReason },

    #[error("Unresolved module dependencies (missing or circular):{}", list_unresolved(.modules))]
    UnresolvedDependencies { modules: Vec<UnresolvedModule> },

    #[error(
        "Failed to load module '{module}' from {path} (requested by '{requested_by}'): {reason}"
    )]
    FetchFailed {
        module: String,
        path: String,
        requested_by: String,
        reason: String,
    },

    #[error("Module '{module}' failed to initialize: {reason}")]
    BodyFailed { module: String, reason: String },

    #[error("Bootstrap halted: {cause}")]
    Halted { cause: String },
}

/// Why a declaration was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateReason {
    /// A module with this name already has a body.
    AlreadyDefined,
    /// Another declaration has not been given its body yet.
    OpenDeclaration { open: String },
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::AlreadyDefined => f.write_str("module is already defined"),
            DuplicateReason::OpenDeclaration { open } => {
                write!(f, "declaration of '{}' is still open", open)
            }
        }
    }
}

/// A pending module that can never run, with the dependencies holding it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedModule {
    pub name: String,
    pub missing: Vec<String>,
}

impl fmt::Display for UnresolvedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (requires: {})", self.name, self.missing.join(", "))
    }
}

fn list_unresolved(modules: &[UnresolvedModule]) -> String {
    modules
        .iter()
        .map(|module| format!("\n  {}", module))
        .collect()
}
