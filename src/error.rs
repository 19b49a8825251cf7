//! Error types for the engine.
//!
//! Configuration mistakes, tree misuse and task failures are kept apart so a
//! host can tell "the grammar is wrong" from "a callback failed".

use crate::tree::NodeId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T = ()> = Result<T, EngineError>;

/// Errors caused by how commands, options or the parser were configured.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration was supplied for a main command that already exists.
    #[error("no need to set command configuration for existing main command: {0}")]
    DuplicateConfig(String),

    /// Blank option name, or the reserved main option name given explicitly.
    #[error("invalid option name: {0:?}")]
    InvalidOptionName(String),

    /// Freezing only makes sense when priorities are assigned automatically.
    #[error("cannot toggle priority freezing for '{0}' when priority is not registered automatically")]
    FreezeWithoutAutoPriority(String),

    /// Main command not found in the registry.
    #[error("main command not found: {0}")]
    UnknownCommand(String),

    /// Option not found for a main command.
    #[error("option not found: {option} (main command '{main}')")]
    UnknownOption { main: String, option: String },

    /// Block characters must be empty or exactly an open/close pair.
    #[error("block characters must be empty or exactly two characters, got {0:?}")]
    InvalidBlockChars(String),
}

/// Errors raised while parsing a [`CPath`](crate::tree::CPath).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("malformed path segment: {0:?}")]
    MalformedSegment(String),
}

/// Misuse of the command tree API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The handle does not belong to the tree (or the tree was cleared since).
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("a parent is required once the tree has a head")]
    MissingParent,

    #[error("node {0:?} is already attached")]
    AlreadyAttached(NodeId),

    #[error("node {0:?} is not attached to the tree")]
    NotAttached(NodeId),

    /// Attaching a node below itself or one of its descendants.
    #[error("node {0:?} cannot become a descendant of itself")]
    Cycle(NodeId),
}

/// Umbrella error returned by the interpreter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Path(#[from] PathError),

    /// A registered task failed; the rest of the batch was not run.
    #[error("task for option '{option}' of command '{command}' failed: {source}")]
    Task {
        command: String,
        option: String,
        #[source]
        source: anyhow::Error,
    },

    /// An illegal-input handler chose to fail.
    #[error("illegal input handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}
