//! An embeddable command-line interpretation engine.
//!
//! A host program registers main commands and their options together with the
//! tasks they run, then feeds text to an [`Interpreter`]. Text is tokenized
//! with a configurable grammar (quotes, escape, delimiter, end-of-statement
//! and block characters), resolved into [`Command`] nodes arranged in a
//! [`CommandTree`] by block nesting, and executed in pre-order. Within a node
//! options run by priority, so a host can make some options run before or
//! after the command's main task regardless of their position on the line.
//!
//! The modules are usable on their own: [`lexer`] only tokenizes, [`registry`]
//! only stores the grammar, [`tree`] only holds nodes.

pub mod argument;
pub mod command;
pub mod config;
pub mod error;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod tree;

pub use argument::Argument;
pub use command::{Command, RunningOption, Task, NOP_COMMAND};
pub use config::{CommandConfig, ParserConfig};
pub use error::{ConfigError, EngineError, EngineResult, PathError, TreeError};
pub use interpreter::Interpreter;
pub use lexer::{Statement, Tokenizer};
pub use parser::{BlockScope, ParsedOption};
pub use registry::{MainCommand, OptionDef, Registry};
pub use tree::{CPath, CommandTree, NodeId, Segment};
